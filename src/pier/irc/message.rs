//! Parsing of raw IRC lines (IRCv3 tags, prefix, command and parameters).

use std::collections::HashMap;

/// CTCP delimiter.
const CTCP: char = '\x01';

/// One parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a line without its CRLF. Returns `None` for lines with no command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_start_matches(' ');

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, remainder) = stripped.split_once(' ')?;
            for tag in raw_tags.split(';').filter(|t| !t.is_empty()) {
                let (key, value) = tag.split_once('=').unwrap_or((tag, ""));
                tags.insert(key.to_string(), unescape_tag_value(value));
            }
            rest = remainder.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (source, remainder) = stripped.split_once(' ')?;
            prefix = Some(source.to_string());
            rest = remainder.trim_start_matches(' ');
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, remainder)) => (command, remainder),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, remainder)) => {
                    params.push(param.to_string());
                    rest = remainder;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nick part of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split(['!', '@']).next().unwrap_or(prefix))
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// Body of a channel message after CTCP handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatText<'a> {
    Plain(&'a str),
    Action(&'a str),
    /// Any other CTCP request (VERSION, PING, ...).
    OtherCtcp,
}

/// Classify a PRIVMSG body.
pub fn classify_text(text: &str) -> ChatText<'_> {
    let Some(inner) = text.strip_prefix(CTCP) else {
        return ChatText::Plain(text);
    };
    let inner = inner.strip_suffix(CTCP).unwrap_or(inner);

    match inner.split_once(' ') {
        Some((verb, body)) if verb.eq_ignore_ascii_case("ACTION") => ChatText::Action(body),
        None if inner.eq_ignore_ascii_case("ACTION") => ChatText::Action(""),
        _ => ChatText::OtherCtcp,
    }
}

fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
