//! Formatting translation between IRC control codes and Discord markdown.
//!
//! The two directions are deliberately asymmetric. IRC formatting is a set of
//! toggles with no grammar, so text coming from IRC is balanced and then
//! substituted character by character. Discord text is markdown, so it is
//! parsed into events and rendered back out with IRC control codes.
//! Round-tripping is lossy in both directions.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use tracing::warn;

use crate::common::{PlatformType, Sender, Source};
use crate::mutator::Mutator;

/// IRC formatting control characters.
///
/// Based on <https://modern.ircdocs.horse/formatting.html>.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrcFormattingCode {
    Bold,
    Italics,
    Underline,
    Strikethrough,
    Monospace,
}

impl IrcFormattingCode {
    pub const ALL: [Self; 5] = [
        Self::Bold,
        Self::Italics,
        Self::Underline,
        Self::Strikethrough,
        Self::Monospace,
    ];

    pub const fn as_char(self) -> char {
        match self {
            Self::Bold => '\x02',
            Self::Italics => '\x1D',
            Self::Underline => '\x1F',
            Self::Strikethrough => '\x1E',
            Self::Monospace => '\x11',
        }
    }

    /// Markdown delimiter Discord uses for the same style.
    pub const fn discord_delimiter(self) -> &'static str {
        match self {
            Self::Bold => "**",
            Self::Italics => "*",
            Self::Underline => "__",
            Self::Strikethrough => "~~",
            Self::Monospace => "`",
        }
    }
}

/// Translate message text for the network opposite to `source`.
pub fn translate(text: &str, source: PlatformType) -> String {
    match source {
        PlatformType::Irc => format_for_discord(text),
        PlatformType::Discord => {
            let rendered = format_for_irc(text);
            if !rendered.unsupported.is_empty() {
                warn!(
                    unsupported = ?rendered.unsupported,
                    "Rendered markdown with unsupported constructs as plain text"
                );
            }
            rendered.text
        }
    }
}

/// Append a closing toggle for every IRC formatting code that occurs an odd
/// number of times, so each opened style is closed again.
pub fn fix_irc_formatting_balance(text: &str) -> String {
    let mut out = text.to_string();

    for code in IrcFormattingCode::ALL {
        let ch = code.as_char();
        if out.chars().filter(|c| *c == ch).count() % 2 != 0 {
            out.push(ch);
        }
    }

    out
}

/// Takes a message from IRC and swaps the control codes for markdown delimiters.
///
/// This is a literal substitution, not a parser: overlapping toggles come out
/// as overlapping delimiters, and markdown already present in the text is left
/// as it is.
pub fn format_for_discord(text: &str) -> String {
    let mut out = fix_irc_formatting_balance(text);

    for code in IrcFormattingCode::ALL {
        out = out.replace(code.as_char(), code.discord_delimiter());
    }

    out
}

/// Result of rendering markdown for IRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcRendering {
    pub text: String,
    /// Constructs the renderer has no mapping for. Their content was kept as
    /// plain text.
    pub unsupported: Vec<String>,
}

/// Takes a message from Discord and renders its markdown with IRC control codes.
pub fn format_for_irc(text: &str) -> IrcRendering {
    let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH);
    IrcRenderer::default().render(parser)
}

/// Walks markdown events and writes IRC formatted text.
#[derive(Debug, Default)]
struct IrcRenderer {
    out: String,
    unsupported: Vec<String>,
    /// Nesting depth inside a link or image whose display text is discarded.
    skip_depth: usize,
    /// Inside a code or html block.
    in_block: bool,
}

impl IrcRenderer {
    fn render<'a>(mut self, events: impl Iterator<Item = Event<'a>>) -> IrcRendering {
        for event in events {
            if self.skip_depth > 0 {
                match event {
                    Event::Start(_) => self.skip_depth += 1,
                    Event::End(_) => self.skip_depth -= 1,
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(tag) => self.start(tag),
                Event::End(tag) => self.end(tag),
                Event::Text(text) if self.in_block => self.push_block_lines(&text),
                Event::Text(text) => self.out.push_str(&text),
                Event::Code(code) => {
                    self.toggle(IrcFormattingCode::Monospace);
                    self.out.push_str(&code);
                    self.toggle(IrcFormattingCode::Monospace);
                }
                Event::Html(html) => self.push_block_lines(&html),
                Event::InlineHtml(html) => self.out.push_str(&html),
                Event::SoftBreak | Event::HardBreak => self.out.push('\n'),
                Event::Rule => {}
                Event::InlineMath(text) | Event::DisplayMath(text) => {
                    self.unsupported.push("math".to_string());
                    self.out.push_str(&text);
                }
                Event::FootnoteReference(label) => {
                    self.unsupported.push("footnote reference".to_string());
                    self.out.push_str(&format!("[^{}]", label));
                }
                Event::TaskListMarker(checked) => {
                    self.unsupported.push("task list marker".to_string());
                    self.out.push_str(if checked { "[x] " } else { "[ ] " });
                }
            }
        }

        IrcRendering {
            text: self.out,
            unsupported: self.unsupported,
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Strong => self.toggle(IrcFormattingCode::Bold),
            Tag::Emphasis => self.toggle(IrcFormattingCode::Italics),
            Tag::Strikethrough => self.toggle(IrcFormattingCode::Strikethrough),
            Tag::CodeBlock(_) | Tag::HtmlBlock => self.in_block = true,
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                self.out.push_str(&dest_url);
                self.skip_depth = 1;
            }
            Tag::Paragraph
            | Tag::Heading { .. }
            | Tag::BlockQuote(_)
            | Tag::List(_)
            | Tag::Item => {}
            other => self.unsupported.push(format!("{:?}", other)),
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Strong => self.toggle(IrcFormattingCode::Bold),
            TagEnd::Emphasis => self.toggle(IrcFormattingCode::Italics),
            TagEnd::Strikethrough => self.toggle(IrcFormattingCode::Strikethrough),
            TagEnd::CodeBlock | TagEnd::HtmlBlock => self.in_block = false,
            _ => {}
        }
    }

    fn toggle(&mut self, code: IrcFormattingCode) {
        self.out.push(code.as_char());
    }

    /// Block content is wrapped line by line, since IRC clients reset
    /// formatting at the end of every message.
    fn push_block_lines(&mut self, text: &str) {
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            if !line.is_empty() {
                self.toggle(IrcFormattingCode::Monospace);
                self.out.push_str(line);
                self.toggle(IrcFormattingCode::Monospace);
            }
        }
    }
}

/// Mutator translating formatting for the network on the other side.
#[derive(Debug, Default)]
pub struct TranslateFormatting;

impl Mutator for TranslateFormatting {
    fn name(&self) -> &'static str {
        "translate_formatting"
    }

    fn mutate(&self, contents: &str, source: &Source, _sender: &Sender) -> Option<String> {
        Some(translate(contents, source.platform()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::Alignment;

    const BOLD: char = '\x02';
    const ITALICS: char = '\x1D';
    const STRIKE: char = '\x1E';
    const MONO: char = '\x11';

    fn count(text: &str, ch: char) -> usize {
        text.chars().filter(|c| *c == ch).count()
    }

    #[test]
    fn test_balance_fix_makes_every_code_even() {
        let inputs = [
            "",
            "plain",
            "\x02bold",
            "\x02\x1D\x1F\x1E\x11",
            "\x02a\x02 \x1Db",
            "\x11\x11\x11 mixed \x1F",
            "ünïcödé \x1E",
        ];

        for input in inputs {
            let fixed = fix_irc_formatting_balance(input);
            for code in IrcFormattingCode::ALL {
                assert_eq!(
                    count(&fixed, code.as_char()) % 2,
                    0,
                    "odd count of {:?} in {:?}",
                    code,
                    fixed
                );
            }
        }
    }

    #[test]
    fn test_balance_fix_leaves_balanced_text_alone() {
        assert_eq!(fix_irc_formatting_balance("\x02a\x02"), "\x02a\x02");
    }

    #[test]
    fn test_unbalanced_bold_from_irc() {
        let out = format_for_discord("\x02hello");
        assert_eq!(out, "**hello**");
        assert_eq!(out.matches("**").count(), 2);
    }

    #[test]
    fn test_each_code_from_irc() {
        assert_eq!(format_for_discord("\x1Dit\x1D"), "*it*");
        assert_eq!(format_for_discord("\x1Fun\x1F"), "__un__");
        assert_eq!(format_for_discord("\x1Es\x1E"), "~~s~~");
        assert_eq!(format_for_discord("\x11c\x11"), "`c`");
    }

    #[test]
    fn test_markdown_from_irc_is_literal() {
        assert_eq!(format_for_discord("**not bold** _x_"), "**not bold** _x_");
        assert_eq!(translate("plain", PlatformType::Irc), "plain");
    }

    #[test]
    fn test_overlapping_toggles_translate_literally() {
        assert_eq!(format_for_discord("\x02a\x1Db\x02c\x1D"), "**a*b**c*");
    }

    #[test]
    fn test_bold_from_discord() {
        let out = translate("**x**", PlatformType::Discord);
        assert_eq!(out, format!("{BOLD}x{BOLD}"));
        assert_eq!(count(&out, BOLD), 2);
    }

    #[test]
    fn test_styles_from_discord() {
        assert_eq!(format_for_irc("*it*").text, format!("{ITALICS}it{ITALICS}"));
        assert_eq!(format_for_irc("_it_").text, format!("{ITALICS}it{ITALICS}"));
        assert_eq!(format_for_irc("~~gone~~").text, format!("{STRIKE}gone{STRIKE}"));
        assert_eq!(
            format_for_irc("**a _b_**").text,
            format!("{BOLD}a {ITALICS}b{ITALICS}{BOLD}")
        );
    }

    #[test]
    fn test_plain_text_from_discord_unchanged() {
        for text in ["hello world", "it's 5 o'clock", "a - b", "C# and F#"] {
            assert_eq!(format_for_irc(text).text, text);
        }
    }

    #[test]
    fn test_code_from_discord_is_verbatim() {
        assert_eq!(
            format_for_irc("run `**x**` now").text,
            format!("run {MONO}**x**{MONO} now")
        );
        assert_eq!(
            format_for_irc("```\nfn main() {}\n```").text,
            format!("{MONO}fn main() {{}}{MONO}\n")
        );
        assert_eq!(
            format_for_irc("    indented").text.trim_end_matches('\n'),
            format!("{MONO}indented{MONO}")
        );
    }

    #[test]
    fn test_code_block_lines_are_wrapped_separately() {
        assert_eq!(
            format_for_irc("```rust\nlet a = 1;\n\nlet b = 2;\n```").text,
            format!("{MONO}let a = 1;{MONO}\n\n{MONO}let b = 2;{MONO}\n")
        );
    }

    #[test]
    fn test_links_and_images_keep_only_destination() {
        assert_eq!(
            format_for_irc("see [the docs](https://docs.rs) now").text,
            "see https://docs.rs now"
        );
        assert_eq!(
            format_for_irc("![**cat**](https://cat.png)").text,
            "https://cat.png"
        );
    }

    #[test]
    fn test_html() {
        assert_eq!(format_for_irc("hi <b>x</b>").text, "hi <b>x</b>");

        let block = format_for_irc("<div>\nhi\n</div>").text;
        assert_eq!(
            block.trim_end_matches('\n'),
            format!("{MONO}<div>{MONO}\n{MONO}hi{MONO}\n{MONO}</div>{MONO}")
        );
    }

    #[test]
    fn test_line_breaks_become_newlines() {
        assert_eq!(format_for_irc("one\ntwo").text, "one\ntwo");
        assert_eq!(format_for_irc("one  \ntwo").text, "one\ntwo");
    }

    #[test]
    fn test_block_structure_is_transparent() {
        assert_eq!(format_for_irc("# Title").text, "Title");
        assert_eq!(format_for_irc("> quoted").text, "quoted");
        assert_eq!(format_for_irc("- one").text, "one");
        assert_eq!(format_for_irc("1. first").text, "first");
        assert_eq!(format_for_irc("---").text, "");
    }

    #[test]
    fn test_unsupported_nodes_render_children() {
        let events = vec![
            Event::Start(Tag::Table(vec![Alignment::None])),
            Event::Start(Tag::Strong),
            Event::Text("cell".into()),
            Event::End(TagEnd::Strong),
            Event::End(TagEnd::Table),
        ];

        let rendered = IrcRenderer::default().render(events.into_iter());
        assert_eq!(rendered.text, format!("{BOLD}cell{BOLD}"));
        assert_eq!(rendered.unsupported.len(), 1);
    }

    #[test]
    fn test_round_trip_is_not_identity() {
        let from_irc = format_for_discord("\x1Funder\x1F");
        assert_eq!(from_irc, "__under__");
        // Discord reads __x__ as strong emphasis, not underline
        assert_eq!(format_for_irc(&from_irc).text, format!("{BOLD}under{BOLD}"));
    }
}
