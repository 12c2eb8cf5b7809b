//! Canonical message types for bridge communication.
//!
//! A [`Message`] is an immutable value: every stage of the bridge pipeline
//! returns a new message instead of rewriting the one it was handed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Unique identifier of a message inside this process.
pub type MessageId = u64;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_message_id() -> MessageId {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Chat network a channel lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformType {
    Irc,
    Discord,
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Irc => write!(f, "IRC"),
            Self::Discord => write!(f, "Discord"),
        }
    }
}

/// Where a message should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    IrcOnly,
    DiscordOnly,
    Both,
}

impl Destination {
    /// Destination that only reaches the network opposite to `platform`.
    pub fn opposite_of(platform: PlatformType) -> Self {
        match platform {
            PlatformType::Irc => Self::DiscordOnly,
            PlatformType::Discord => Self::IrcOnly,
        }
    }

    /// Check if this destination includes the given network.
    pub fn includes(self, platform: PlatformType) -> bool {
        matches!(
            (self, platform),
            (Self::Both, _)
                | (Self::IrcOnly, PlatformType::Irc)
                | (Self::DiscordOnly, PlatformType::Discord)
        )
    }

    /// Networks this destination resolves to, IRC first.
    pub fn targets(self) -> Vec<PlatformType> {
        [PlatformType::Irc, PlatformType::Discord]
            .into_iter()
            .filter(|platform| self.includes(*platform))
            .collect()
    }
}

/// A chat participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Name shown to the other side of the bridge.
    pub display_name: String,
    /// IRC services (NickServ) account, if the server told us.
    pub irc_account: Option<String>,
    /// Discord user snowflake.
    pub discord_id: Option<u64>,
    bridge: bool,
}

impl Sender {
    /// A user seen on IRC.
    pub fn irc(nick: impl Into<String>, account: Option<String>) -> Self {
        Self {
            display_name: nick.into(),
            irc_account: account,
            discord_id: None,
            bridge: false,
        }
    }

    /// A user seen on Discord.
    pub fn discord(display_name: impl Into<String>, user_id: u64) -> Self {
        Self {
            display_name: display_name.into(),
            irc_account: None,
            discord_id: Some(user_id),
            bridge: false,
        }
    }

    /// The bridge's own identity, used for command replies and announcements.
    ///
    /// Never compares equal to a user built with [`Sender::irc`] or
    /// [`Sender::discord`], even with the same display name.
    pub fn bridge(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            irc_account: None,
            discord_id: None,
            bridge: true,
        }
    }

    pub fn is_bridge(&self) -> bool {
        self.bridge
    }
}

/// A network-scoped chat room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub platform: PlatformType,
    /// IRC channel name or Discord channel snowflake.
    pub id: String,
    /// Human readable name, for logs.
    pub name: String,
    /// Snowflake of the webhook registered for this channel (Discord only).
    pub webhook_id: Option<u64>,
}

impl Channel {
    pub fn irc(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            platform: PlatformType::Irc,
            id: name.clone(),
            name,
            webhook_id: None,
        }
    }

    pub fn discord(id: u64, name: impl Into<String>, webhook_id: Option<u64>) -> Self {
        Self {
            platform: PlatformType::Discord,
            id: id.to_string(),
            name: name.into(),
            webhook_id,
        }
    }
}

/// Platform identity that produced a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceIdentity {
    /// IRC nickname.
    Nick(String),
    /// Discord user or webhook snowflake.
    Snowflake(u64),
}

/// Where a message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub channel: Channel,
    pub identity: SourceIdentity,
}

impl Source {
    pub fn platform(&self) -> PlatformType {
        self.channel.platform
    }
}

/// A chat message travelling through the bridge.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub contents: String,
    pub sender: Sender,
    pub source: Source,
    pub destination: Destination,
    /// Monotonic receive time, start of the relay latency measurement.
    pub received_at: Instant,
}

impl Message {
    /// Create a message as received by a pier. It is headed for the other network.
    pub fn new(contents: impl Into<String>, sender: Sender, source: Source) -> Self {
        let destination = Destination::opposite_of(source.platform());
        Self {
            id: next_message_id(),
            contents: contents.into(),
            sender,
            source,
            destination,
            received_at: Instant::now(),
        }
    }

    pub fn with_contents(self, contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            ..self
        }
    }

    pub fn with_destination(self, destination: Destination) -> Self {
        Self {
            destination,
            ..self
        }
    }

    /// Build the bridge's reply to this message.
    ///
    /// The reply gets a fresh id but keeps the receive time, so relay latency
    /// covers the command handling as well.
    pub fn reply(&self, contents: impl Into<String>, bot: &Sender) -> Self {
        Self {
            id: next_message_id(),
            contents: contents.into(),
            sender: bot.clone(),
            source: self.source.clone(),
            destination: self.destination,
            received_at: self.received_at,
        }
    }

    pub fn originates_from_bridge(&self) -> bool {
        self.sender.is_bridge()
    }

    pub fn platform(&self) -> PlatformType {
        self.source.platform()
    }
}
