//! Configuration type definitions.

use serde::Deserialize;

/// Default IRC port (plain text).
pub const DEFAULT_IRC_PORT: u16 = 6667;

/// Default command prefix.
pub const DEFAULT_COMMAND_PREFIX: &str = "!";

/// Default number of latency samples kept for diagnostics.
pub const DEFAULT_TIMING_SAMPLES: usize = 10_000;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub irc: IrcConfig,
    pub discord: DiscordConfig,
    pub channels: Vec<ChannelMapping>,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// IRC server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    pub server: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    /// Connect with TLS (usually on port 6697).
    #[serde(default)]
    pub tls: bool,
    pub nickname: String,
    pub username: Option<String>,
    pub realname: Option<String>,
    /// Server password (PASS), if the network needs one.
    pub password: Option<String>,
}

impl IrcConfig {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nickname)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nickname)
    }
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// A webhook used to post impersonated messages into a Discord channel.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Discord channel ID.
    pub channel: String,
    /// Full webhook URL.
    pub url: String,
}

/// Maps a Discord channel to an IRC channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelMapping {
    /// Discord channel ID
    pub discord: String,
    /// IRC channel name, including the leading '#'
    pub irc: String,
}

/// In-chat command settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_command_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub system: SystemCommandConfig,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: default_command_prefix(),
            system: SystemCommandConfig::default(),
        }
    }
}

/// Who may run the diagnostics command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemCommandConfig {
    /// IRC services account names.
    #[serde(default)]
    pub irc_accounts: Vec<String>,
    /// Discord user IDs.
    #[serde(default)]
    pub discord_ids: Vec<u64>,
}

/// Bridge-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Display name used for the bridge's own messages.
    #[serde(default = "default_bridge_name")]
    pub name: String,
    /// Number of relay latency samples to keep.
    #[serde(default = "default_timing_samples")]
    pub timing_samples: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: default_bridge_name(),
            timing_samples: default_timing_samples(),
        }
    }
}

fn default_irc_port() -> u16 {
    DEFAULT_IRC_PORT
}

fn default_command_prefix() -> String {
    DEFAULT_COMMAND_PREFIX.to_string()
}

fn default_bridge_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_timing_samples() -> usize {
    DEFAULT_TIMING_SAMPLES
}
