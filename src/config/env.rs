//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `HARBOR_DISCORD_TOKEN` - Discord bot token
//! - `HARBOR_IRC_SERVER` - IRC server host
//! - `HARBOR_IRC_PORT` - IRC server port
//! - `HARBOR_IRC_NICKNAME` - IRC nickname
//! - `HARBOR_IRC_PASSWORD` - IRC server password

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "HARBOR";

/// Apply environment variable overrides to a config.
///
/// This allows secrets like the bot token to be provided via environment
/// variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }

    if let Ok(server) = env::var(format!("{}_IRC_SERVER", ENV_PREFIX)) {
        config.irc.server = server;
    }
    if let Ok(port) = env::var(format!("{}_IRC_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.irc.port = port;
        }
    }
    if let Ok(nickname) = env::var(format!("{}_IRC_NICKNAME", ENV_PREFIX)) {
        config.irc.nickname = nickname;
    }
    if let Ok(password) = env::var(format!("{}_IRC_PASSWORD", ENV_PREFIX)) {
        config.irc.password = Some(password);
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `HARBOR_CONFIG` environment variable, otherwise returns "harbor.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "harbor.conf".to_string())
}
