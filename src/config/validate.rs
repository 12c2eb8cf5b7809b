//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use std::collections::HashSet;

use reqwest::Url;
use tracing::warn;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Discord
    if config.discord.token.is_empty() {
        errors.push("discord.token is required".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }

    // IRC
    if config.irc.server.is_empty() {
        errors.push("irc.server is required".to_string());
    }
    if config.irc.nickname.is_empty() {
        errors.push("irc.nickname is required".to_string());
    }
    if config.irc.nickname.contains(' ') {
        errors.push(format!(
            "irc.nickname '{}' must not contain spaces",
            config.irc.nickname
        ));
    }
    if config.irc.port == 0 {
        errors.push("irc.port must be non-zero".to_string());
    }

    // Channel mappings
    if config.channels.is_empty() {
        errors.push("channels is empty - no message routing configured".to_string());
    }

    let mut seen_discord = HashSet::new();
    let mut seen_irc = HashSet::new();
    for (i, mapping) in config.channels.iter().enumerate() {
        if mapping.discord.parse::<u64>().is_err() {
            errors.push(format!(
                "channels[{}].discord '{}' is not a Discord channel ID",
                i, mapping.discord
            ));
        }
        if !mapping.irc.starts_with('#') && !mapping.irc.starts_with('&') {
            errors.push(format!(
                "channels[{}].irc '{}' must start with '#' or '&'",
                i, mapping.irc
            ));
        }
        if !seen_discord.insert(mapping.discord.clone()) {
            errors.push(format!(
                "channels[{}].discord '{}' is mapped more than once",
                i, mapping.discord
            ));
        }
        if !seen_irc.insert(mapping.irc.to_lowercase()) {
            errors.push(format!(
                "channels[{}].irc '{}' is mapped more than once",
                i, mapping.irc
            ));
        }
    }

    // A bad webhook only costs its channel the impersonated send
    for problem in webhook_problems(config) {
        warn!("{}; messages to that channel will be sent by the bot", problem);
    }

    // Commands
    if config.commands.prefix.chars().count() != 1 {
        errors.push(format!(
            "commands.prefix must be a single character (got '{}')",
            config.commands.prefix
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

/// Webhook entries that cannot be registered.
pub fn webhook_problems(config: &Config) -> Vec<String> {
    let mapped: HashSet<&str> = config
        .channels
        .iter()
        .map(|mapping| mapping.discord.as_str())
        .collect();

    let mut problems = Vec::new();
    for (i, webhook) in config.discord.webhooks.iter().enumerate() {
        if Url::parse(&webhook.url).is_err() {
            problems.push(format!(
                "discord.webhooks[{}].url is not a valid URL: '{}'",
                i, webhook.url
            ));
        }
        if !mapped.contains(webhook.channel.as_str()) {
            problems.push(format!(
                "discord.webhooks[{}].channel '{}' is not part of any channel mapping",
                i, webhook.channel
            ));
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            irc: IrcConfig {
                server: "irc.libera.chat".to_string(),
                port: 6667,
                tls: false,
                nickname: "harbor".to_string(),
                username: None,
                realname: None,
                password: None,
            },
            discord: DiscordConfig {
                token: "valid_token_here".to_string(),
                webhooks: vec![WebhookConfig {
                    channel: "987654321".to_string(),
                    url: "https://discord.com/api/webhooks/1/abc".to_string(),
                }],
            },
            channels: vec![ChannelMapping {
                discord: "987654321".to_string(),
                irc: "#rust".to_string(),
            }],
            commands: CommandsConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("discord.token"));
    }

    #[test]
    fn test_placeholder_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = "YOUR_DISCORD_TOKEN_HERE".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("placeholder"));
    }

    #[test]
    fn test_irc_channel_without_hash_fails() {
        let mut config = make_valid_config();
        config.channels[0].irc = "rust".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("must start with '#'"));
    }

    #[test]
    fn test_non_numeric_discord_channel_fails() {
        let mut config = make_valid_config();
        config.channels[0].discord = "general".to_string();
        config.discord.webhooks.clear();

        let result = validate_config(&config);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("is not a Discord channel ID"));
    }

    #[test]
    fn test_duplicate_mapping_fails() {
        let mut config = make_valid_config();
        config.channels.push(ChannelMapping {
            discord: "111".to_string(),
            irc: "#RUST".to_string(),
        });

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("mapped more than once"));
    }

    #[test]
    fn test_invalid_webhook_url_still_validates() {
        let mut config = make_valid_config();
        config.discord.webhooks[0].url = "not a url".to_string();

        assert!(validate_config(&config).is_ok());
        let problems = webhook_problems(&config);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("not a valid URL"));
    }

    #[test]
    fn test_webhook_for_unmapped_channel_still_validates() {
        let mut config = make_valid_config();
        config.discord.webhooks[0].channel = "111".to_string();

        assert!(validate_config(&config).is_ok());
        assert!(webhook_problems(&config)[0].contains("not part of any channel mapping"));
    }

    #[test]
    fn test_valid_webhook_has_no_problems() {
        assert!(webhook_problems(&make_valid_config()).is_empty());
    }

    #[test]
    fn test_multi_char_prefix_fails() {
        let mut config = make_valid_config();
        config.commands.prefix = "!!".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("single character"));
    }
}
