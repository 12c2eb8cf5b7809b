//! Channel mapping between the two networks.

use std::collections::HashMap;

use crate::common::{Channel, PlatformType};
use crate::config::ChannelMapping;

/// Bidirectional Discord channel ID <-> IRC channel name lookup.
///
/// IRC channel names are case-insensitive, so they are keyed in lowercase.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    discord_to_irc: HashMap<String, String>,
    irc_to_discord: HashMap<String, String>,
}

impl ChannelMap {
    pub fn from_config(mappings: &[ChannelMapping]) -> Self {
        let mut map = Self::default();
        for mapping in mappings {
            map.discord_to_irc
                .insert(mapping.discord.clone(), mapping.irc.clone());
            map.irc_to_discord
                .insert(mapping.irc.to_lowercase(), mapping.discord.clone());
        }
        map
    }

    pub fn irc_channel_for(&self, discord_channel: &str) -> Option<&str> {
        self.discord_to_irc.get(discord_channel).map(String::as_str)
    }

    pub fn discord_channel_for(&self, irc_channel: &str) -> Option<&str> {
        self.irc_to_discord
            .get(&irc_channel.to_lowercase())
            .map(String::as_str)
    }

    /// Channel on `target` that messages from `source` go to.
    ///
    /// The same network resolves to the source channel itself, as long as it is bridged.
    pub fn resolve(&self, source: &Channel, target: PlatformType) -> Option<String> {
        match (source.platform, target) {
            (PlatformType::Irc, PlatformType::Discord) => {
                self.discord_channel_for(&source.id).map(str::to_string)
            }
            (PlatformType::Discord, PlatformType::Irc) => {
                self.irc_channel_for(&source.id).map(str::to_string)
            }
            (PlatformType::Irc, PlatformType::Irc) => self
                .discord_channel_for(&source.id)
                .map(|_| source.id.clone()),
            (PlatformType::Discord, PlatformType::Discord) => self
                .irc_channel_for(&source.id)
                .map(|_| source.id.clone()),
        }
    }

    /// IRC channels the IRC pier should join.
    pub fn irc_channels(&self) -> Vec<String> {
        self.discord_to_irc.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> ChannelMap {
        ChannelMap::from_config(&[ChannelMapping {
            discord: "123".to_string(),
            irc: "#Rust".to_string(),
        }])
    }

    #[test]
    fn test_lookup_both_ways() {
        let map = map();
        assert_eq!(map.irc_channel_for("123"), Some("#Rust"));
        assert_eq!(map.discord_channel_for("#rust"), Some("123"));
        assert_eq!(map.discord_channel_for("#RUST"), Some("123"));
        assert_eq!(map.discord_channel_for("#go"), None);
    }

    #[test]
    fn test_resolve_across_networks() {
        let map = map();
        assert_eq!(
            map.resolve(&Channel::irc("#rust"), PlatformType::Discord),
            Some("123".to_string())
        );
        assert_eq!(
            map.resolve(&Channel::discord(123, "rust", None), PlatformType::Irc),
            Some("#Rust".to_string())
        );
    }

    #[test]
    fn test_resolve_same_network() {
        let map = map();
        assert_eq!(
            map.resolve(&Channel::irc("#rust"), PlatformType::Irc),
            Some("#rust".to_string())
        );
        assert_eq!(map.resolve(&Channel::irc("#go"), PlatformType::Irc), None);
    }

    #[test]
    fn test_unmapped_channel_resolves_nowhere() {
        let map = map();
        assert_eq!(
            map.resolve(&Channel::discord(999, "random", None), PlatformType::Irc),
            None
        );
    }
}
