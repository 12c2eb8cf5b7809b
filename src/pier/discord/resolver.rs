//! Mention and custom emoji resolution for text leaving Discord.
//!
//! Discord encodes mentions as `<@id>`, `<#id>` and `<@&id>`, which mean
//! nothing on IRC. They are replaced with readable names before the message
//! reaches the bridge.

use fancy_regex::{Captures, Regex};
use serenity::cache::Cache;
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};

/// Looks up display names for Discord snowflakes.
pub trait NameLookup {
    fn user(&self, id: u64) -> Option<String>;
    fn channel(&self, id: u64) -> Option<String>;
    fn role(&self, id: u64) -> Option<String>;
}

/// Name lookup backed by the serenity cache for one guild.
pub struct CacheLookup<'a> {
    pub cache: &'a Cache,
    pub guild_id: GuildId,
}

impl NameLookup for CacheLookup<'_> {
    fn user(&self, id: u64) -> Option<String> {
        let user_id = UserId::new(id);
        let member_name = self.cache.guild(self.guild_id).and_then(|guild| {
            guild
                .members
                .get(&user_id)
                .map(|member| member.display_name().to_string())
        });

        member_name.or_else(|| {
            self.cache
                .user(user_id)
                .map(|user| user.global_name.clone().unwrap_or_else(|| user.name.clone()))
        })
    }

    fn channel(&self, id: u64) -> Option<String> {
        let guild = self.cache.guild(self.guild_id)?;
        guild
            .channels
            .get(&ChannelId::new(id))
            .map(|channel| channel.name.clone())
    }

    fn role(&self, id: u64) -> Option<String> {
        let guild = self.cache.guild(self.guild_id)?;
        guild.roles.get(&RoleId::new(id)).map(|role| role.name.clone())
    }
}

/// Rewrites Discord mention markup into plain text.
#[derive(Debug, Clone)]
pub struct MentionResolver {
    /// Pattern for Discord user mentions (<@123> or <@!123>).
    mention_pattern: Regex,
    /// Pattern for Discord channel mentions (<#123>).
    channel_pattern: Regex,
    /// Pattern for Discord role mentions (<@&123>).
    role_pattern: Regex,
    /// Pattern for Discord custom emojis (<:name:id> or <a:name:id>).
    emoji_pattern: Regex,
}

impl Default for MentionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MentionResolver {
    pub fn new() -> Self {
        Self {
            mention_pattern: Regex::new(r"<@!?(\d+)>").unwrap(),
            channel_pattern: Regex::new(r"<#(\d+)>").unwrap(),
            role_pattern: Regex::new(r"<@&(\d+)>").unwrap(),
            emoji_pattern: Regex::new(r"<a?:([a-zA-Z0-9_]+):\d+>").unwrap(),
        }
    }

    /// Replace mentions with `@name` / `#name` and custom emojis with `:name:`.
    ///
    /// Mentions of unknown ids are left untouched.
    pub fn resolve(&self, text: &str, lookup: &dyn NameLookup) -> String {
        let text = replace_ids(&self.mention_pattern, text, |id| {
            lookup.user(id).map(|name| format!("@{}", name))
        });
        let text = replace_ids(&self.role_pattern, &text, |id| {
            lookup.role(id).map(|name| format!("@{}", name))
        });
        let text = replace_ids(&self.channel_pattern, &text, |id| {
            lookup.channel(id).map(|name| format!("#{}", name))
        });

        self.emoji_pattern
            .replace_all(&text, |caps: &Captures| -> String { format!(":{}:", &caps[1]) })
            .to_string()
    }
}

/// Replace every match of `pattern` whose first group is a snowflake the lookup knows.
fn replace_ids(pattern: &Regex, text: &str, lookup: impl Fn(u64) -> Option<String>) -> String {
    pattern
        .replace_all(text, |caps: &Captures| -> String {
            caps[1]
                .parse::<u64>()
                .ok()
                .filter(|id| *id != 0)
                .and_then(&lookup)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeLookup {
        users: HashMap<u64, String>,
        channels: HashMap<u64, String>,
        roles: HashMap<u64, String>,
    }

    impl NameLookup for FakeLookup {
        fn user(&self, id: u64) -> Option<String> {
            self.users.get(&id).cloned()
        }
        fn channel(&self, id: u64) -> Option<String> {
            self.channels.get(&id).cloned()
        }
        fn role(&self, id: u64) -> Option<String> {
            self.roles.get(&id).cloned()
        }
    }

    fn lookup() -> FakeLookup {
        let mut lookup = FakeLookup::default();
        lookup.users.insert(10, "alice".to_string());
        lookup.channels.insert(20, "general".to_string());
        lookup.roles.insert(30, "mods".to_string());
        lookup
    }

    #[test]
    fn test_resolves_known_mentions() {
        let resolver = MentionResolver::new();
        assert_eq!(
            resolver.resolve("hi <@10> and <@!10>, see <#20> <@&30>", &lookup()),
            "hi @alice and @alice, see #general @mods"
        );
    }

    #[test]
    fn test_unknown_ids_are_kept() {
        let resolver = MentionResolver::new();
        assert_eq!(resolver.resolve("<@99> <#0>", &lookup()), "<@99> <#0>");
    }

    #[test]
    fn test_custom_emojis_become_shortcodes() {
        let resolver = MentionResolver::new();
        assert_eq!(
            resolver.resolve("nice <:ferris:123> <a:party:456>", &lookup()),
            "nice :ferris: :party:"
        );
    }
}
