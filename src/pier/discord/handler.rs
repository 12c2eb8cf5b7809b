//! Gateway event handling: turns Discord guild messages into bridge messages.

use std::collections::HashMap;
use std::sync::Arc;

use serenity::async_trait;
use serenity::model::channel::Message as DiscordMessage;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{debug, info, warn};

use crate::bridge::InboundSender;
use crate::common::{Channel, Message, Sender, Source, SourceIdentity};
use crate::pier::discord::resolver::{CacheLookup, MentionResolver};

/// Forwards guild messages to the bridge.
#[derive(Clone)]
pub struct DiscordEvents {
    inbound_tx: InboundSender,
    /// Registered webhook id per Discord channel id.
    webhook_ids: Arc<HashMap<u64, u64>>,
    resolver: MentionResolver,
}

impl DiscordEvents {
    pub fn new(inbound_tx: InboundSender, webhook_ids: Arc<HashMap<u64, u64>>) -> Self {
        Self {
            inbound_tx,
            webhook_ids,
            resolver: MentionResolver::new(),
        }
    }

    fn to_bridge_message(&self, ctx: &Context, msg: &DiscordMessage) -> Option<Message> {
        let guild_id = msg.guild_id?;

        let lookup = CacheLookup {
            cache: ctx.cache.as_ref(),
            guild_id,
        };
        let mut contents = self.resolver.resolve(&msg.content, &lookup);
        for attachment in &msg.attachments {
            if !contents.is_empty() {
                contents.push(' ');
            }
            contents.push_str(&attachment.url);
        }
        if contents.trim().is_empty() {
            return None;
        }

        let channel_name = ctx
            .cache
            .guild(guild_id)
            .and_then(|guild| guild.channels.get(&msg.channel_id).map(|c| c.name.clone()))
            .unwrap_or_else(|| msg.channel_id.to_string());

        let channel_id = msg.channel_id.get();
        let channel = Channel::discord(
            channel_id,
            channel_name,
            self.webhook_ids.get(&channel_id).copied(),
        );

        // Webhook posts carry the webhook's id as their author
        let identity = msg
            .webhook_id
            .map(|id| id.get())
            .unwrap_or_else(|| msg.author.id.get());

        let sender = Sender::discord(display_name(msg), msg.author.id.get());
        let source = Source {
            channel,
            identity: SourceIdentity::Snowflake(identity),
        };

        Some(Message::new(contents, sender, source))
    }
}

/// Member nick, then global name, then account name.
fn display_name(msg: &DiscordMessage) -> String {
    msg.member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .or_else(|| msg.author.global_name.clone())
        .unwrap_or_else(|| msg.author.name.clone())
}

#[async_trait]
impl EventHandler for DiscordEvents {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "Connected to Discord as {} ({} guilds)",
            ready.user.name,
            ready.guilds.len()
        );
    }

    async fn message(&self, ctx: Context, msg: DiscordMessage) {
        let Some(message) = self.to_bridge_message(&ctx, &msg) else {
            debug!(channel = %msg.channel_id, "Ignoring Discord message");
            return;
        };

        if let Err(error) = self.inbound_tx.send(message) {
            warn!("Failed to pass Discord message to the bridge: {}", error);
        }
    }
}
