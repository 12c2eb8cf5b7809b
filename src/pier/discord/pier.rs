//! Discord pier: serenity client lifecycle, webhooks and outbound sends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serenity::all::{CreateAllowedMentions, CreateMessage, ExecuteWebhook, Webhook};
use serenity::async_trait;
use serenity::cache::Cache;
use serenity::gateway::ShardManager;
use serenity::http::{Http, HttpBuilder};
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::bridge::PierChannels;
use crate::common::text::split_message;
use crate::common::{Message, PierError, PierResult, PlatformType, Source, SourceIdentity};
use crate::config::{DiscordConfig, WebhookConfig};
use crate::pier::discord::handler::DiscordEvents;
use crate::pier::Pier;

/// Discord's limit on message content length.
const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Create an exponential backoff iterator for Discord reconnection.
/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn discord_backoff() -> impl Iterator<Item = Duration> {
    use backon::BackoffBuilder;

    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(5 * 60))
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

fn build_http(token: &str) -> anyhow::Result<Http> {
    // Build a custom reqwest client with timeout settings
    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    Ok(HttpBuilder::new(token).client(reqwest_client).build())
}

async fn build_client(token: &str, events: DiscordEvents) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let client = serenity::client::ClientBuilder::new_with_http(build_http(token)?, intents)
        .event_handler(events)
        .await?;
    Ok(client)
}

/// Resolve the configured webhooks. Broken ones are logged and skipped.
async fn register_webhooks(http: &Arc<Http>, hooks: &[WebhookConfig]) -> HashMap<u64, Webhook> {
    let mut webhooks = HashMap::new();
    if hooks.is_empty() {
        return webhooks;
    }

    info!("Initializing Discord webhooks");
    for hook in hooks {
        let Ok(channel_id) = hook.channel.parse::<u64>() else {
            error!("Webhook channel {} is not a Discord channel id", hook.channel);
            continue;
        };

        match Webhook::from_url(http, &hook.url).await {
            Ok(webhook) => {
                info!("Webhook for {} registered", hook.channel);
                webhooks.insert(channel_id, webhook);
            }
            Err(e) => error!("Webhook for {} is not valid: {}", hook.channel, e),
        }
    }
    webhooks
}

/// Whether `identity` is the bot account or the channel's webhook.
pub fn is_bridge_identity(identity: u64, bot_id: Option<u64>, webhook_id: Option<u64>) -> bool {
    bot_id == Some(identity) || webhook_id == Some(identity)
}

/// Text posted by the bot account itself, which cannot impersonate anyone.
pub fn bot_account_text(message: &Message) -> String {
    if message.sender.is_bridge() {
        message.contents.clone()
    } else {
        format!("<{}> {}", message.sender.display_name, message.contents)
    }
}

/// Never ping `@everyone`, `@here` or roles from relayed text.
fn no_mass_mentions() -> CreateAllowedMentions {
    CreateAllowedMentions::new()
        .all_users(true)
        .all_roles(false)
        .everyone(false)
}

/// Handles of the serenity client currently running.
#[derive(Clone)]
struct ClientHandles {
    cache: Arc<Cache>,
    shard_manager: Arc<ShardManager>,
}

/// The Discord side of the bridge.
pub struct DiscordPier {
    http: Arc<Http>,
    webhooks: HashMap<u64, Webhook>,
    /// Channel id to the id of its registered webhook.
    webhook_ids: Arc<HashMap<u64, u64>>,
    client: RwLock<Option<ClientHandles>>,
    stopping: AtomicBool,
}

/// Runs (and rebuilds when needed) the serenity client behind a [`DiscordPier`].
pub struct DiscordClientTask {
    pier: Arc<DiscordPier>,
    token: String,
    events: DiscordEvents,
    client: Option<Client>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordPier {
    /// Build the client and register webhooks. The gateway connection starts with
    /// [`DiscordClientTask::run`].
    pub async fn connect(
        config: &DiscordConfig,
        pier_channels: PierChannels,
    ) -> anyhow::Result<(Arc<Self>, DiscordClientTask)> {
        info!("Connecting to Discord API...");

        let http = Arc::new(build_http(&config.token)?);
        let webhooks = register_webhooks(&http, &config.webhooks).await;
        let webhook_ids: Arc<HashMap<u64, u64>> = Arc::new(
            webhooks
                .iter()
                .map(|(channel, webhook)| (*channel, webhook.id.get()))
                .collect(),
        );

        let events = DiscordEvents::new(pier_channels.inbound_tx, Arc::clone(&webhook_ids));
        let client = build_client(&config.token, events.clone()).await?;

        let pier = Arc::new(Self {
            http,
            webhooks,
            webhook_ids,
            client: RwLock::new(None),
            stopping: AtomicBool::new(false),
        });
        pier.attach(&client);

        let task = DiscordClientTask {
            pier: Arc::clone(&pier),
            token: config.token.clone(),
            events,
            client: Some(client),
            shutdown_rx: pier_channels.shutdown_rx,
        };

        Ok((pier, task))
    }

    fn attach(&self, client: &Client) {
        let handles = ClientHandles {
            cache: Arc::clone(&client.cache),
            shard_manager: Arc::clone(&client.shard_manager),
        };
        match self.client.write() {
            Ok(mut slot) => *slot = Some(handles),
            Err(poisoned) => *poisoned.into_inner() = Some(handles),
        }
    }

    fn handles(&self) -> Option<ClientHandles> {
        match self.client.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn cache(&self) -> Option<Arc<Cache>> {
        self.handles().map(|handles| handles.cache)
    }

    fn bot_id(&self) -> Option<u64> {
        let cache = self.cache()?;
        let id = cache.current_user().id.get();
        Some(id)
    }

    /// Avatar of the first cached user whose name matches `name`.
    fn avatar_for(&self, name: &str) -> Option<String> {
        let cache = self.cache()?;
        for guild_id in cache.guilds() {
            let Some(guild) = cache.guild(guild_id) else {
                continue;
            };
            let found = guild.members.values().find(|member| {
                member.user.name.eq_ignore_ascii_case(name)
                    || member.display_name().eq_ignore_ascii_case(name)
            });
            if let Some(member) = found {
                return member.user.avatar_url();
            }
        }
        None
    }

    /// `Some(true)` if the bot may post in `channel_id`, `None` if the channel is unknown.
    fn can_talk(&self, channel_id: ChannelId) -> Option<bool> {
        let cache = self.cache()?;
        let bot_id = cache.current_user().id;

        for guild_id in cache.guilds() {
            let Some(guild) = cache.guild(guild_id) else {
                continue;
            };
            let Some(channel) = guild.channels.get(&channel_id) else {
                continue;
            };
            let Some(member) = guild.members.get(&bot_id) else {
                debug!("Own member not cached, assuming send permission");
                return Some(true);
            };
            let permissions = guild.user_permissions_in(channel, member);
            return Some(permissions.view_channel() && permissions.send_messages());
        }
        None
    }

    async fn send_webhook(&self, webhook: &Webhook, message: &Message) -> PierResult<()> {
        let mut username = message.sender.display_name.clone();
        let mut avatar_url = self.avatar_for(&username);

        if message.sender.is_bridge() {
            if let Some(cache) = self.cache() {
                let me = cache.current_user();
                username = me.name.clone();
                avatar_url = me.avatar_url().or(avatar_url);
            }
        }

        for chunk in split_message(&message.contents, DISCORD_MESSAGE_LIMIT) {
            let mut builder = ExecuteWebhook::new()
                .content(chunk)
                .username(username.clone())
                .allowed_mentions(no_mass_mentions());
            if let Some(url) = &avatar_url {
                builder = builder.avatar_url(url.clone());
            }
            webhook.execute(&self.http, false, builder).await?;
        }
        Ok(())
    }

    async fn send_as_bot(&self, channel_id: ChannelId, message: &Message) -> PierResult<()> {
        match self.can_talk(channel_id) {
            None => {
                warn!("Bridge is not present in Discord channel {}", channel_id);
                return Err(PierError::ChannelNotFound {
                    channel: channel_id.to_string(),
                });
            }
            Some(false) => {
                warn!("Bridge cannot speak in Discord channel {}", channel_id);
                return Err(PierError::PermissionDenied {
                    channel: channel_id.to_string(),
                });
            }
            Some(true) => {}
        }

        for chunk in split_message(&bot_account_text(message), DISCORD_MESSAGE_LIMIT) {
            let builder = CreateMessage::new()
                .content(chunk)
                .allowed_mentions(no_mass_mentions());
            channel_id.send_message(&self.http, builder).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Pier for DiscordPier {
    fn platform(&self) -> PlatformType {
        PlatformType::Discord
    }

    async fn send_message(&self, target_channel: &str, message: &Message) -> PierResult<()> {
        let id = target_channel
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| PierError::ChannelNotFound {
                channel: target_channel.to_string(),
            })?;

        match self.webhooks.get(&id) {
            Some(webhook) => self.send_webhook(webhook, message).await,
            None => self.send_as_bot(ChannelId::new(id), message).await,
        }
    }

    fn is_self_originated(&self, source: &Source) -> bool {
        let SourceIdentity::Snowflake(identity) = &source.identity else {
            return false;
        };

        let webhook_id = source.channel.webhook_id.or_else(|| {
            source
                .channel
                .id
                .parse::<u64>()
                .ok()
                .and_then(|channel| self.webhook_ids.get(&channel).copied())
        });

        is_bridge_identity(*identity, self.bot_id(), webhook_id)
    }

    async fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handles) = self.handles() {
            info!("Initiating graceful Discord shutdown...");
            handles.shard_manager.shutdown_all().await;
            info!("Discord shutdown complete");
        }
    }
}

impl DiscordClientTask {
    /// Run the gateway connection until shutdown, rebuilding the client after fatal errors.
    pub async fn run(mut self) {
        let mut backoff = discord_backoff();

        loop {
            if self.should_stop() {
                break;
            }

            let mut client = match self.client.take() {
                Some(client) => client,
                None => match build_client(&self.token, self.events.clone()).await {
                    Ok(client) => {
                        self.pier.attach(&client);
                        backoff = discord_backoff();
                        client
                    }
                    Err(e) => {
                        error!("Failed to rebuild Discord client: {}", e);
                        let delay = backoff.next().unwrap_or(Duration::from_secs(5 * 60));
                        if !self.wait(delay).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            let shard_manager = Arc::clone(&client.shard_manager);
            let mut shutdown_rx = self.shutdown_rx.clone();

            tokio::select! {
                result = client.start() => match result {
                    Ok(()) => {
                        info!("Discord client disconnected normally");
                        break;
                    }
                    Err(e) => error!("Discord client error: {}", e),
                },

                _ = async {
                    while shutdown_rx.changed().await.is_ok() {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                } => {
                    self.pier.stopping.store(true, Ordering::SeqCst);
                    info!("Initiating graceful Discord shutdown...");
                    shard_manager.shutdown_all().await;
                    break;
                }
            }

            let delay = backoff.next().unwrap_or(Duration::from_secs(5 * 60));
            warn!(
                "Discord disconnected. Reconnecting in {:.1}s...",
                delay.as_secs_f64()
            );
            if !self.wait(delay).await {
                break;
            }
        }

        info!("Discord task ended");
    }

    fn should_stop(&self) -> bool {
        self.pier.stopping.load(Ordering::SeqCst) || *self.shutdown_rx.borrow()
    }

    /// Sleep for `delay`. Returns false if shutdown was requested meanwhile.
    async fn wait(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = sleep(delay) => !self.should_stop(),
            _ = self.shutdown_rx.changed() => !*self.shutdown_rx.borrow(),
        }
    }
}
