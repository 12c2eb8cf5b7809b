//! Bridge orchestrator that ties IRC and Discord together.
//!
//! Every inbound message goes through the same steps: drop the bridge's own
//! echoes, run commands, resolve destinations, translate for the other
//! network and queue the sends.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::bridge::channels::BridgeSideChannels;
use crate::bridge::dispatch::{Outbound, PierQueue};
use crate::bridge::mapping::ChannelMap;
use crate::bridge::timing::MessageTimings;
use crate::command::{CommandManager, SystemInfo};
use crate::common::{Message, PlatformType, Sender};
use crate::config::{Config, DEFAULT_COMMAND_PREFIX};
use crate::mutator::MutatorPipeline;
use crate::pier::Pier;

/// The main bridge that orchestrates message flow.
pub struct Bridge {
    irc: Arc<dyn Pier>,
    discord: Arc<dyn Pier>,
    irc_queue: PierQueue,
    discord_queue: PierQueue,
    channels: ChannelMap,
    mutators: MutatorPipeline,
    commands: CommandManager,
    timings: Arc<MessageTimings>,
    /// Identity used for the bridge's own messages.
    bot: Sender,
}

impl Bridge {
    /// Create a new bridge from configuration. Spawns one outbound queue per pier.
    pub fn new(config: &Config, irc: Arc<dyn Pier>, discord: Arc<dyn Pier>) -> Self {
        let timings = Arc::new(MessageTimings::new(config.bridge.timing_samples));

        let prefix = config
            .commands
            .prefix
            .chars()
            .next()
            .or_else(|| DEFAULT_COMMAND_PREFIX.chars().next())
            .unwrap_or('!');
        let mut commands = CommandManager::new(prefix);
        commands.register(
            "system",
            SystemInfo::new(Arc::clone(&timings), config.commands.system.clone()),
        );

        Self {
            irc_queue: PierQueue::spawn(Arc::clone(&irc), Arc::clone(&timings)),
            discord_queue: PierQueue::spawn(Arc::clone(&discord), Arc::clone(&timings)),
            irc,
            discord,
            channels: ChannelMap::from_config(&config.channels),
            mutators: MutatorPipeline::standard(),
            commands,
            timings,
            bot: Sender::bridge(config.bridge.name.clone()),
        }
    }

    /// The bridge's own identity.
    pub fn bot_sender(&self) -> &Sender {
        &self.bot
    }

    /// Current relay latency samples, in nanoseconds.
    pub fn message_times(&self) -> Vec<u64> {
        self.timings.message_times()
    }

    fn pier(&self, platform: PlatformType) -> &Arc<dyn Pier> {
        match platform {
            PlatformType::Irc => &self.irc,
            PlatformType::Discord => &self.discord,
        }
    }

    fn queue(&self, platform: PlatformType) -> &PierQueue {
        match platform {
            PlatformType::Irc => &self.irc_queue,
            PlatformType::Discord => &self.discord_queue,
        }
    }

    /// Accept a message from either pier.
    ///
    /// The invoking message of a command is relayed like any other message;
    /// the command's reply follows it as a separate message from the bridge.
    pub fn submit(&self, message: Message) {
        let submitted_at = Instant::now();

        if self
            .pier(message.platform())
            .is_self_originated(&message.source)
        {
            debug!(id = message.id, "Ignoring message sent by the bridge itself");
            return;
        }

        let reply = self.commands.process_command(&message, &self.bot);

        self.dispatch(message, submitted_at);

        if let Some(reply) = reply {
            self.dispatch(reply, submitted_at);
        }
    }

    /// Resolve targets, translate and queue the sends for one message.
    fn dispatch(&self, message: Message, submitted_at: Instant) {
        let source_platform = message.platform();
        let mut sends = Vec::new();

        for target in message.destination.targets() {
            // A user's message is already visible on its own network
            if target == source_platform && !message.originates_from_bridge() {
                continue;
            }

            let Some(channel) = self.channels.resolve(&message.source.channel, target) else {
                debug!(
                    id = message.id,
                    source = %message.source.channel.name,
                    %target,
                    "No channel mapping, not relaying"
                );
                continue;
            };

            let outgoing = if target == source_platform {
                message.clone()
            } else {
                match self.mutators.apply(&message) {
                    Some(outgoing) => outgoing,
                    None => continue,
                }
            };

            info!(
                "{} -> {} [{}]: <{}> {}",
                source_platform,
                target,
                channel,
                outgoing.sender.display_name,
                outgoing.contents
            );

            sends.push((target, Outbound { channel, message: outgoing }));
        }

        self.timings.begin(&message, submitted_at, sends.len());

        for (target, outbound) in sends {
            let id = outbound.message.id;
            if !self.queue(target).push(outbound) {
                warn!(%target, "Outbound queue is closed, dropping message");
                self.timings.send_failed(id);
            }
        }
    }

    /// Process inbound messages until the channel closes or shutdown is signalled.
    pub async fn run(&self, channels: BridgeSideChannels) {
        let BridgeSideChannels {
            mut inbound_rx,
            mut shutdown_rx,
        } = channels;

        loop {
            tokio::select! {
                message = inbound_rx.recv() => {
                    match message {
                        Some(message) => self.submit(message),
                        None => {
                            debug!("Inbound channel closed");
                            break;
                        }
                    }
                }

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping bridge");
                        break;
                    }
                }
            }
        }

        self.irc.shutdown().await;
        self.discord.shutdown().await;
        info!("Bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::common::{Channel, Destination, Source, SourceIdentity};
    use crate::config::*;
    use crate::pier::testing::RecordingPier;

    type Sent = mpsc::UnboundedReceiver<(String, Message)>;

    const DISCORD_CHANNEL: u64 = 555;
    const WEBHOOK_ID: u64 = 777;

    fn make_test_config() -> Config {
        Config {
            irc: IrcConfig {
                server: "irc.example.org".to_string(),
                port: 6667,
                tls: false,
                nickname: "harbor".to_string(),
                username: None,
                realname: None,
                password: None,
            },
            discord: DiscordConfig {
                token: "token".to_string(),
                webhooks: Vec::new(),
            },
            channels: vec![ChannelMapping {
                discord: DISCORD_CHANNEL.to_string(),
                irc: "#rust".to_string(),
            }],
            commands: CommandsConfig {
                prefix: "!".to_string(),
                system: SystemCommandConfig {
                    irc_accounts: vec!["admin".to_string()],
                    discord_ids: vec![42],
                },
            },
            bridge: BridgeConfig::default(),
        }
    }

    fn make_bridge(irc: RecordingPier, discord: RecordingPier) -> Bridge {
        Bridge::new(&make_test_config(), Arc::new(irc), Arc::new(discord))
    }

    fn piers() -> (RecordingPier, Sent, RecordingPier, Sent) {
        let (irc, irc_sent) = RecordingPier::new(PlatformType::Irc);
        let (discord, discord_sent) = RecordingPier::new(PlatformType::Discord);
        (irc, irc_sent, discord.with_self_identity(WEBHOOK_ID), discord_sent)
    }

    fn irc_message(contents: &str, nick: &str, account: Option<&str>) -> Message {
        Message::new(
            contents,
            Sender::irc(nick, account.map(str::to_string)),
            Source {
                channel: Channel::irc("#rust"),
                identity: SourceIdentity::Nick(nick.to_string()),
            },
        )
    }

    fn discord_message(contents: &str, author: u64) -> Message {
        Message::new(
            contents,
            Sender::discord("carol", author),
            Source {
                channel: Channel::discord(DISCORD_CHANNEL, "rust", Some(WEBHOOK_ID)),
                identity: SourceIdentity::Snowflake(author),
            },
        )
    }

    async fn next(rx: &mut Sent) -> (String, Message) {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for a send")
            .expect("pier dropped")
    }

    async fn assert_nothing_sent(rx: &mut Sent) {
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_irc_message_is_translated_for_discord() {
        let (irc, mut irc_sent, discord, mut discord_sent) = piers();
        let bridge = make_bridge(irc, discord);

        bridge.submit(irc_message("\x02hello", "bob", None));

        let (channel, message) = next(&mut discord_sent).await;
        assert_eq!(channel, DISCORD_CHANNEL.to_string());
        assert_eq!(message.contents, "**hello**");
        assert_eq!(message.sender.display_name, "bob");
        assert_nothing_sent(&mut irc_sent).await;
    }

    #[tokio::test]
    async fn test_discord_message_is_translated_for_irc() {
        let (irc, mut irc_sent, discord, mut discord_sent) = piers();
        let bridge = make_bridge(irc, discord);

        bridge.submit(discord_message("**x**", 1));

        let (channel, message) = next(&mut irc_sent).await;
        assert_eq!(channel, "#rust");
        assert_eq!(message.contents, "\x02x\x02");
        assert_nothing_sent(&mut discord_sent).await;
    }

    #[tokio::test]
    async fn test_webhook_echo_is_discarded() {
        let (irc, mut irc_sent, discord, _discord_sent) = piers();
        let bridge = make_bridge(irc, discord);

        bridge.submit(discord_message("<bob> relayed", WEBHOOK_ID));

        assert_nothing_sent(&mut irc_sent).await;
        assert!(bridge.message_times().is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_channel_is_not_relayed() {
        let (irc, _irc_sent, discord, mut discord_sent) = piers();
        let bridge = make_bridge(irc, discord);

        let mut message = irc_message("hi", "bob", None);
        message.source.channel = Channel::irc("#elsewhere");
        bridge.submit(message);

        assert_nothing_sent(&mut discord_sent).await;
    }

    #[tokio::test]
    async fn test_authorized_command_replies_on_both_sides() {
        let (irc, mut irc_sent, discord, mut discord_sent) = piers();
        let bridge = make_bridge(irc, discord);

        bridge.submit(irc_message("!system", "bob", Some("admin")));

        // The invocation itself is relayed first
        let (_, relayed) = next(&mut discord_sent).await;
        assert_eq!(relayed.contents, "!system");
        assert!(!relayed.originates_from_bridge());

        let (_, reply) = next(&mut discord_sent).await;
        assert!(reply.originates_from_bridge());
        assert_eq!(reply.destination, Destination::Both);
        assert!(reply.contents.contains("Uptime:"));

        let (channel, irc_reply) = next(&mut irc_sent).await;
        assert_eq!(channel, "#rust");
        assert_eq!(irc_reply.sender, *bridge.bot_sender());
        assert!(irc_reply.contents.starts_with("Uptime:"));
    }

    #[tokio::test]
    async fn test_unauthorized_command_gets_no_reply() {
        let (irc, mut irc_sent, discord, mut discord_sent) = piers();
        let bridge = make_bridge(irc, discord);

        bridge.submit(irc_message("!system", "mallory", None));

        let (_, relayed) = next(&mut discord_sent).await;
        assert_eq!(relayed.contents, "!system");
        assert_nothing_sent(&mut discord_sent).await;
        assert_nothing_sent(&mut irc_sent).await;
    }

    #[tokio::test]
    async fn test_send_records_latency_sample() {
        let (irc, _irc_sent, discord, mut discord_sent) = piers();
        let bridge = make_bridge(irc, discord);

        bridge.submit(irc_message("hi", "bob", None));
        next(&mut discord_sent).await;

        let mut samples = Vec::new();
        for _ in 0..50 {
            samples = bridge.message_times();
            if !samples.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(samples.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_other_network() {
        let (irc, mut irc_sent) = RecordingPier::new(PlatformType::Irc);
        let (discord, _discord_sent) = RecordingPier::new(PlatformType::Discord);
        let bridge = make_bridge(irc, discord.failing());

        bridge.submit(discord_message("!system", 42));

        let (_, relayed) = next(&mut irc_sent).await;
        assert_eq!(relayed.contents, "!system");
        let (_, reply) = next(&mut irc_sent).await;
        assert!(reply.originates_from_bridge());
    }

    #[tokio::test]
    async fn test_shutdown_closes_both_piers() {
        let (irc, _irc_sent) = RecordingPier::new(PlatformType::Irc);
        let (discord, _discord_sent) = RecordingPier::new(PlatformType::Discord);
        let irc = Arc::new(irc);
        let discord = Arc::new(discord);
        let bridge = Bridge::new(&make_test_config(), irc.clone(), discord.clone());

        let channels = crate::bridge::ChannelBundle::new();
        channels.control.shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), bridge.run(channels.bridge))
            .await
            .expect("bridge did not stop");

        assert!(*irc.shut_down.lock().unwrap());
        assert!(*discord.shut_down.lock().unwrap());
    }
}
