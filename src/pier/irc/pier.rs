//! IRC pier: registration, channel membership and message relay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use serenity::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info, warn};

use crate::bridge::{InboundSender, PierChannels};
use crate::common::text::split_message;
use crate::common::{
    Channel, Message, PierError, PierResult, PlatformType, Sender, Source, SourceIdentity,
};
use crate::config::IrcConfig;
use crate::mutator::formatting::IrcFormattingCode;
use crate::pier::irc::codec::{new_irc_connection, IrcConnection, MAX_LINE_LENGTH};
use crate::pier::irc::message::{classify_text, ChatText, IrcMessage};
use crate::pier::Pier;

/// Room left on each line for the `:nick!user@host ` the server prepends when relaying.
const HOSTMASK_RESERVE: usize = 100;

/// Create an exponential backoff iterator for IRC reconnection.
/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn irc_backoff() -> impl Iterator<Item = Duration> {
    use backon::BackoffBuilder;

    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(5 * 60))
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

/// TLS connector trusting the system root certificates.
fn tls_connector() -> Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!("Failed to load a system certificate: {}", e);
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(added, ignored, "Loaded system root certificates");

    let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// The IRC side of the bridge.
///
/// Sends are queued as raw lines for the connection task; the pier itself
/// holds no socket.
pub struct IrcPier {
    config: IrcConfig,
    channels: Vec<String>,
    nickname: Mutex<String>,
    connected: AtomicBool,
    stopping: AtomicBool,
    line_tx: mpsc::UnboundedSender<String>,
}

/// Owns the network side of an [`IrcPier`]: connects, reconnects and feeds inbound messages.
pub struct IrcConnectionTask {
    pier: Arc<IrcPier>,
    line_rx: mpsc::UnboundedReceiver<String>,
    inbound_tx: InboundSender,
    shutdown_rx: watch::Receiver<bool>,
}

impl IrcPier {
    /// Create the pier for `channels` and the task that will run its connection.
    pub fn new(
        config: IrcConfig,
        channels: Vec<String>,
        pier_channels: PierChannels,
    ) -> (Arc<Self>, IrcConnectionTask) {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let pier = Arc::new(Self {
            nickname: Mutex::new(config.nickname.clone()),
            config,
            channels,
            connected: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            line_tx,
        });

        let task = IrcConnectionTask {
            pier: Arc::clone(&pier),
            line_rx,
            inbound_tx: pier_channels.inbound_tx,
            shutdown_rx: pier_channels.shutdown_rx,
        };

        (pier, task)
    }

    /// Nick the bridge is currently using.
    pub fn nickname(&self) -> String {
        self.nick_lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn nick_lock(&self) -> MutexGuard<'_, String> {
        self.nickname
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_nickname(&self, nick: &str) {
        *self.nick_lock() = nick.to_string();
    }

    /// Registration burst sent right after connecting.
    fn registration_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(password) = &self.config.password {
            lines.push(format!("PASS {}", password));
        }
        lines.push("CAP REQ :account-tag".to_string());
        lines.push("CAP END".to_string());
        lines.push(format!("NICK {}", self.nickname()));
        lines.push(format!(
            "USER {} 0 * :{}",
            self.config.username(),
            self.config.realname()
        ));
        lines
    }

    /// Turn a channel PRIVMSG into a bridge message.
    fn inbound_message(&self, msg: &IrcMessage) -> Option<Message> {
        let nick = msg.nick()?;
        let target = msg.param(0)?;
        let text = msg.param(1)?;

        if !target.starts_with(['#', '&']) {
            debug!(from = nick, "Ignoring private message");
            return None;
        }

        let contents = match classify_text(text) {
            ChatText::Plain(text) => text.to_string(),
            ChatText::Action(action) => {
                let italics = IrcFormattingCode::Italics.as_char();
                format!("{italics}{action}{italics}")
            }
            ChatText::OtherCtcp => return None,
        };

        let sender = Sender::irc(nick, msg.tag("account").map(str::to_string));
        let source = Source {
            channel: Channel::irc(target),
            identity: SourceIdentity::Nick(nick.to_string()),
        };

        Some(Message::new(contents, sender, source))
    }
}

/// Build the PRIVMSG lines for `message` in `target`.
///
/// Each line of the message becomes at least one PRIVMSG; long lines are split
/// at word boundaries. A lone CR counts as a line break so it never reaches the
/// wire inside a PRIVMSG. Relayed user messages carry a `<name> ` prefix.
pub fn privmsg_lines(target: &str, message: &Message) -> Vec<String> {
    let prefix = if message.sender.is_bridge() {
        String::new()
    } else {
        format!("<{}> ", message.sender.display_name)
    };

    let overhead = "PRIVMSG  :\r\n".len() + target.len() + prefix.len() + HOSTMASK_RESERVE;
    let budget = MAX_LINE_LENGTH.saturating_sub(overhead).max(1);

    message
        .contents
        .split(['\r', '\n'])
        .filter(|line| !line.trim().is_empty())
        .flat_map(|line| split_message(line, budget))
        .map(|chunk| format!("PRIVMSG {} :{}{}", target, prefix, chunk))
        .collect()
}

#[async_trait]
impl Pier for IrcPier {
    fn platform(&self) -> PlatformType {
        PlatformType::Irc
    }

    async fn send_message(&self, target_channel: &str, message: &Message) -> PierResult<()> {
        if !self.is_connected() {
            return Err(PierError::NotConnected { platform: "IRC" });
        }

        for line in privmsg_lines(target_channel, message) {
            self.line_tx
                .send(line)
                .map_err(|_| PierError::NotConnected { platform: "IRC" })?;
        }
        Ok(())
    }

    fn is_self_originated(&self, source: &Source) -> bool {
        match &source.identity {
            SourceIdentity::Nick(nick) => nick.eq_ignore_ascii_case(&self.nick_lock()),
            SourceIdentity::Snowflake(_) => false,
        }
    }

    async fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.is_connected() {
            let _ = self.line_tx.send("QUIT :Bridge shutting down".to_string());
        }
    }
}

impl IrcConnectionTask {
    /// Connect and keep reconnecting until shutdown.
    pub async fn run(mut self) {
        let mut backoff = irc_backoff();
        let connector = if self.pier.config.tls {
            match tls_connector() {
                Ok(connector) => Some(connector),
                Err(e) => {
                    error!("Failed to set up TLS for IRC: {}", e);
                    return;
                }
            }
        } else {
            None
        };

        loop {
            if self.should_stop() {
                break;
            }

            let address = (self.pier.config.server.clone(), self.pier.config.port);
            info!(
                tls = self.pier.config.tls,
                "Connecting to IRC server {}:{}...", address.0, address.1
            );

            match TcpStream::connect((address.0.as_str(), address.1)).await {
                Ok(stream) => {
                    backoff = irc_backoff();
                    match self.serve(stream, connector.as_ref()).await {
                        Ok(()) => info!("IRC connection closed"),
                        Err(e) => error!("IRC connection error: {}", e),
                    }
                }
                Err(e) => error!("Failed to connect to IRC server: {}", e),
            }

            self.pier.connected.store(false, Ordering::SeqCst);

            if self.should_stop() {
                break;
            }

            let delay = backoff.next().unwrap_or(Duration::from_secs(5 * 60));
            info!("Reconnecting to IRC in {:.1} seconds...", delay.as_secs_f64());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received during backoff");
                        break;
                    }
                }
            }
        }

        info!("IRC pier stopped");
    }

    fn should_stop(&self) -> bool {
        self.pier.stopping.load(Ordering::SeqCst) || *self.shutdown_rx.borrow()
    }

    /// Run a session over `stream`, after a TLS handshake when a connector is given.
    async fn serve(&mut self, stream: TcpStream, connector: Option<&TlsConnector>) -> Result<()> {
        let Some(connector) = connector else {
            return self.handle_connection(stream).await;
        };

        let server_name = ServerName::try_from(self.pier.config.server.clone())?;
        let stream = connector.connect(server_name, stream).await?;
        debug!("TLS handshake with {} complete", self.pier.config.server);
        self.handle_connection(stream).await
    }

    /// Register and relay over one established stream until it closes.
    pub async fn handle_connection<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut connection = new_irc_connection(stream);
        self.pier.connected.store(false, Ordering::SeqCst);
        self.pier.set_nickname(&self.pier.config.nickname);

        // Lines queued for a previous session would be rejected before registration
        let mut stale = 0;
        while self.line_rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            warn!("Dropped {} IRC lines queued before the connection was lost", stale);
        }

        for line in self.pier.registration_lines() {
            connection.send(line).await?;
        }

        loop {
            tokio::select! {
                line = connection.next() => {
                    match line {
                        Some(Ok(line)) => self.handle_line(&mut connection, &line).await?,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    }
                }

                Some(line) = self.line_rx.recv(), if self.pier.is_connected() => {
                    let quitting = line.starts_with("QUIT");
                    connection.send(line).await?;
                    if quitting {
                        return Ok(());
                    }
                }

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        self.pier.stopping.store(true, Ordering::SeqCst);
                        connection.send("QUIT :Bridge shutting down".to_string()).await?;
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_line<S>(&self, connection: &mut IrcConnection<S>, line: &str) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(msg) = IrcMessage::parse(line) else {
            debug!("Ignoring malformed IRC line: {}", line);
            return Ok(());
        };

        match msg.command.as_str() {
            "PING" => {
                let token = msg.param(0).unwrap_or_default();
                connection.send(format!("PONG :{}", token)).await?;
            }
            "001" => {
                if let Some(nick) = msg.param(0) {
                    self.pier.set_nickname(nick);
                }
                self.pier.connected.store(true, Ordering::SeqCst);
                info!("Registered on IRC as {}", self.pier.nickname());

                for channel in &self.pier.channels {
                    connection.send(format!("JOIN {}", channel)).await?;
                }
            }
            "433" => {
                let taken = msg.param(1).map(str::to_string).unwrap_or_else(|| self.pier.nickname());
                let next = format!("{}_", taken);
                warn!("Nickname {} is in use, trying {}", taken, next);
                self.pier.set_nickname(&next);
                connection.send(format!("NICK {}", next)).await?;
            }
            "NICK" => {
                if msg.nick().is_some_and(|n| n.eq_ignore_ascii_case(&self.pier.nickname())) {
                    if let Some(new_nick) = msg.param(0) {
                        self.pier.set_nickname(new_nick);
                    }
                }
            }
            "JOIN" => {
                if msg.nick().is_some_and(|n| n.eq_ignore_ascii_case(&self.pier.nickname())) {
                    info!("Joined {}", msg.param(0).unwrap_or_default());
                }
            }
            "PRIVMSG" => {
                if let Some(message) = self.pier.inbound_message(&msg) {
                    if self.inbound_tx.send(message).is_err() {
                        warn!("Bridge is gone, dropping IRC message");
                    }
                }
            }
            "ERROR" => {
                return Err(anyhow!(
                    "Server closed the link: {}",
                    msg.param(0).unwrap_or_default()
                ));
            }
            _ => {}
        }

        Ok(())
    }
}
