//! Bridge channel management.
//!
//! Groups the channels connecting the piers, the orchestrator and the
//! shutdown signal.

use tokio::sync::{mpsc, watch};

use crate::common::Message;

/// Sender side handed to piers for inbound messages.
pub type InboundSender = mpsc::UnboundedSender<Message>;

/// Channels used by the bridge task.
pub struct BridgeSideChannels {
    /// Receiver for messages coming from either pier.
    pub inbound_rx: mpsc::UnboundedReceiver<Message>,
    /// Receiver for the shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels used by the piers.
#[derive(Clone)]
pub struct PierChannels {
    /// Sender for inbound messages (both piers share it).
    pub inbound_tx: InboundSender,
    /// Receiver for the shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels created for the bridge.
pub struct ChannelBundle {
    pub bridge: BridgeSideChannels,
    pub piers: PierChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            bridge: BridgeSideChannels {
                inbound_rx,
                shutdown_rx: shutdown_rx.clone(),
            },
            piers: PierChannels {
                inbound_tx,
                shutdown_rx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
