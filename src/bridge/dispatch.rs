//! Per-pier outbound queues.
//!
//! Each pier gets one worker task that sends queued messages in order, so a
//! slow or rate-limited network never holds up inbound handling or the
//! other network.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bridge::timing::MessageTimings;
use crate::common::Message;
use crate::pier::Pier;

/// A message ready to be posted into a concrete channel.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub channel: String,
    pub message: Message,
}

/// Handle to a pier's outbound worker.
#[derive(Clone)]
pub struct PierQueue {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl PierQueue {
    /// Spawn the worker for `pier`. Must be called inside a tokio runtime.
    pub fn spawn(pier: Arc<dyn Pier>, timings: Arc<MessageTimings>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(pier, timings, rx));
        Self { tx }
    }

    /// Queue a send. Returns false when the worker is gone.
    pub fn push(&self, outbound: Outbound) -> bool {
        self.tx.send(outbound).is_ok()
    }
}

async fn run_queue(
    pier: Arc<dyn Pier>,
    timings: Arc<MessageTimings>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    let platform = pier.platform();

    while let Some(outbound) = rx.recv().await {
        match pier.send_message(&outbound.channel, &outbound.message).await {
            Ok(()) => timings.add_to_timing(&outbound.message, Instant::now()),
            Err(e) => {
                warn!(
                    %platform,
                    channel = %outbound.channel,
                    "Failed to send message, dropping it: {}",
                    e
                );
                timings.send_failed(outbound.message.id);
            }
        }
    }

    debug!(%platform, "Outbound queue closed");
}
