//! Network adapters ("piers") connecting the bridge to one chat network each.
//!
//! ## Module Structure
//!
//! - `irc`: IRC client over a plain TCP line protocol
//! - `discord`: serenity-based Discord client with webhook support

pub mod discord;
pub mod irc;

use serenity::async_trait;

use crate::common::{Message, PierResult, PlatformType, Source};

/// What the bridge needs from a network adapter.
///
/// Connecting and running the network connection are specific to each pier;
/// the bridge only sends through it and asks it to recognise its own echoes.
#[async_trait]
pub trait Pier: Send + Sync {
    /// Network this pier talks to.
    fn platform(&self) -> PlatformType;

    /// Post `message` into `target_channel` on this network.
    async fn send_message(&self, target_channel: &str, message: &Message) -> PierResult<()>;

    /// Whether an inbound event was produced by the bridge itself.
    fn is_self_originated(&self, source: &Source) -> bool;

    /// Close the network connection.
    async fn shutdown(&self);
}
