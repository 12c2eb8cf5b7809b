//! Discord pier.
//!
//! ## Module Structure
//!
//! - `handler`: gateway events to bridge messages
//! - `pier`: client lifecycle, webhooks and the `Pier` implementation
//! - `resolver`: mention and custom emoji resolution

pub mod handler;
pub mod pier;
pub mod resolver;

pub use pier::{DiscordClientTask, DiscordPier};
