//! Message flow between the IRC and Discord piers.
//!
//! ## Module Structure
//!
//! - `channels`: Communication channel structures
//! - `dispatch`: Per-pier outbound queues
//! - `mapping`: Discord <-> IRC channel pairs
//! - `orchestrator`: Main bridge orchestrator (`Bridge` struct)
//! - `timing`: Relay latency samples

pub mod channels;
pub mod dispatch;
pub mod mapping;
pub mod orchestrator;
pub mod timing;

pub use channels::{BridgeSideChannels, ChannelBundle, InboundSender, PierChannels};
pub use mapping::ChannelMap;
pub use orchestrator::Bridge;
pub use timing::MessageTimings;
