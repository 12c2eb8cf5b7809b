//! Common utilities and types shared across the application.

pub mod error;
pub mod messages;
pub mod text;

pub use error::{ConfigError, PierError, PierResult};
pub use messages::{
    Channel, Destination, Message, MessageId, PlatformType, Sender, Source, SourceIdentity,
};
