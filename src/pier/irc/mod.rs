//! IRC pier.
//!
//! ## Module Structure
//!
//! - `codec`: CRLF line framing
//! - `message`: IRCv3 line parsing and CTCP classification
//! - `pier`: registration, reconnects and the `Pier` implementation

pub mod codec;
pub mod message;
pub mod pier;

pub use pier::{IrcConnectionTask, IrcPier};
