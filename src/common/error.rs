//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file '{path}' does not exist")]
    NotFound { path: String },

    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors raised by a pier while talking to its network.
#[derive(Debug, Error)]
pub enum PierError {
    #[error("{platform} pier is not connected")]
    NotConnected { platform: &'static str },

    #[error("Channel not found: {channel}")]
    ChannelNotFound { channel: String },

    #[error("Permission denied in {channel}")]
    PermissionDenied { channel: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity::Error),
}

/// Result type alias for pier operations.
pub type PierResult<T> = std::result::Result<T, PierError>;
