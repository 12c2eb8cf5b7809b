//! Configuration loading (HOCON format).

use std::io::ErrorKind;
use std::path::Path;

use hocon::HoconLoader;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Read and parse a HOCON config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ConfigError::NotFound {
            path: path.display().to_string(),
        },
        _ => ConfigError::IoError {
            path: path.display().to_string(),
            source,
        },
    })?;

    parse_config(&content)
}

/// Parse HOCON text into a [`Config`].
///
/// Syntax errors and missing or mistyped fields both surface as
/// [`ConfigError::ParseError`].
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let parse_error = |e: hocon::Error| ConfigError::ParseError {
        message: e.to_string(),
    };

    HoconLoader::new()
        .load_str(content)
        .map_err(parse_error)?
        .resolve()
        .map_err(parse_error)
}
