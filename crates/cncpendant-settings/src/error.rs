//! Settings errors
//!
//! File errors carry the path they happened on so the binary can report
//! them without extra context.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong reading, writing or validating settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot create config directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A value parsed but is unusable
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: &'static str, reason: &'static str },

    /// The platform has no per-user configuration directory
    #[error("No configuration directory on this platform")]
    NoConfigDir,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Format(#[from] ConfigError),
}

impl SettingsError {
    pub(crate) fn invalid(key: &'static str, reason: &'static str) -> Self {
        SettingsError::InvalidSetting { key, reason }
    }
}

/// Config file format problems
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Extension other than `.toml` or `.json`
    #[error("Unsupported config format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),
}

/// Result type alias for settings operations
pub type SettingsResult<T> = Result<T, SettingsError>;
