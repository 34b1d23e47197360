//! Configuration error type. Shape mirrors the teacher's
//! `beads-config::config::ConfigError` (spec §10.3).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] figment::Error),

    #[error("no .filigree directory found (run 'filigree init' first)")]
    FiligreeDirNotFound,

    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
