//! Error types for the Ember companion

use thiserror::Error;

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the companion core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Wake detection error
    #[error("wake error: {0}")]
    Wake(String),

    /// Transient stream error (network reset, mid-stream disconnect)
    #[error("stream error: {0}")]
    Stream(String),

    /// Backend-side timeout waiting for an event
    #[error("backend timeout: {0}")]
    BackendTimeout(String),

    /// Authentication/authorization failure (never retried)
    #[error("auth error: {0}")]
    Auth(String),

    /// Backend protocol violation (never retried)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Capability/hardware error
    #[error("capability error: {0}")]
    Capability(String),

    /// Cost ledger error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
