//! Error types for the Kestrel device controller

use thiserror::Error;

/// Result type alias for Kestrel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Kestrel controller
#[derive(Debug, Error)]
pub enum Error {
    /// No device model id was given and none was persisted
    #[error("missing device model id: pass --device-model-id on first run")]
    MissingModelId,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// OAuth credentials missing or unusable
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Device registration call failed
    #[error("registration error: {0}")]
    Registration(String),

    /// Assistant session error (bridge process, protocol)
    #[error("session error: {0}")]
    Session(String),

    /// Plugin could not be loaded or failed while handling an event
    #[error("plugin error: {0}")]
    Plugin(String),

    /// Plugin registration attempted after the dispatcher started
    #[error("plugin registry is frozen once the dispatcher is running")]
    RegistryFrozen,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
