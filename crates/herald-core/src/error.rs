use thiserror::Error;

/// Top-level error type for Herald.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Input rejected locally, before any downstream call was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// Account inactive or out of quota.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Error from the completion provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from the remote execution service.
    #[error("executor error: {0}")]
    Executor(String),

    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Credential encryption or key-material error.
    #[error("credential error: {0}")]
    Credential(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
