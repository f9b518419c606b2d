use thiserror::Error;

/// Core error types for devlog
#[derive(Debug, Error)]
pub enum DevlogError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Logger already initialized; call shutdown() first")]
    AlreadyInitialized,

    #[error("Logger not initialized")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors specific to output sinks
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("File write error: {0}")]
    File(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for devlog operations
pub type Result<T> = std::result::Result<T, DevlogError>;
