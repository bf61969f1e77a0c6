use std::io;
use std::path::PathBuf;

/// Custom error type for push_deploy operations
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to read project file '{}': {source}", path.display())]
    RegistryRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse project file '{}': {source}", path.display())]
    RegistryParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Malformed webhook payload: {0}")]
    PayloadError(#[from] serde_json::Error),

    #[error("Script '{script}' failed to start: {source}")]
    SpawnFailed { script: String, source: io::Error },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Helper type for Results that use DeployError
pub type Result<T> = std::result::Result<T, DeployError>;
