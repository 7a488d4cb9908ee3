//! Error handling for the blechat CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Debug, Error)]
pub enum CliError {
    #[error("chat engine error: {0}")]
    Chat(#[from] blechat_core::ChatError),

    #[error("storage error: {0}")]
    Storage(#[from] blechat_core::StorageError),

    #[error("no home directory available; pass --data-dir")]
    NoDataDir,

    #[error("link event stream unavailable")]
    LinkStream,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
