//! Error types for handoff-server

use thiserror::Error;

use crate::otc::StoreError;

/// Main error type for server startup
#[derive(Error, Debug)]
pub enum Error {
    /// Session store could not be opened
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using handoff-server Error
pub type Result<T> = std::result::Result<T, Error>;
