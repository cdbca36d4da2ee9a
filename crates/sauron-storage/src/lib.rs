//! Session storage for the Sauron client.
//!
//! Two storage scopes back a session:
//! - **session scope**: lives only as long as the process ([`MemoryStorage`])
//! - **durable scope**: survives restarts ([`FileStorage`], a JSON map on disk)
//!
//! [`TokenStore`] sits on top of both and never surfaces storage errors.

mod file;
mod keys;
mod memory;
mod token_store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use token_store::{TokenStore, UserProfile};
pub use traits::SessionStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend could not complete the operation
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
