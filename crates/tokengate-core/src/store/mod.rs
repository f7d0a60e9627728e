//! Durable key-value storage for credentials.
//!
//! The session mirrors its credential, renewal credential and principal into
//! a `DurableStore` so they survive process restarts. Backends:
//! - `MemoryStore`: process-local, for tests and ephemeral sessions
//! - `FileStore`: a single JSON file in the cache directory
//! - `KeyringStore`: one OS keychain entry per key
//!
//! Keys are read and written independently. There is no multi-key
//! transaction, so a failure between two writes leaves the store partially
//! updated until the next successful login, verify or refresh.

pub mod file;
pub mod keychain;
pub mod memory;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),
}

/// Narrow get/set/remove capability over string values.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
