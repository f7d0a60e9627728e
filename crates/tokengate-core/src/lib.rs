//! tokengate-core: client-side session management.
//!
//! A `Session` owns an access credential and an optional renewal credential,
//! mirrors them into a `DurableStore` so they survive restarts, checks them
//! against a remote `AuthEndpoint`, and publishes one snapshot that an
//! `AccessGuard` uses to decide whether protected views may render.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use tokengate_core::{AccessGuard, FileStore, HttpClient, RemoteAuthEndpoint, Session, SessionConfig};
//!
//! let config = SessionConfig::default();
//! let endpoint = RemoteAuthEndpoint::new(HttpClient::new("https://api.example.com")?);
//! let session = Session::new(config, Arc::new(FileStore::in_cache_dir()?), Arc::new(endpoint))?;
//! session.initialize().await;
//!
//! let guard = AccessGuard::new(session.clone());
//! let decision = guard.mount().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod guard;
pub mod principal;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiError, AuthEndpoint, CredentialSet, HttpClient, RemoteAuthEndpoint};
pub use config::{ConfigError, PartialSessionConfig, SessionConfig};
pub use guard::{decide, AccessGuard, GuardDecision};
pub use principal::Principal;
pub use session::{Session, SessionError, SessionPhase, SessionScope, SessionState};
pub use store::{DurableStore, FileStore, KeyringStore, MemoryStore, StoreError};
