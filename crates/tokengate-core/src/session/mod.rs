//! Session state machine.
//!
//! This module provides:
//! - `Session`: cloneable handle owning the credential lifecycle and the
//!   verify/refresh protocol
//! - `SessionState`: the snapshot published to subscribers
//! - `SessionScope`: accessor that refuses to hand out a session before it
//!   has been initialized

pub mod machine;
pub mod scope;
pub mod state;

pub use machine::Session;
pub use scope::SessionScope;
pub use state::{SessionPhase, SessionState};

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session accessed outside an initialized session scope")]
    OutsideScope,

    #[error("Invalid session configuration: {0}")]
    Config(#[from] ConfigError),
}
