//! Remote auth endpoint client.
//!
//! This module provides:
//! - `HttpClient`: thin JSON-over-HTTP helper that attaches bearer
//!   credentials and maps error shapes into `ApiError`
//! - `AuthEndpoint`: the verify/refresh capability the session depends on
//! - `RemoteAuthEndpoint`: `AuthEndpoint` over `HttpClient`
//!
//! verify and refresh are the only network calls the session ever issues.

pub mod client;
pub mod endpoint;
pub mod error;

pub use client::HttpClient;
pub use endpoint::{AuthEndpoint, CredentialSet, RemoteAuthEndpoint};
pub use error::ApiError;
