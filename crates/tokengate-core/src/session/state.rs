use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    /// Restore has not run yet.
    Uninitialized,
    /// Restore is in flight.
    Restoring,
    Unauthenticated,
    Authenticated,
}

/// Snapshot of a session.
///
/// `authenticated` implies `credential.is_some()`. `loading` is true before
/// and during restore, and while a verify chain started by restore is in
/// flight; login and logout always leave it false.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: SessionPhase,
    pub authenticated: bool,
    pub loading: bool,
    #[serde(skip_serializing)]
    pub credential: Option<String>,
    #[serde(skip_serializing)]
    pub renewal_credential: Option<String>,
    pub principal: Option<Principal>,
    /// Last time the remote endpoint accepted the credential.
    pub verified_at: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            authenticated: false,
            loading: true,
            credential: None,
            renewal_credential: None,
            principal: None,
            verified_at: None,
        }
    }
}

impl SessionState {
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn has_renewal_credential(&self) -> bool {
        self.renewal_credential.is_some()
    }

    /// Settled means no restore or restore-triggered verify is in flight.
    pub fn is_settled(&self) -> bool {
        !self.loading
    }

    pub(crate) fn set_authenticated(&mut self, credential: String) {
        self.credential = Some(credential);
        self.authenticated = true;
        self.phase = SessionPhase::Authenticated;
        self.loading = false;
    }

    pub(crate) fn clear(&mut self) {
        self.credential = None;
        self.renewal_credential = None;
        self.principal = None;
        self.verified_at = None;
        self.authenticated = false;
        self.phase = SessionPhase::Unauthenticated;
        self.loading = false;
    }
}
