//! Access guard for protected views.
//!
//! A guard blocks rendering until the session has settled, then either lets
//! the protected view render or redirects to the public entry point. When it
//! mounts with a credential in hand it re-verifies that credential itself,
//! tracking its own `checking` flag next to the session's `loading` flag.
//! The guard never touches credentials directly; everything goes through
//! the session.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::session::{Session, SessionState};

/// Default public entry point for redirects.
pub const DEFAULT_REDIRECT: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum GuardDecision {
    /// Show the pending indicator; render nothing protected.
    Pending,
    Render,
    /// Navigate to `to`, replacing the current history entry when `replace`.
    Redirect { to: String, replace: bool },
}

impl GuardDecision {
    pub fn is_pending(&self) -> bool {
        matches!(self, GuardDecision::Pending)
    }
}

/// The guard's decision for a snapshot plus its own checking flag.
pub fn decide(state: &SessionState, checking: bool, redirect_to: &str) -> GuardDecision {
    if state.loading || checking {
        GuardDecision::Pending
    } else if !state.has_credential() || !state.authenticated {
        GuardDecision::Redirect {
            to: redirect_to.to_string(),
            replace: true,
        }
    } else {
        GuardDecision::Render
    }
}

pub struct AccessGuard {
    session: Session,
    redirect_to: String,
    checking: watch::Sender<bool>,
}

impl AccessGuard {
    pub fn new(session: Session) -> Self {
        let (checking, _) = watch::channel(false);
        Self {
            session,
            redirect_to: DEFAULT_REDIRECT.to_string(),
            checking,
        }
    }

    pub fn with_redirect(mut self, redirect_to: impl Into<String>) -> Self {
        self.redirect_to = redirect_to.into();
        self
    }

    pub fn redirect_to(&self) -> &str {
        &self.redirect_to
    }

    pub fn is_checking(&self) -> bool {
        *self.checking.borrow()
    }

    /// Current decision without waiting.
    pub fn decision(&self) -> GuardDecision {
        let checking = self.is_checking();
        decide(&self.session.snapshot(), checking, &self.redirect_to)
    }

    /// Re-verify the held credential (if any) and wait for a final decision.
    pub async fn mount(&self) -> GuardDecision {
        if let Some(credential) = self.session.credential() {
            debug!("Guard re-verifying credential");
            self.checking.send_replace(true);
            let verified = self.session.verify_token(Some(&credential)).await;
            self.checking.send_replace(false);
            debug!(verified, "Guard check finished");
        }
        self.resolve().await
    }

    /// Wait until neither the session nor this guard has a check in flight.
    pub async fn resolve(&self) -> GuardDecision {
        let mut session_rx = self.session.subscribe();
        let mut checking_rx = self.checking.subscribe();

        loop {
            let decision = {
                let checking = *checking_rx.borrow_and_update();
                let state = session_rx.borrow_and_update().clone();
                decide(&state, checking, &self.redirect_to)
            };
            if !decision.is_pending() {
                return decision;
            }

            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        return self.decision();
                    }
                }
                changed = checking_rx.changed() => {
                    if changed.is_err() {
                        return self.decision();
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
