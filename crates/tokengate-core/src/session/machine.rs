//! The `Session` handle.
//!
//! One session is built at application start and passed to whatever needs
//! it; clones share the same state. State is published on a watch channel so
//! guards and views can wait for it to settle.
//!
//! Only `verify_token` and `refresh_access_token` suspend. Nothing prevents
//! two verify chains from overlapping; whichever finishes last wins.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::{SessionPhase, SessionState};
use super::SessionError;
use crate::api::AuthEndpoint;
use crate::config::SessionConfig;
use crate::principal::Principal;
use crate::store::DurableStore;

struct Inner {
    config: SessionConfig,
    store: Arc<dyn DurableStore>,
    endpoint: Arc<dyn AuthEndpoint>,
    state: watch::Sender<SessionState>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Session")
            .field("phase", &state.phase)
            .field("authenticated", &state.authenticated)
            .field("loading", &state.loading)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn DurableStore>,
        endpoint: Arc<dyn AuthEndpoint>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let (state, _) = watch::channel(SessionState::default());
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                endpoint,
                state,
            }),
        })
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn credential(&self) -> Option<String> {
        self.inner.state.borrow().credential.clone()
    }

    pub fn renewal_credential(&self) -> Option<String> {
        self.inner.state.borrow().renewal_credential.clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.inner.state.borrow().principal.clone()
    }

    /// `Bearer <credential>` for callers making their own authenticated
    /// requests.
    pub fn authorization_header(&self) -> Option<String> {
        self.inner
            .state
            .borrow()
            .credential
            .as_ref()
            .map(|c| format!("Bearer {}", c))
    }

    /// Wait until no restore or restore-triggered verify is in flight.
    pub async fn wait_settled(&self) -> SessionState {
        let mut rx = self.subscribe();
        if rx.wait_for(SessionState::is_settled).await.is_err() {
            return self.snapshot();
        }
        let settled = rx.borrow().clone();
        settled
    }

    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        self.inner.state.send_modify(f);
    }

    // =========================================================================
    // Durable store
    // =========================================================================

    fn read(&self, key: &str) -> Option<String> {
        match self.inner.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read from durable store");
                None
            }
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.inner.store.set(key, value) {
            warn!(key, error = %e, "Failed to write to durable store");
        }
    }

    fn forget(&self, key: &str) {
        if let Err(e) = self.inner.store.remove(key) {
            warn!(key, error = %e, "Failed to remove from durable store");
        }
    }

    fn persist_principal(&self, principal: &Principal) {
        let Some(key) = self.inner.config.storage.user_key.as_deref() else {
            return;
        };
        match principal.to_json() {
            Ok(raw) => self.persist(key, &raw),
            Err(e) => warn!(error = %e, "Failed to serialize principal"),
        }
    }

    fn read_principal(&self) -> Option<Principal> {
        let key = self.inner.config.storage.user_key.as_deref()?;
        let raw = self.read(key)?;
        match Principal::from_json(&raw) {
            Ok(principal) => Some(principal),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable stored principal");
                None
            }
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Restore a previous session from the durable store.
    ///
    /// With `auto_verify` the restored credential is checked remotely (and
    /// refreshed if that fails); without it the credential is trusted until
    /// the next explicit check. Returns whether the session ended up
    /// authenticated. Only the first call restores; later calls report the
    /// current state.
    pub async fn initialize(&self) -> bool {
        let mut started = false;
        self.inner.state.send_if_modified(|state| {
            if state.phase == SessionPhase::Uninitialized {
                state.phase = SessionPhase::Restoring;
                state.loading = true;
                started = true;
            }
            started
        });
        if !started {
            debug!("Session already initialized");
            return self.is_authenticated();
        }

        let storage = &self.inner.config.storage;
        let Some(credential) = self.read(&storage.token_key) else {
            debug!("No stored credential");
            self.update(|state| state.clear());
            return false;
        };

        let renewal_credential = storage
            .refresh_token_key
            .as_deref()
            .and_then(|key| self.read(key));
        let principal = self.read_principal();
        debug!(
            has_renewal = renewal_credential.is_some(),
            has_principal = principal.is_some(),
            "Restored stored credential"
        );

        self.update(|state| {
            state.credential = Some(credential);
            state.renewal_credential = renewal_credential;
            state.principal = principal;
        });

        if self.inner.config.auto_verify {
            self.verify_token(None).await
        } else {
            self.update(|state| {
                if let Some(credential) = state.credential.take() {
                    state.set_authenticated(credential);
                }
            });
            info!("Session restored without verification");
            true
        }
    }

    /// Start a new session, replacing any previous one. No remote call.
    pub fn login(
        &self,
        credential: impl Into<String>,
        renewal_credential: Option<String>,
        principal: Option<Principal>,
    ) {
        let credential = credential.into();
        let storage = &self.inner.config.storage;

        self.persist(&storage.token_key, &credential);
        if let Some(key) = storage.refresh_token_key.as_deref() {
            match renewal_credential.as_deref() {
                Some(renewal) => self.persist(key, renewal),
                None => self.forget(key),
            }
        }
        match principal.as_ref() {
            Some(principal) => self.persist_principal(principal),
            None => {
                if let Some(key) = storage.user_key.as_deref() {
                    self.forget(key);
                }
            }
        }

        self.update(|state| {
            state.set_authenticated(credential);
            state.renewal_credential = renewal_credential;
            state.principal = principal;
            state.verified_at = None;
        });
        info!("Logged in");
    }

    /// End the session and remove every configured storage key. Always
    /// succeeds; safe to call repeatedly.
    pub fn logout(&self) {
        for key in self.inner.config.storage.configured() {
            self.forget(key);
        }
        self.update(|state| state.clear());
        info!("Logged out");
    }

    /// Check a credential (or the held one) against the verify endpoint.
    ///
    /// On rejection or transport failure the refresh path is tried when a
    /// renewal credential and refresh endpoint exist; if that also fails the
    /// session is logged out. Returns whether the session is authenticated
    /// afterwards.
    pub async fn verify_token(&self, credential: Option<&str>) -> bool {
        let credential = match credential.map(str::to_owned).or_else(|| self.credential()) {
            Some(credential) => credential,
            None => {
                debug!("No credential to verify");
                self.update(|state| {
                    state.loading = false;
                    if state.phase == SessionPhase::Restoring {
                        state.phase = SessionPhase::Unauthenticated;
                    }
                });
                return false;
            }
        };

        let path = &self.inner.config.endpoints.verify;
        match self.inner.endpoint.verify(path, &credential).await {
            Ok(principal) => {
                if self.credential().as_deref() != Some(credential.as_str()) {
                    self.persist(&self.inner.config.storage.token_key, &credential);
                }
                self.persist_principal(&principal);
                self.update(|state| {
                    state.set_authenticated(credential);
                    state.principal = Some(principal);
                    state.verified_at = Some(Utc::now());
                });
                info!("Credential verified");
                true
            }
            Err(e) => {
                if e.is_rejection() {
                    debug!(error = %e, "Credential rejected");
                } else {
                    warn!(error = %e, "Verify request failed");
                }

                let can_refresh =
                    self.inner.config.refresh_enabled() && self.renewal_credential().is_some();
                if can_refresh && self.refresh_access_token().await {
                    return true;
                }

                self.logout();
                false
            }
        }
    }

    /// Exchange the renewal credential for a new credential set.
    ///
    /// Without a renewal credential or a refresh endpoint this fails without
    /// a remote call. A failed exchange logs the session out.
    pub async fn refresh_access_token(&self) -> bool {
        let Some(path) = self.inner.config.endpoints.refresh.as_deref() else {
            debug!("No refresh endpoint configured");
            return false;
        };
        let Some(renewal_credential) = self.renewal_credential() else {
            debug!("No renewal credential held");
            return false;
        };

        match self.inner.endpoint.refresh(path, &renewal_credential).await {
            Ok(set) => {
                let storage = &self.inner.config.storage;
                self.persist(&storage.token_key, &set.credential);
                if let (Some(key), Some(renewal)) =
                    (storage.refresh_token_key.as_deref(), set.renewal_credential.as_deref())
                {
                    self.persist(key, renewal);
                }
                if let Some(principal) = set.principal.as_ref() {
                    self.persist_principal(principal);
                }

                self.update(|state| {
                    state.set_authenticated(set.credential);
                    if let Some(renewal) = set.renewal_credential {
                        state.renewal_credential = Some(renewal);
                    }
                    if let Some(principal) = set.principal {
                        state.principal = Some(principal);
                    }
                    state.verified_at = Some(Utc::now());
                });
                info!("Credential refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, logging out");
                self.logout();
                false
            }
        }
    }

    /// Replace the principal. Leaves credentials and `authenticated` alone.
    pub fn update_user(&self, principal: Principal) {
        self.persist_principal(&principal);
        self.update(|state| state.principal = Some(principal));
        debug!("Principal updated");
    }
}

// ============================================================================
// Tests
// ============================================================================
