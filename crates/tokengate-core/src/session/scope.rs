use tracing::debug;

use super::{Session, SessionError, SessionState};

/// Where views and guards get their session from.
///
/// A scope is either empty or holds a session whose restore has been
/// started. Reaching for the session through an empty scope is a
/// programming error: `session()` panics, `try_session()` reports
/// `SessionError::OutsideScope`.
#[derive(Clone, Debug, Default)]
pub struct SessionScope {
    session: Option<Session>,
}

impl SessionScope {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Open a scope around `session` and restore it in the background.
    ///
    /// The scope is usable at once; until the restore settles the session
    /// reports `loading` and guards stay pending. Must be called from
    /// within a tokio runtime.
    pub fn provide(session: Session) -> Self {
        let restoring = session.clone();
        tokio::spawn(async move {
            let authenticated = restoring.initialize().await;
            debug!(authenticated, "Session restore finished");
        });
        Self {
            session: Some(session),
        }
    }

    /// Wait for the restore started by `provide` to settle.
    ///
    /// # Panics
    ///
    /// Panics when the scope is empty.
    pub async fn settled(&self) -> SessionState {
        self.session().wait_settled().await
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// # Panics
    ///
    /// Panics when the scope is empty.
    pub fn session(&self) -> &Session {
        match self.session.as_ref() {
            Some(session) => session,
            None => panic!("{}", SessionError::OutsideScope),
        }
    }

    pub fn try_session(&self) -> Result<&Session, SessionError> {
        self.session.as_ref().ok_or(SessionError::OutsideScope)
    }
}
