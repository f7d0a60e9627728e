use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use tokengate_core::{
    AccessGuard, ApiError, AuthEndpoint, CredentialSet, DurableStore, FileStore, GuardDecision,
    MemoryStore, PartialSessionConfig, Principal, Session, SessionConfig, SessionScope,
};

/// Endpoint with a fixed verdict per credential.
#[derive(Default)]
struct FakeAuthServer {
    principals: HashMap<String, Principal>,
    refreshes: HashMap<String, CredentialSet>,
    requests: Mutex<Vec<(String, String)>>,
}

impl FakeAuthServer {
    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl AuthEndpoint for FakeAuthServer {
    async fn verify(&self, path: &str, credential: &str) -> Result<Principal, ApiError> {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), credential.to_string()));
        self.principals
            .get(credential)
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Request failed with status 401".to_string()))
    }

    async fn refresh(&self, path: &str, renewal: &str) -> Result<CredentialSet, ApiError> {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), renewal.to_string()));
        self.refreshes
            .get(renewal)
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Request failed with status 401".to_string()))
    }
}

fn config(value: serde_json::Value) -> SessionConfig {
    let partial: PartialSessionConfig = serde_json::from_value(value).unwrap();
    SessionConfig::from_partial(partial).unwrap()
}

fn me_config() -> SessionConfig {
    config(json!({
        "endpoints": { "verify": "/auth/me" },
        "storage": { "tokenKey": "tok" },
        "autoVerify": true
    }))
}

#[tokio::test]
async fn test_restore_with_accepted_credential() {
    let store = Arc::new(MemoryStore::with_entries([("tok", "abc")]));
    let mut server = FakeAuthServer::default();
    server
        .principals
        .insert("abc".to_string(), Principal::new("1", "a@b.com"));
    let server = Arc::new(server);

    let session = Session::new(me_config(), store, server.clone()).unwrap();
    assert!(session.initialize().await);

    let state = session.snapshot();
    assert!(state.authenticated);
    assert!(!state.loading);
    assert_eq!(state.principal.unwrap().id, "1");
    assert_eq!(server.paths(), vec!["/auth/me".to_string()]);
}

#[tokio::test]
async fn test_restore_with_rejected_credential() {
    let store = Arc::new(MemoryStore::with_entries([("tok", "abc")]));
    let server = Arc::new(FakeAuthServer::default());

    let session = Session::new(me_config(), store.clone(), server).unwrap();
    assert!(!session.initialize().await);

    let state = session.snapshot();
    assert!(!state.authenticated);
    assert!(!state.loading);
    assert_eq!(state.credential, None);
    assert_eq!(store.get("tok").unwrap(), None);
}

#[tokio::test]
async fn test_restore_recovers_through_refresh() {
    let store = Arc::new(MemoryStore::with_entries([("tok", "old"), ("rt", "renew")]));
    let mut server = FakeAuthServer::default();
    server.refreshes.insert(
        "renew".to_string(),
        CredentialSet::new("new").with_principal(Principal::new("1", "a@b.com")),
    );
    let server = Arc::new(server);
    let config = config(json!({
        "endpoints": { "verify": "/auth/me", "refresh": "/auth/refresh" },
        "storage": { "tokenKey": "tok", "refreshTokenKey": "rt" }
    }));

    let session = Session::new(config, store.clone(), server.clone()).unwrap();
    assert!(session.initialize().await);

    let state = session.snapshot();
    assert!(state.authenticated);
    assert_eq!(state.credential.as_deref(), Some("new"));
    assert_eq!(state.renewal_credential.as_deref(), Some("renew"));
    assert_eq!(store.get("tok").unwrap().as_deref(), Some("new"));
    assert_eq!(
        server.paths(),
        vec!["/auth/me".to_string(), "/auth/refresh".to_string()]
    );
}

#[tokio::test]
async fn test_login_survives_reload_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let server = Arc::new(FakeAuthServer::default());
    let config = config(json!({ "autoVerify": false }));
    let user = Principal::new("7", "u@example.com").with_attribute("role", "admin");

    let first = Session::new(config.clone(), Arc::new(FileStore::new(&path)), server.clone()).unwrap();
    first.initialize().await;
    first.login("t", Some("r".to_string()), Some(user.clone()));
    drop(first);

    // Fresh process: new store handle over the same file
    let reloaded = Session::new(config, Arc::new(FileStore::new(&path)), server.clone()).unwrap();
    assert!(reloaded.initialize().await);

    let state = reloaded.snapshot();
    assert!(state.authenticated);
    assert_eq!(state.credential.as_deref(), Some("t"));
    assert_eq!(state.renewal_credential.as_deref(), Some("r"));
    assert_eq!(state.principal, Some(user));
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn test_logout_clears_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let store = Arc::new(FileStore::new(&path));
    let session = Session::new(
        SessionConfig::default(),
        store.clone(),
        Arc::new(FakeAuthServer::default()),
    )
    .unwrap();

    session.login("t", Some("r".to_string()), Some(Principal::new("1", "a@b.com")));
    assert!(path.exists());

    session.logout();
    session.logout();
    assert!(!session.is_authenticated());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_unreadable_store_file_is_replaced_on_login() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, r#"{"auth_token": "abc""#).unwrap();
    let server = Arc::new(FakeAuthServer::default());
    let config = config(json!({ "autoVerify": false }));

    let session = Session::new(config.clone(), Arc::new(FileStore::new(&path)), server.clone()).unwrap();
    assert!(!session.initialize().await);

    session.login("fresh", None, None);
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, json!({ "auth_token": "fresh" }));

    let reloaded = Session::new(config, Arc::new(FileStore::new(&path)), server.clone()).unwrap();
    assert!(reloaded.initialize().await);
    assert_eq!(reloaded.credential().as_deref(), Some("fresh"));

    reloaded.logout();
    assert!(!path.exists());
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn test_guarded_navigation_through_scope() {
    let store = Arc::new(MemoryStore::with_entries([("tok", "abc")]));
    let mut server = FakeAuthServer::default();
    server
        .principals
        .insert("abc".to_string(), Principal::new("1", "a@b.com"));
    let server = Arc::new(server);

    let session = Session::new(me_config(), store, server.clone()).unwrap();
    let scope = SessionScope::provide(session);
    assert!(scope.settled().await.authenticated);

    let guard = AccessGuard::new(scope.session().clone());
    assert_eq!(guard.mount().await, GuardDecision::Render);
    // Restore verify plus the guard's own check
    assert_eq!(server.request_count(), 2);

    scope.session().logout();
    assert_eq!(
        guard.resolve().await,
        GuardDecision::Redirect {
            to: "/login".to_string(),
            replace: true
        }
    );
}
