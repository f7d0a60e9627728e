//! Test doubles: a scripted `AuthEndpoint` and a one-shot HTTP server.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::{ApiError, AuthEndpoint, CredentialSet};
use crate::principal::Principal;

/// Accepts only the credentials it was told about; everything else gets a
/// 401. Records every call as `"<op> <path> <credential>"`.
#[derive(Default)]
pub(crate) struct ScriptedEndpoint {
    accepted: HashMap<String, Principal>,
    refreshes: HashMap<String, CredentialSet>,
    transport_failure: bool,
    gate: Option<std::sync::Arc<Notify>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEndpoint {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn accept(mut self, credential: &str, principal: Principal) -> Self {
        self.accepted.insert(credential.to_string(), principal);
        self
    }

    pub(crate) fn refresh_to(mut self, renewal: &str, set: CredentialSet) -> Self {
        self.refreshes.insert(renewal.to_string(), set);
        self
    }

    /// Verify fails as if the network were down.
    pub(crate) fn fail_transport(mut self) -> Self {
        self.transport_failure = true;
        self
    }

    /// Hold every verify until the gate is notified.
    pub(crate) fn gated(mut self, gate: std::sync::Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, path: &str, credential: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {} {}", op, path, credential));
    }
}

fn rejected() -> ApiError {
    ApiError::Unauthorized("Request failed with status 401".to_string())
}

#[async_trait]
impl AuthEndpoint for ScriptedEndpoint {
    async fn verify(&self, path: &str, credential: &str) -> Result<Principal, ApiError> {
        self.record("verify", path, credential);
        if let Some(gate) = self.gate.as_ref() {
            gate.notified().await;
        }
        if self.transport_failure {
            return Err(ApiError::InvalidResponse("connection reset".to_string()));
        }
        self.accepted.get(credential).cloned().ok_or_else(rejected)
    }

    async fn refresh(&self, path: &str, renewal_credential: &str) -> Result<CredentialSet, ApiError> {
        self.record("refresh", path, renewal_credential);
        self.refreshes
            .get(renewal_credential)
            .cloned()
            .ok_or_else(rejected)
    }
}

// ============================================================================
// Canned HTTP server
// ============================================================================

/// A request as it arrived on the wire.
#[derive(Debug, Clone)]
pub(crate) struct CapturedRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    /// Header names lowercased.
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: String,
}

/// Accept one connection, answer it with `status`/`content_type`/`body`,
/// and hand back the request. Returns the base URL to send to.
pub(crate) async fn serve_once(
    status: u16,
    content_type: &str,
    body: &str,
) -> (String, tokio::task::JoinHandle<CapturedRequest>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {} Canned\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };

        let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next().unwrap_or_default().split(' ');
        let method = request_line.next().unwrap_or_default().to_string();
        let path = request_line.next().unwrap_or_default().to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect();

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body_bytes = raw[head_end + 4..].to_vec();
        while body_bytes.len() < content_length {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            body_bytes.extend_from_slice(&buf[..n]);
        }

        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        CapturedRequest {
            method,
            path,
            headers,
            body: String::from_utf8_lossy(&body_bytes).to_string(),
        }
    });

    (base_url, handle)
}

/// A base URL nothing is listening on.
pub(crate) async fn closed_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
