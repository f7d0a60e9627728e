use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use super::client::decode;
use super::{ApiError, HttpClient};
use crate::principal::Principal;

/// Result of a successful refresh.
///
/// Absent `renewal_credential` or `principal` means "keep what you have".
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CredentialSet {
    #[serde(rename = "token", alias = "accessToken", alias = "access_token")]
    pub credential: String,
    #[serde(
        rename = "refreshToken",
        alias = "refresh_token",
        default
    )]
    pub renewal_credential: Option<String>,
    #[serde(rename = "user", default)]
    pub principal: Option<Principal>,
}

impl CredentialSet {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            renewal_credential: None,
            principal: None,
        }
    }

    pub fn with_renewal(mut self, renewal_credential: impl Into<String>) -> Self {
        self.renewal_credential = Some(renewal_credential.into());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

/// The two remote operations the session issues.
///
/// `path` is taken from the session's configured endpoint paths; the
/// credential is sent as a bearer authorization.
#[async_trait]
pub trait AuthEndpoint: Send + Sync {
    async fn verify(&self, path: &str, credential: &str) -> Result<Principal, ApiError>;

    async fn refresh(&self, path: &str, renewal_credential: &str) -> Result<CredentialSet, ApiError>;
}

/// `AuthEndpoint` over HTTP.
#[derive(Clone, Debug)]
pub struct RemoteAuthEndpoint {
    http: HttpClient,
}

impl RemoteAuthEndpoint {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

/// Verify responses are either the principal itself or `{ "user": {...} }`.
fn principal_from_payload(payload: Value) -> Result<Principal, ApiError> {
    match payload {
        Value::Object(mut map) if map.get("user").is_some_and(Value::is_object) => {
            let user = map.remove("user").unwrap_or(Value::Null);
            decode(user)
        }
        other => decode(other),
    }
}

#[async_trait]
impl AuthEndpoint for RemoteAuthEndpoint {
    async fn verify(&self, path: &str, credential: &str) -> Result<Principal, ApiError> {
        let payload = self
            .http
            .request_json(Method::GET, path, Some(credential), None)
            .await?;
        principal_from_payload(payload)
    }

    async fn refresh(&self, path: &str, renewal_credential: &str) -> Result<CredentialSet, ApiError> {
        let payload = self
            .http
            .request_json(Method::POST, path, Some(renewal_credential), None)
            .await?;
        decode(payload)
    }
}
