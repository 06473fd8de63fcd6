//! REST adapter for the hosted auth/database service.
//!
//! Talks to a PostgREST-style table API under `/rest/v1` and a GoTrue-style
//! auth API under `/auth/v1`. Writes made on behalf of a freshly created user
//! use that user's access token when the signup response carries one, so row
//! policies see the right identity.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccountCreated, AccountMetadata, LookupField, ProfileStub, ProfileUpdate, SignupBackend,
    TagKind,
};
use crate::error::{BackendError, ConfigError};

/// Default per-request timeout of the HTTP client.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the hosted service.
#[derive(Debug, Clone)]
pub struct RestBackendConfig {
    /// Project URL, e.g. `https://xyz.example.co`.
    pub base_url: String,
    /// Public (anon) API key.
    pub anon_key: SecretString,
    pub request_timeout: Duration,
}

impl RestBackendConfig {
    /// Build from `TWINDLE_BACKEND_URL` / `TWINDLE_BACKEND_ANON_KEY`.
    ///
    /// Returns `Ok(None)` when no URL is configured.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(base_url) = std::env::var("TWINDLE_BACKEND_URL") else {
            return Ok(None);
        };
        let anon_key = std::env::var("TWINDLE_BACKEND_ANON_KEY").map_err(|_| {
            ConfigError::MissingRequired {
                key: "TWINDLE_BACKEND_ANON_KEY".into(),
                hint: "Set it to the project's anon key when TWINDLE_BACKEND_URL is set.".into(),
            }
        })?;

        let request_timeout = std::env::var("TWINDLE_BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: SecretString::from(anon_key),
            request_timeout,
        }))
    }
}

/// [`SignupBackend`] over HTTP.
pub struct RestBackend {
    config: RestBackendConfig,
    client: reqwest::Client,
    /// Access tokens returned by signup, keyed by user. Held only until
    /// `release_user`.
    user_tokens: RwLock<HashMap<Uuid, SecretString>>,
}

impl RestBackend {
    pub fn new(config: RestBackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;
        Ok(Self {
            config,
            client,
            user_tokens: RwLock::new(HashMap::new()),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.base_url)
    }

    /// Attach `apikey` and bearer headers; the bearer is the user's token
    /// when known, the anon key otherwise.
    async fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        user_id: Option<Uuid>,
    ) -> Result<reqwest::RequestBuilder, BackendError> {
        let key = self.config.anon_key.expose_secret();
        let token = match user_id {
            Some(id) => self
                .user_tokens
                .read()
                .await
                .get(&id)
                .map(|t| t.expose_secret().to_string()),
            None => None,
        };
        let bearer = token.unwrap_or_else(|| key.to_string());
        let mut auth = HeaderValue::from_str(&format!("Bearer {bearer}"))
            .map_err(|e| BackendError::Request(format!("invalid token header: {e}")))?;
        auth.set_sensitive(true);
        Ok(builder.header("apikey", key).header(AUTHORIZATION, auth))
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.config.request_timeout)
            } else {
                BackendError::Request(e.to_string())
            }
        })?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status,
            message: error_message(&body),
        })
    }
}

/// Pull the human-readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(String::from))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// The auth API answers either `{user: {id}, access_token}` or the bare user.
fn parse_signup_response(body: &Value) -> (Option<Uuid>, Option<String>) {
    let id = body
        .get("user")
        .and_then(|u| u.get("id"))
        .or_else(|| body.get("id"))
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .map(String::from);
    (id, token)
}

#[async_trait]
impl SignupBackend for RestBackend {
    async fn lookup_profile_by_field(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Option<ProfileStub>, BackendError> {
        let column = field.column();
        let builder = self.client.get(self.rest_url("profiles")).query(&[
            ("select", format!("id,{column}")),
            (column, format!("eq.{value}")),
            ("limit", "1".to_string()),
        ]);
        let resp = self.send(self.authorized(builder, None).await?).await?;
        let rows: Vec<ProfileStub> = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
        metadata: &AccountMetadata,
    ) -> Result<AccountCreated, BackendError> {
        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
            "data": metadata,
        });
        let builder = self.client.post(self.auth_url("signup")).json(&body);
        let resp = self.send(self.authorized(builder, None).await?).await?;
        let value: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let (user_id, token) = parse_signup_response(&value);
        if let (Some(id), Some(token)) = (user_id, token) {
            self.user_tokens
                .write()
                .await
                .insert(id, SecretString::from(token));
        }
        Ok(AccountCreated { user_id })
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<(), BackendError> {
        let builder = self
            .client
            .patch(self.rest_url("profiles"))
            .query(&[("id", format!("eq.{user_id}"))])
            .header("Prefer", "return=minimal")
            .json(update);
        self.send(self.authorized(builder, Some(user_id)).await?)
            .await?;
        Ok(())
    }

    async fn insert_tag(
        &self,
        kind: TagKind,
        user_id: Uuid,
        name: &str,
    ) -> Result<(), BackendError> {
        let mut row = serde_json::Map::new();
        row.insert("user_id".into(), Value::String(user_id.to_string()));
        row.insert(kind.column().into(), Value::String(name.to_string()));

        let builder = self
            .client
            .post(self.rest_url(kind.table()))
            .header("Prefer", "return=minimal")
            .json(&Value::Object(row));
        self.send(self.authorized(builder, Some(user_id)).await?)
            .await?;
        Ok(())
    }

    async fn release_user(&self, user_id: Uuid) {
        self.user_tokens.write().await.remove(&user_id);
    }
}
