//! # OAuth2 Access Tokens
//!
//! The FCM HTTP v1 API takes a short-lived bearer token. With a service
//! account key the gateway signs an RS256 assertion, exchanges it at the
//! key's `token_uri`, and caches the result until shortly before it expires.
//! A statically configured token bypasses all of this and is never refreshed.

use super::{GatewayError, GatewayResult};
use crate::config::PushConfig;
use crate::logging::redact_token;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// OAuth scope required for sending FCM messages
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are refreshed before use
const REFRESH_MARGIN_SECS: i64 = 60;

/// Supplies the bearer token for each gateway request
#[async_trait]
pub trait AccessTokenSource: Send + Sync + fmt::Debug {
    async fn access_token(&self) -> GatewayResult<String>;

    /// Drop any cached token so the next call fetches a new one
    async fn invalidate(&self) {}
}

/// A fixed token taken from configuration
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken")
            .field(&redact_token(&self.0))
            .finish()
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> GatewayResult<String> {
        Ok(self.0.clone())
    }
}

/// The subset of a Google service account key file the gateway needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> GatewayResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| GatewayError::configuration(format!("invalid service account key: {e}")))
    }

    pub fn from_file(path: &Path) -> GatewayResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::configuration(format!(
                "cannot read service account key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }
}

/// Claims of the signed assertion sent to the token endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Mints and caches access tokens from a service account key
pub struct ServiceAccountTokenSource {
    client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    pub fn new(client: reqwest::Client, key: ServiceAccountKey) -> GatewayResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            GatewayError::configuration(format!("invalid service account private key: {e}"))
        })?;
        Ok(Self {
            client,
            key,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }

    pub(crate) fn assertion(&self, now: DateTime<Utc>) -> GatewayResult<String> {
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to sign service account assertion");
            GatewayError::configuration(format!("cannot sign assertion: {e}"))
        })
    }

    async fn fetch(&self, now: DateTime<Utc>) -> GatewayResult<CachedToken> {
        let assertion = self.assertion(now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status.as_u16(), body));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::invalid_response(format!("token response: {e}")))?;

        info!(
            client_email = %self.key.client_email,
            expires_in = parsed.expires_in,
            "Obtained FCM access token"
        );
        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: now + Duration::seconds(parsed.expires_in),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> GatewayResult<String> {
        // Held across the fetch so concurrent fallback sends share one refresh
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.token.clone());
        }

        debug!(token_uri = %self.key.token_uri, "Refreshing FCM access token");
        let fresh = self.fetch(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

/// Credentials resolved from configuration, with the project id they imply
#[derive(Debug)]
pub struct ResolvedCredentials {
    pub source: Arc<dyn AccessTokenSource>,
    pub project_id: Option<String>,
}

/// Pick the token source: a static `access_token` wins, then the service
/// account key from `credentials_path` or `GOOGLE_APPLICATION_CREDENTIALS`.
pub fn resolve_credentials(
    config: &PushConfig,
    client: &reqwest::Client,
) -> GatewayResult<ResolvedCredentials> {
    if let Some(token) = config
        .access_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        return Ok(ResolvedCredentials {
            source: Arc::new(StaticToken::new(token)),
            project_id: None,
        });
    }

    let path = config.credentials_file().ok_or_else(|| {
        GatewayError::configuration(
            "fcm requires push.access_token, push.credentials_path or GOOGLE_APPLICATION_CREDENTIALS",
        )
    })?;
    let key = ServiceAccountKey::from_file(&path)?;
    info!(
        path = %path.display(),
        client_email = %key.client_email,
        "Loaded service account credentials"
    );
    let project_id = key.project_id.clone();
    Ok(ResolvedCredentials {
        source: Arc::new(ServiceAccountTokenSource::new(client.clone(), key)?),
        project_id,
    })
}
