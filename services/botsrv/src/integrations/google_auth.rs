//! Google service-account authentication
//!
//! Signs an RS256 JWT with the key file's private key and exchanges it for a
//! bearer token at the key file's `token_uri`.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{BotError, Result};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// Source of bearer tokens for the Sheets API
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, for tests and pre-authorized proxies
pub struct StaticTokenSource(pub String);

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: String,
    refresh_at: DateTime<Utc>,
}

pub struct ServiceAccountTokenSource {
    key_path: PathBuf,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key_path: impl Into<PathBuf>, http: reqwest::Client) -> Self {
        Self {
            key_path: key_path.into(),
            http,
            cache: Mutex::new(None),
        }
    }

    /// The key file is read on every refresh so a rotated key needs no restart
    async fn load_key(&self) -> Result<ServiceAccountKey> {
        if self.key_path.as_os_str().is_empty() {
            return Err(BotError::MissingConfig("GOOGLE_SERVICE_ACCOUNT_FILE"));
        }
        let raw = tokio::fs::read_to_string(&self.key_path).await.map_err(|e| {
            BotError::Auth(format!(
                "google service account file not found ({}): {}",
                self.key_path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let key = self.load_key().await?;
        let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let assertion = sign_assertion(&key, token_uri, Utc::now())?;

        let resp = self
            .http
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::api("google_oauth", status.as_u16(), body));
        }

        let token: TokenResponse = resp.json().await?;
        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        let refresh_in = (lifetime - REFRESH_MARGIN_SECS).max(30);
        debug!("Google access token refreshed, valid for {}s", lifetime);

        Ok(CachedToken {
            token: token.access_token,
            refresh_at: Utc::now() + Duration::seconds(refresh_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Utc::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

/// Build the signed JWT assertion for the token exchange
pub fn sign_assertion(key: &ServiceAccountKey, audience: &str, now: DateTime<Utc>) -> Result<String> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: audience,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| BotError::Auth(format!("invalid service account private key: {}", e)))?;

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| BotError::Auth(format!("failed to sign assertion: {}", e)))
}
