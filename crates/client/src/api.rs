//! HTTP client for the server's credential endpoints.
//!
//! The server is the only party that checks passwords and signs tokens; this
//! module just carries credentials there and hands back the token string.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use slotbook_auth::Role;

use crate::config::ClientConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Email/password pair sent to `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/register`.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

/// Anything that can exchange credentials for a token.
#[async_trait::async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue_token(&self, credentials: &Credentials) -> Result<String, ApiError>;
}

/// `reqwest`-based client for `/auth/login` and `/auth/register`.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    api_url: String,
}

impl HttpAuthApi {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.request_timeout())
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    /// Create an account. Returns the server's confirmation message.
    pub async fn register(&self, registration: &Registration) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(self.url("/auth/register"))
            .json(registration)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::CREATED | StatusCode::OK => {
                let body = resp
                    .text()
                    .await
                    .map_err(|e| ApiError::Network(e.to_string()))?;
                // The message may come as `{"message": ...}` or as plain text.
                Ok(serde_json::from_str::<MessageResponse>(&body)
                    .map(|m| m.message)
                    .unwrap_or(body))
            }
            StatusCode::CONFLICT => Err(ApiError::EmailTaken),
            status => Err(ApiError::Api(
                status.as_u16(),
                resp.text().await.unwrap_or_default(),
            )),
        }
    }

    /// Exchange credentials for a token.
    pub async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let body: TokenResponse = resp
                    .json()
                    .await
                    .map_err(|e| ApiError::Parse(e.to_string()))?;
                Ok(body.token)
            }
            StatusCode::UNAUTHORIZED => Err(ApiError::InvalidCredentials),
            status => Err(ApiError::Api(
                status.as_u16(),
                resp.text().await.unwrap_or_default(),
            )),
        }
    }
}

#[async_trait::async_trait]
impl CredentialIssuer for HttpAuthApi {
    async fn issue_token(&self, credentials: &Credentials) -> Result<String, ApiError> {
        self.login(credentials).await
    }
}
