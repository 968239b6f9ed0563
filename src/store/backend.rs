//! HTTP client for the auth/score CRUD backend
//!
//! The backend owns the users table; this server only needs three
//! operations: login check, registration and highscore update (the
//! backend keeps the max, not the sum). Requests are form-encoded and
//! replies are `{status, message}` JSON.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;

/// Opaque handle attributing a session to an account
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
}

/// Backend reply envelope
#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
    #[serde(default)]
    message: String,
}

impl StatusReply {
    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Client for the auth/score backend
#[derive(Clone)]
pub struct AuthBackend {
    client: Client,
    base_url: String,
}

impl AuthBackend {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.auth_backend_url)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{}/", self.base_url, path)
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<StatusReply, BackendError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .form(form)
            .send()
            .await
            .map_err(BackendError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(BackendError::Parse)
    }

    /// Verify credentials; None means unknown user or wrong password
    pub async fn check_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, BackendError> {
        let reply = self
            .post_form("login", &[("username", username), ("password", password)])
            .await?;
        if reply.is_ok() {
            debug!(username, "login accepted");
            Ok(Some(User {
                username: username.to_string(),
            }))
        } else {
            debug!(username, message = %reply.message, "login rejected");
            Ok(None)
        }
    }

    /// Create an account; None means the username is already taken
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, BackendError> {
        let reply = self
            .post_form(
                "registration",
                &[("username", username), ("password", password)],
            )
            .await?;
        if reply.is_ok() {
            debug!(username, "registration accepted");
            Ok(Some(User {
                username: username.to_string(),
            }))
        } else {
            debug!(username, message = %reply.message, "registration rejected");
            Ok(None)
        }
    }

    /// Report a final score; the backend keeps the maximum
    pub async fn update_highscore(&self, user: &User, score: u32) -> Result<(), BackendError> {
        let score = score.to_string();
        let reply = self
            .post_form(
                "game_result",
                &[("username", user.username.as_str()), ("score", score.as_str())],
            )
            .await?;
        if !reply.is_ok() {
            warn!(username = %user.username, message = %reply.message, "highscore update rejected");
        }
        Ok(())
    }
}


/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}
