//! API client for communicating with the RecipeVault REST backend.
//!
//! This module provides the `ApiClient` struct, which implements the
//! `AuthService` login exchange and performs authenticated requests with
//! headers supplied by the `RequestAuthenticator`.

use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::Session;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Issues credentials in exchange for a username and password.
pub trait AuthService {
    /// Exchange credentials for a complete session. Fails without partial data.
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, ApiError>> + Send;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    #[serde(rename = "fullName")]
    full_name: &'a str,
    password: &'a str,
}

/// API client for the RecipeVault backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for the backend at `base_url`
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Create an account. The new user still has to log in afterwards.
    pub async fn register(
        &self,
        username: &str,
        full_name: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let url = self.url("/auth/register");
        let response = self
            .client
            .post(&url)
            .json(&RegisterRequest {
                username,
                full_name,
                password,
            })
            .send()
            .await?;

        Self::check_response(response).await?;
        debug!(username, "Registered account");
        Ok(())
    }

    /// GET `path` and parse the JSON body, merging `headers` into the request.
    /// Rate-limited responses are retried with exponential backoff.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: header::HeaderMap,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(&url)
                .header(header::ACCEPT, "application/json")
                .headers(headers.clone())
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let response = Self::check_response(response).await?;
            let text = response.text().await?;
            return serde_json::from_str(&text).map_err(|e| {
                ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e))
            });
        }
    }
}

/// Parse a login response body into a session, rejecting incomplete records.
fn parse_login_response(body: &str) -> Result<Session, ApiError> {
    // The body carries the credential, so it is never echoed into the error
    let session: Session = serde_json::from_str(body).map_err(|e| {
        ApiError::InvalidResponse(format!(
            "Login response is not a session record (line {}, column {})",
            e.line(),
            e.column()
        ))
    })?;

    if !session.is_complete() {
        return Err(ApiError::InvalidResponse(
            "Login response is missing username or credential".to_string(),
        ));
    }
    Ok(session)
}

impl AuthService for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let url = self.url("/auth/login");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        let session = parse_login_response(&body)?;

        debug!(user_id = session.user_id, username = %session.username, "Login exchange succeeded");
        Ok(session)
    }
}
