//! Client for the account-service authentication endpoints.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_response, ApiError};

/// Base URL for the account service when no override is configured.
pub const DEFAULT_AUTH_BASE_URL: &str = "https://api.lectern.app";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Optional fields accompanying an account-creation request.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub email: Option<String>,
    pub verification_code: Option<String>,
}

/// Outcome of a successful credential exchange.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub credits: u64,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(rename = "verificationCode", skip_serializing_if = "Option::is_none")]
    verification_code: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    #[serde(default)]
    credits: u64,
}

/// Client for the account service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    /// Create a client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Exchange credentials for a bearer token and cached credit balance.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginSession, ApiError> {
        let url = format!("{}/auth/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let response = check_response(response).await?;
        let body: LoginResponse = response.json().await?;
        debug!(username, "credential exchange succeeded");

        Ok(LoginSession {
            token: body.token,
            credits: body.user.credits,
        })
    }

    /// Request account creation. The session is established by a follow-up
    /// call to `login`, not by this endpoint.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        options: &RegisterOptions,
    ) -> Result<(), ApiError> {
        let url = format!("{}/auth/register", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&RegisterRequest {
                username,
                password,
                email: options.email.as_deref(),
                verification_code: options.verification_code.as_deref(),
            })
            .send()
            .await?;

        check_response(response).await?;
        debug!(username, "account created");
        Ok(())
    }

    /// Ask the service to email a verification code.
    pub async fn send_code(&self, email: &str) -> Result<(), ApiError> {
        let url = format!("{}/auth/send-code", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        check_response(response).await?;
        Ok(())
    }
}
