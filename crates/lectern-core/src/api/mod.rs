//! HTTP client module for the lectern account service.
//!
//! The account service issues bearer tokens through its login endpoint;
//! registration and verification-code delivery return success/failure only,
//! with the session established by a follow-up login.

pub mod auth;
pub mod error;

pub use auth::{AuthClient, LoginSession, RegisterOptions};
pub use error::ApiError;

/// Check if a response is successful, returning an error with body if not.
pub(crate) async fn check_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}
