//! Google ID-token verification.
//!
//! The frontend completes the Google sign-in flow itself and posts the
//! resulting ID token; the backend only verifies it and extracts the
//! identity. Any OAuth2-compatible verifier can stand in behind
//! [`IdentityVerifier`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::ServiceError;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity asserted by an external provider after token verification
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub email: String,
    pub name: Option<String>,
}

/// Verifies an opaque provider token and returns the identity it asserts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<String>,
    name: Option<String>,
}

/// Verifies Google ID tokens against the tokeninfo endpoint
pub struct GoogleTokenVerifier {
    http: reqwest::Client,
    endpoint: String,
    /// Expected token audience; skipped when unset (development only)
    client_id: Option<String>,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: Option<String>) -> Result<Self, ServiceError> {
        Self::with_endpoint(TOKENINFO_URL.to_string(), client_id)
    }

    pub fn with_endpoint(
        endpoint: String,
        client_id: Option<String>,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            client_id,
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, ServiceError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| ServiceError::Unauthorized(format!("Token verification failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::Unauthorized("Invalid Google token".into()));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| ServiceError::Unauthorized(format!("Invalid token response: {}", e)))?;

        if let Some(expected) = &self.client_id {
            if &info.aud != expected {
                return Err(ServiceError::Unauthorized(
                    "Google token issued for a different client".into(),
                ));
            }
        }

        if info.email_verified.as_deref() == Some("false") {
            return Err(ServiceError::Unauthorized(
                "Google account email is not verified".into(),
            ));
        }

        let email = info.email.ok_or_else(|| {
            ServiceError::Unauthorized("Invalid Google token: no email found".into())
        })?;

        Ok(VerifiedIdentity {
            email,
            name: info.name,
        })
    }
}
