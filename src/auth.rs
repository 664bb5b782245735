//! Identity verification against the external authentication provider.
//!
//! The provider is a separate service reached over HTTP; this module wraps
//! it behind the `AuthProvider` capability trait so the push workflows can
//! be exercised against in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{Result, ServerError};

/// Failure talking to the authentication provider (network, bad payload).
#[derive(Debug, Error)]
#[error("auth provider error: {0}")]
pub struct ProviderError(pub String);

/// Capability interface over the external authentication provider.
///
/// The two calls are independently failable: the provider may accept a
/// credential but still fail to resolve a profile under transient errors.
/// Callers must not assume one success implies the other.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Is this credential currently valid?
    async fn validate_token(&self, token: &str) -> std::result::Result<bool, ProviderError>;

    /// Resolve the credential's profile; expected to carry a numeric `id`.
    async fn fetch_profile(&self, token: &str)
        -> std::result::Result<serde_json::Value, ProviderError>;
}

/// HTTP implementation talking to the user service.
pub struct HttpAuthProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn validate_token(&self, token: &str) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/api/auth/validate", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError(format!(
                "validate endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<bool>()
            .await
            .map_err(|e| ProviderError(e.to_string()))
    }

    async fn fetch_profile(
        &self,
        token: &str,
    ) -> std::result::Result<serde_json::Value, ProviderError> {
        let url = format!("{}/api/users/profile", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError(format!(
                "profile endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError(e.to_string()))
    }
}

/// Resolves a credential to a verified numeric user id.
pub struct IdentityVerifier {
    provider: Arc<dyn AuthProvider>,
}

impl IdentityVerifier {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }

    /// Verify a credential. An invalid or unverifiable credential is
    /// `Unauthorized`; a valid credential whose profile has no numeric id
    /// is `IdentityResolutionFailed`. No retries are made here.
    pub async fn verify(&self, token: &str) -> Result<i64> {
        match self.provider.validate_token(token).await {
            Ok(true) => {}
            Ok(false) => return Err(ServerError::Unauthorized),
            Err(e) => {
                tracing::warn!("token validation failed: {}", e);
                return Err(ServerError::Unauthorized);
            }
        }

        let profile = match self.provider.fetch_profile(token).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("profile resolution failed: {}", e);
                return Err(ServerError::IdentityResolutionFailed);
            }
        };

        profile
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .ok_or(ServerError::IdentityResolutionFailed)
    }
}
