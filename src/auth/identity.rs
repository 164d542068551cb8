use async_trait::async_trait;

use crate::errors::{AppError, Result};

/// Resolves a bearer token to the external identity key stored on a user.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String>;
}

/// Treats the bearer token itself as the identity key. Token issuance and
/// signature checks belong to the identity provider in front of the service.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenIdentityVerifier;

#[async_trait]
impl IdentityVerifier for TokenIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<String> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Auth("Empty bearer token".to_string()));
        }
        if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AppError::Auth("Malformed bearer token".to_string()));
        }
        Ok(token.to_string())
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(header_value: &str) -> Result<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}
