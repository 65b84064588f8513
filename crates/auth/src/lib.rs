#![forbid(unsafe_code)]

//! Caller identity for the sharing API.
//!
//! Bearer tokens are ES256 JWTs from trusted issuers ([`jwt::JwtVerifier`]);
//! object-store notifications carry an HMAC over their body
//! ([`event_signature`]).

use async_trait::async_trait;

pub mod event_signature;
pub mod jwt;

/// The verified caller of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub issuer: String,
    pub user_id: String,
    /// Display name claim at token issue time; may be empty.
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("token has expired")]
    ExpiredToken,
    #[error("untrusted token issuer")]
    UntrustedIssuer,
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate_token(&self, token: &str) -> Result<AuthContext, AuthError>;
}
