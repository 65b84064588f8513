use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};

use super::keys::IssuerKeys;
use crate::{AuthContext, AuthError, TokenValidator};

const DEFAULT_KEY_MAX_AGE: Duration = Duration::from_secs(60 * 60);
const WELL_KNOWN_JWKS: &str = "/.well-known/jwks.json";

#[derive(Debug, Clone, Default)]
pub struct JwtVerifierConfig {
    /// Issuer URL to key set URL. An empty key set URL means
    /// `{issuer}/.well-known/jwks.json`.
    pub trusted_issuers: HashMap<String, String>,
    /// Accepted `aud` values. Empty disables the audience check.
    pub audiences: Vec<String>,
    /// Zero selects one hour.
    pub key_max_age: Duration,
}

/// The claims a sharing caller's token must carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains_any(&self, accepted: &[String]) -> bool {
        match self {
            Audience::One(value) => accepted.contains(value),
            Audience::Many(values) => values.iter().any(|value| accepted.contains(value)),
        }
    }
}

/// Verifies ES256 bearer tokens against each trusted issuer's own keys.
pub struct JwtVerifier {
    issuers: HashMap<String, IssuerKeys>,
    audiences: Vec<String>,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(config: JwtVerifierConfig) -> Self {
        let max_age = if config.key_max_age.is_zero() {
            DEFAULT_KEY_MAX_AGE
        } else {
            config.key_max_age
        };

        let issuers = config
            .trusted_issuers
            .into_iter()
            .map(|(issuer, jwks_url)| {
                let issuer = normalize_issuer(&issuer);
                let jwks_url = if jwks_url.is_empty() {
                    format!("{issuer}{WELL_KNOWN_JWKS}")
                } else {
                    jwks_url
                };
                (issuer, IssuerKeys::new(jwks_url, max_age))
            })
            .collect();

        Self {
            issuers,
            audiences: config.audiences,
        }
    }

    pub fn is_trusted(&self, issuer: &str) -> bool {
        self.issuers.contains_key(&normalize_issuer(issuer))
    }

    pub async fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let header = decode_header(token).map_err(|_| AuthError::InvalidToken)?;
        if header.alg != Algorithm::ES256 {
            return Err(AuthError::InvalidToken);
        }
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;

        // The issuer picks the key set, so it is read before verification
        // and compared again against the verified claims below.
        let issuer = normalize_issuer(&peek_issuer(token)?);
        let keys = self.issuers.get(&issuer).ok_or(AuthError::UntrustedIssuer)?;
        let key = keys.key(&kid).await.map_err(|_| AuthError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::ES256);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|error| match error.kind() {
                JwtErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })?
            .claims;

        if let Some(exp) = claims.exp {
            if unix_now() > exp {
                return Err(AuthError::ExpiredToken);
            }
        }
        if normalize_issuer(&claims.iss) != issuer {
            return Err(AuthError::UntrustedIssuer);
        }
        if !self.audiences.is_empty()
            && !claims
                .aud
                .as_ref()
                .is_some_and(|aud| aud.contains_any(&self.audiences))
        {
            return Err(AuthError::InvalidToken);
        }
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(AuthContext {
            issuer,
            user_id: claims.sub,
            display_name: claims.name.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl TokenValidator for JwtVerifier {
    async fn validate_token(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.verify(token).await
    }
}

pub fn normalize_issuer(issuer: &str) -> String {
    issuer.trim_end_matches('/').to_owned()
}

fn peek_issuer(token: &str) -> Result<String, AuthError> {
    #[derive(Deserialize)]
    struct IssuerOnly {
        iss: Option<String>,
    }

    let payload = token.split('.').nth(1).ok_or(AuthError::InvalidToken)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let claims: IssuerOnly =
        serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;
    claims.iss.ok_or(AuthError::UntrustedIssuer)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
