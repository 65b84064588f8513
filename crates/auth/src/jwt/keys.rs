use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::DecodingKey;
use p256::PublicKey;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

/// Upper bound on a key set response body.
pub const MAX_JWKS_BYTES: usize = 1 << 20;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const COORDINATE_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// One public key entry. Only the EC P-256 members are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub crv: String,
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
    #[serde(default)]
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key set request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("key set endpoint answered {0}")]
    Status(StatusCode),
    #[error("key set body of {0} bytes exceeds the limit")]
    TooLarge(usize),
    #[error("key set is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no key with id {0:?}")]
    UnknownKey(String),
    #[error("unsupported key type {kty:?} / curve {crv:?}")]
    Unsupported { kty: String, crv: String },
    #[error("malformed coordinate: {0}")]
    Coordinate(String),
    #[error("point is not on P-256")]
    NotOnCurve,
    #[error("cannot build verification key: {0}")]
    Verification(#[source] jsonwebtoken::errors::Error),
}

#[derive(Default)]
struct Snapshot {
    keys: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Option<Instant>,
}

impl Snapshot {
    fn lookup(&self, kid: &str, max_age: Duration) -> (Option<Arc<DecodingKey>>, bool) {
        let fresh = self
            .fetched_at
            .is_some_and(|fetched_at| fetched_at.elapsed() <= max_age);
        (self.keys.get(kid).cloned(), fresh)
    }
}

/// Cached verification keys of one issuer.
///
/// A fresh hit is served from memory. A miss or a stale hit refetches the
/// key set once (concurrent callers wait on the same refetch); when the
/// refetch fails, a previously cached key is still accepted.
pub struct IssuerKeys {
    jwks_url: String,
    http: reqwest::Client,
    max_age: Duration,
    snapshot: RwLock<Snapshot>,
    refetch: Mutex<()>,
}

impl IssuerKeys {
    #[must_use]
    pub fn new(jwks_url: impl Into<String>, max_age: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            jwks_url: jwks_url.into(),
            http,
            max_age,
            snapshot: RwLock::new(Snapshot::default()),
            refetch: Mutex::new(()),
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub async fn key(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyError> {
        if let (Some(key), true) = self.snapshot.read().await.lookup(kid, self.max_age) {
            return Ok(key);
        }

        let _refetch = self.refetch.lock().await;
        let (cached, fresh) = self.snapshot.read().await.lookup(kid, self.max_age);
        if let (Some(key), true) = (&cached, fresh) {
            return Ok(Arc::clone(key));
        }

        match self.fetch().await {
            Ok(keys) => {
                let mut snapshot = self.snapshot.write().await;
                snapshot.keys = keys;
                snapshot.fetched_at = Some(Instant::now());
                snapshot
                    .keys
                    .get(kid)
                    .cloned()
                    .ok_or_else(|| KeyError::UnknownKey(kid.to_owned()))
            }
            Err(error) => cached.ok_or(error),
        }
    }

    async fn fetch(&self) -> Result<HashMap<String, Arc<DecodingKey>>, KeyError> {
        let response = self.http.get(&self.jwks_url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(KeyError::Status(response.status()));
        }
        let body = response.bytes().await?;
        if body.len() > MAX_JWKS_BYTES {
            return Err(KeyError::TooLarge(body.len()));
        }

        let set: JwkSet = serde_json::from_slice(&body)?;
        // Entries that are not usable P-256 keys are skipped, not fatal.
        Ok(set
            .keys
            .iter()
            .filter(|jwk| !jwk.kid.is_empty())
            .filter_map(|jwk| Some((jwk.kid.clone(), Arc::new(decoding_key(jwk).ok()?))))
            .collect())
    }
}

/// Builds an ES256 verification key, rejecting points off the curve.
pub fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, KeyError> {
    if jwk.kty != "EC" || jwk.crv != "P-256" {
        return Err(KeyError::Unsupported {
            kty: jwk.kty.clone(),
            crv: jwk.crv.clone(),
        });
    }

    let mut point = [0_u8; 1 + 2 * COORDINATE_LEN];
    point[0] = 0x04;
    point[1..=COORDINATE_LEN].copy_from_slice(&coordinate(&jwk.x)?);
    point[1 + COORDINATE_LEN..].copy_from_slice(&coordinate(&jwk.y)?);
    PublicKey::from_sec1_bytes(&point).map_err(|_| KeyError::NotOnCurve)?;

    DecodingKey::from_ec_components(&jwk.x, &jwk.y).map_err(KeyError::Verification)
}

/// Decodes one base64url coordinate, left-padding short encodings.
fn coordinate(encoded: &str) -> Result<[u8; COORDINATE_LEN], KeyError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.as_bytes())
        .map_err(|error| KeyError::Coordinate(error.to_string()))?;
    if bytes.len() > COORDINATE_LEN {
        return Err(KeyError::Coordinate(format!("{} bytes", bytes.len())));
    }
    let mut out = [0_u8; COORDINATE_LEN];
    out[COORDINATE_LEN - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwk(kty: &str, crv: &str, x: &str, y: &str) -> Jwk {
        Jwk {
            kty: kty.to_owned(),
            crv: crv.to_owned(),
            x: x.to_owned(),
            y: y.to_owned(),
            kid: "k".to_owned(),
            alg: None,
        }
    }

    #[test]
    fn rejects_non_p256_keys() {
        assert!(matches!(
            decoding_key(&jwk("RSA", "", "", "")),
            Err(KeyError::Unsupported { .. })
        ));
        assert!(matches!(
            decoding_key(&jwk("EC", "P-384", "", "")),
            Err(KeyError::Unsupported { .. })
        ));
    }

    #[test]
    fn rejects_bad_coordinates() {
        let long = URL_SAFE_NO_PAD.encode([1_u8; 33]);
        assert!(matches!(
            decoding_key(&jwk("EC", "P-256", "***", "AA")),
            Err(KeyError::Coordinate(_))
        ));
        assert!(matches!(
            decoding_key(&jwk("EC", "P-256", &long, "AA")),
            Err(KeyError::Coordinate(_))
        ));
    }

    #[test]
    fn rejects_points_off_the_curve() {
        let one = URL_SAFE_NO_PAD.encode([1_u8; 32]);
        assert!(matches!(
            decoding_key(&jwk("EC", "P-256", &one, &one)),
            Err(KeyError::NotOnCurve)
        ));
    }

    #[test]
    fn short_coordinates_are_left_padded() {
        let padded = coordinate(&URL_SAFE_NO_PAD.encode([7_u8; 31])).expect("pad");
        assert_eq!(padded[0], 0);
        assert_eq!(&padded[1..], &[7_u8; 31]);
    }
}
