//! Shared-key signatures on object-store notifications.
//!
//! The sender puts `hex(HMAC-SHA256(key, body))` in [`SIGNATURE_HEADER`].

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-sharekeep-signature";

/// Shortest accepted key, in bytes.
pub const MIN_KEY_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("event key must be at least {MIN_KEY_LEN} bytes")]
    KeyTooShort,
    #[error("event key is not valid hex")]
    KeyNotHex,
    #[error("missing event signature")]
    Missing,
    #[error("event signature does not match")]
    Mismatch,
}

#[derive(Clone)]
pub struct EventKey {
    keyed: HmacSha256,
}

impl std::fmt::Debug for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventKey(..)")
    }
}

impl EventKey {
    pub fn new(key: Vec<u8>) -> Result<Self, SignatureError> {
        if key.len() < MIN_KEY_LEN {
            return Err(SignatureError::KeyTooShort);
        }
        let keyed =
            <HmacSha256 as Mac>::new_from_slice(&key).map_err(|_| SignatureError::KeyTooShort)?;
        Ok(Self { keyed })
    }

    pub fn from_hex(encoded: &str) -> Result<Self, SignatureError> {
        let key = hex::decode(encoded.trim()).map_err(|_| SignatureError::KeyNotHex)?;
        Self::new(key)
    }

    pub fn sign(&self, body: &[u8]) -> String {
        hex::encode(self.mac(body).finalize().into_bytes())
    }

    /// Checks a hex signature over `body`. The comparison is constant time.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let signature = signature
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SignatureError::Missing)?;
        let expected = hex::decode(signature).map_err(|_| SignatureError::Mismatch)?;
        self.mac(body)
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    fn mac(&self, body: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(body);
        mac
    }
}
