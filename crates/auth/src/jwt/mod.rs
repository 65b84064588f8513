mod keys;
mod verifier;

pub use keys::{decoding_key, IssuerKeys, Jwk, JwkSet, KeyError, MAX_JWKS_BYTES};
pub use verifier::{normalize_issuer, Audience, Claims, JwtVerifier, JwtVerifierConfig};
