//! Decryption capability boundary.
//!
//! The engine treats key resolution and algorithm negotiation as opaque:
//! callers inject a [`Decryptor`] (KMS client, local key ring, test
//! double) and the rewriter only sees plaintext bytes or a typed
//! failure. The one check owned here is the JWE compact-serialization
//! shape test, so garbage strings are rejected as `MalformedToken`
//! before the capability is ever invoked.

use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::DecryptError;

lazy_static! {
    /// Five dot-separated base64url segments. Header and ciphertext must
    /// be non-empty; encrypted key, IV, and tag may be empty depending on
    /// the algorithm.
    static ref COMPACT_JWE: Regex = Regex::new(
        r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*\.[A-Za-z0-9_-]*\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$"
    )
    .unwrap();
}

/// Opaque decryption capability.
///
/// Implementations may block (key-service round-trip) or compute
/// locally; the rewriter treats every call as a potentially blocking
/// boundary. `Send + Sync` so one capability can serve parallel workers.
pub trait Decryptor: Send + Sync {
    /// Decrypt one compact-serialization token to plaintext bytes.
    fn decrypt(&self, token: &str) -> Result<Vec<u8>, DecryptError>;
}

/// Structural check that a string is JWE compact serialization with a
/// decodable JSON header.
pub fn check_compact_token(token: &str) -> Result<(), DecryptError> {
    if !COMPACT_JWE.is_match(token) {
        return Err(DecryptError::MalformedToken(
            "expected five base64url segments".to_string(),
        ));
    }

    let header_b64 = token.split('.').next().unwrap_or_default();
    let header_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|e| DecryptError::MalformedToken(format!("header decode: {}", e)))?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| DecryptError::MalformedToken(format!("header json: {}", e)))?;
    if !header.is_object() {
        return Err(DecryptError::MalformedToken(
            "header is not a JSON object".to_string(),
        ));
    }

    Ok(())
}
