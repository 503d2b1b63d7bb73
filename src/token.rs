//! Token primitives (spec.md §4.1, component C1).
//!
//! Opaque bearer credentials: random generation, hashing, constant-time
//! verification. No JWT claims, no signing keys beyond what hashing implies.

use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

// 48 raw bytes base64-encode (unpadded) to exactly 64 characters
// (48 * 8 / 6 = 64, no remainder), so no truncation is needed.
const RAW_TOKEN_BYTES: usize = 48;
const TOKEN_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum TokenGenError {
    #[error("random source unavailable: {0}")]
    RandomSourceUnavailable(#[source] rand::Error),
}

/// Generates a uniformly random bearer token: 48 bytes from a cryptographic
/// RNG, URL-safe base64 encoded, yielding exactly 64 characters.
pub fn generate_token() -> Result<String, TokenGenError> {
    let mut bytes = [0u8; RAW_TOKEN_BYTES];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(TokenGenError::RandomSourceUnavailable)?;
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    debug_assert_eq!(encoded.len(), TOKEN_LEN);
    Ok(encoded)
}

/// SHA-256 of the UTF-8 bytes of `token`, hex-encoded (64 lowercase chars).
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of `token` against a stored hex-encoded hash.
/// Hashes the candidate and compares raw bytes, not the hex string, so
/// comparison time never depends on hex-decoding or string length quirks.
pub fn verify_token(token: &str, hash: &str) -> bool {
    let candidate = hash_token(token);
    let (Ok(a), Ok(b)) = (hex::decode(&candidate), hex::decode(hash)) else {
        return false;
    };
    a.ct_eq(&b).into()
}

/// Length in [32, 64] and decodable as URL-safe base64 (unpadded).
pub fn is_valid_token_format(token: &str) -> bool {
    if !(32..=64).contains(&token.len()) {
        return false;
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_token_has_expected_shape() {
        let t = generate_token().unwrap();
        assert_eq!(t.len(), TOKEN_LEN);
        assert!(is_valid_token_format(&t));
    }

    #[test]
    fn generate_token_is_distinct_across_many_calls() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generate_token().unwrap()));
        }
    }

    #[test]
    fn hash_is_deterministic_and_verify_round_trips() {
        let t = generate_token().unwrap();
        let h1 = hash_token(&t);
        let h2 = hash_token(&t);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(verify_token(&t, &h1));
    }

    #[test]
    fn verify_rejects_wrong_token() {
        let t = generate_token().unwrap();
        let h = hash_token(&t);
        assert!(!verify_token("not-the-token", &h));
    }

    #[test]
    fn format_validation_rejects_bad_lengths_and_encodings() {
        assert!(!is_valid_token_format("short"));
        assert!(!is_valid_token_format(&"a".repeat(65)));
        assert!(!is_valid_token_format("not base64!!"));
        assert!(is_valid_token_format(&"a".repeat(32)));
    }
}
