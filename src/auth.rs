//! Log-view authenticator (spec.md §4.7 — component C7).
//!
//! A single shared secret gates the log-view HTTP surface. Credentials can
//! arrive through five channels, checked in a fixed precedence order; once
//! a cookie session is established it is carried as AES-256-GCM-encrypted
//! opaque ciphertext rather than the raw secret, the way the teacher's
//! `proxy::auth` cookie helpers avoid putting long-lived secrets on the
//! wire verbatim. Comparison against the configured secret is
//! constant-time throughout.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use axum::http::HeaderMap;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;

pub const MIN_SECRET_LEN: usize = 8;
pub const MAX_SECRET_LEN: usize = 256;

pub const HEADER_SECRET: &str = "x-log-secret";
pub const COOKIE_NAME: &str = "log_auth";
pub const FORM_FIELD: &str = "secret";
pub const QUERY_PARAM: &str = "secret";
pub const CLEAR_AUTH_HEADER: &str = "x-clear-auth-storage";

const NONCE_LEN: usize = 12;

/// Holds the configured secret and the derived AES-256-GCM key used to
/// encrypt/decrypt the session cookie. The secret itself is never put in
/// the cookie; only a constant-payload ciphertext marker is.
pub struct LogAuthenticator {
    secret: String,
    cipher: Aes256Gcm,
}

impl LogAuthenticator {
    pub fn new(secret: String) -> Result<Self, AuthError> {
        if !(MIN_SECRET_LEN..=MAX_SECRET_LEN).contains(&secret.len()) {
            return Err(AuthError::InvalidSecret);
        }
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        let key = hasher.finalize();
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| AuthError::InvalidSecret)?;
        Ok(Self { secret, cipher })
    }

    fn secret_matches(&self, candidate: &str) -> bool {
        let a = Sha256::digest(candidate.as_bytes());
        let b = Sha256::digest(self.secret.as_bytes());
        a.ct_eq(&b).into()
    }

    /// Encrypts the configured secret into an opaque, base64 cookie value.
    pub fn encode_cookie(&self) -> Result<String, AuthError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, self.secret.as_bytes())
            .map_err(|_| AuthError::AuthFailed)?;
        let mut payload = nonce_bytes.to_vec();
        payload.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload))
    }

    fn decode_cookie(&self, value: &str) -> Option<String> {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(value).ok()?;
        if payload.len() <= NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self.cipher.decrypt(nonce, ciphertext).ok()?;
        String::from_utf8(plaintext).ok()
    }

    /// Extracts a candidate secret from the request, in precedence order:
    /// header, bearer token, cookie, form field, query param. Returns the
    /// first channel that is present at all (even if it turns out wrong),
    /// so a stale cookie doesn't silently fall through to "no credential".
    pub fn extract_candidate(
        &self,
        headers: &HeaderMap,
        form_secret: Option<&str>,
        query_secret: Option<&str>,
    ) -> Option<String> {
        if let Some(v) = headers.get(HEADER_SECRET).and_then(|v| v.to_str().ok()) {
            return Some(v.to_string());
        }
        if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            if let Some(token) = auth.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
        if let Some(cookie_header) = headers.get(axum::http::header::COOKIE).and_then(|v| v.to_str().ok()) {
            if let Some(raw) = find_cookie(cookie_header, COOKIE_NAME) {
                if let Some(decoded) = self.decode_cookie(raw) {
                    return Some(decoded);
                }
                return Some(String::new()); // present but undecodable: treated as wrong, not absent.
            }
        }
        if let Some(v) = form_secret {
            return Some(v.to_string());
        }
        query_secret.map(str::to_string)
    }

    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        form_secret: Option<&str>,
        query_secret: Option<&str>,
    ) -> Result<(), AuthError> {
        let candidate = self
            .extract_candidate(headers, form_secret, query_secret)
            .ok_or(AuthError::AuthRequired)?;
        if self.secret_matches(&candidate) {
            Ok(())
        } else {
            Err(AuthError::AuthFailed)
        }
    }

    /// Validates a login submission's raw secret and, on success, returns
    /// the cookie value to set.
    pub fn login(&self, candidate: &str) -> Result<String, AuthError> {
        if self.secret_matches(candidate) {
            self.encode_cookie()
        } else {
            Err(AuthError::AuthFailed)
        }
    }
}

fn find_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|part| {
        let part = part.trim();
        let (k, v) = part.split_once('=')?;
        (k == name).then_some(v)
    })
}
