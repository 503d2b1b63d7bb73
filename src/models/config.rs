//! ProxyConfig data model and pure value operations (spec.md §3, §4.2 — C2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::access_token::AccessToken;

pub const MAX_NAME_LEN: usize = 100;
pub const MIN_SUBDOMAIN_LEN: usize = 1;
pub const MAX_SUBDOMAIN_LEN: usize = 63;

pub const RESERVED_SUBDOMAINS: &[&str] = &[
    "www", "api", "admin", "mail", "ftp", "localhost", "logs", "ws", "proxy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConfigStats {
    #[serde(default)]
    pub request_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub avg_response_time_ms: f64,
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub id: Uuid,
    pub name: String,
    pub target_url: String,
    pub protocol: Protocol,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: ConfigStats,
    /// Non-nil, possibly-empty. Absent-vs-empty is a migration concern
    /// handled by the migration engine (C5); in memory this is always `Vec`.
    #[serde(default)]
    pub access_tokens: Vec<AccessToken>,
}

impl ProxyConfig {
    /// Defensive copy for store read paths: callers must not be able to
    /// mutate internal state through a returned reference.
    pub fn defensive_copy(&self) -> ProxyConfig {
        self.clone()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConfigRequest {
    pub name: String,
    pub target_url: String,
    pub protocol: Protocol,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub subdomain: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateConfigRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub subdomain: Option<Option<String>>,
}

fn validate_subdomain(sub: &str) -> Result<(), StoreError> {
    if sub.len() < MIN_SUBDOMAIN_LEN || sub.len() > MAX_SUBDOMAIN_LEN {
        return Err(StoreError::Validation(format!(
            "subdomain must be {MIN_SUBDOMAIN_LEN}-{MAX_SUBDOMAIN_LEN} characters"
        )));
    }
    let valid_chars = sub
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = !sub.starts_with('-') && !sub.ends_with('-');
    if !valid_chars || !valid_edges {
        return Err(StoreError::Validation(
            "subdomain must be a lowercase DNS label".into(),
        ));
    }
    if RESERVED_SUBDOMAINS.contains(&sub) {
        return Err(StoreError::Validation(format!(
            "subdomain '{sub}' is reserved"
        )));
    }
    Ok(())
}

fn validate_target_url(raw: &str) -> Result<(), StoreError> {
    let parsed = Url::parse(raw).map_err(|_| StoreError::Validation("target_url is not a valid URL".into()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StoreError::Validation(
            "target_url must use the http or https scheme".into(),
        ));
    }
    if parsed.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(StoreError::Validation("target_url must have a host".into()));
    }
    Ok(())
}

/// Validates name, target URL, protocol and (if present) subdomain.
/// Subdomain is optional (spec.md §9 Open Question, resolved in DESIGN.md):
/// uniqueness is only enforced when a subdomain is actually present.
pub fn validate_config_fields(
    name: &str,
    target_url: &str,
    subdomain: Option<&str>,
) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("name is required".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    validate_target_url(target_url)?;
    if let Some(sub) = subdomain {
        validate_subdomain(sub)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_config() {
        assert!(validate_config_fields("gh", "https://api.github.com", Some("gh")).is_ok());
    }

    #[test]
    fn rejects_empty_name() {
        assert!(validate_config_fields("", "https://example.com", None).is_err());
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(validate_config_fields("x", "ftp://example.com", None).is_err());
    }

    #[test]
    fn rejects_host_missing_url() {
        assert!(validate_config_fields("x", "https:///path", None).is_err());
    }

    #[test]
    fn rejects_reserved_subdomain() {
        assert!(validate_config_fields("x", "https://example.com", Some("admin")).is_err());
    }

    #[test]
    fn rejects_malformed_subdomain_labels() {
        for bad in ["-leading", "trailing-", "UPPER", "has_underscore", ""] {
            assert!(
                validate_config_fields("x", "https://example.com", Some(bad)).is_err(),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn subdomain_is_optional() {
        assert!(validate_config_fields("x", "https://example.com", None).is_ok());
    }
}
