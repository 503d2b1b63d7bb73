//! AccessToken data model and pure value operations (spec.md §3, §4.2 — C2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::token::{generate_token, hash_token};

pub const MAX_TOKEN_NAME_LEN: usize = 100;
pub const MAX_TOKENS_PER_CONFIG: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Disabled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub token_hash: String,
    /// Cached plaintext, present only for tokens minted in this process
    /// lifetime. Never emitted on any list/sanitized response surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_value: Option<String>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_count: u64,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled && !self.is_expired(now)
    }

    pub fn status(&self, now: DateTime<Utc>) -> TokenStatus {
        if !self.enabled {
            TokenStatus::Disabled
        } else if self.is_expired(now) {
            TokenStatus::Expired
        } else {
            TokenStatus::Active
        }
    }

    /// Returns a copy with `token_hash` blanked, safe for any list/get
    /// response. `token_value` is `None` under the default create path, so
    /// there is nothing else to strip here.
    pub fn sanitized(&self) -> AccessToken {
        let mut copy = self.clone();
        copy.token_hash.clear();
        copy
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTokenRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

pub fn validate_create_token_request(
    req: &CreateTokenRequest,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    if req.name.trim().is_empty() {
        return Err(StoreError::Validation("token name is required".into()));
    }
    if req.name.len() > MAX_TOKEN_NAME_LEN {
        return Err(StoreError::Validation(format!(
            "token name must be at most {MAX_TOKEN_NAME_LEN} characters"
        )));
    }
    if let Some(exp) = req.expires_at {
        if exp <= now {
            return Err(StoreError::Validation(
                "expires_at must be strictly in the future".into(),
            ));
        }
    }
    Ok(())
}

pub fn validate_update_token_request(
    req: &UpdateTokenRequest,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() || name.len() > MAX_TOKEN_NAME_LEN {
            return Err(StoreError::Validation(format!(
                "token name must be 1-{MAX_TOKEN_NAME_LEN} characters"
            )));
        }
    }
    if let Some(Some(exp)) = req.expires_at {
        if exp <= now {
            return Err(StoreError::Validation(
                "expires_at must be strictly in the future".into(),
            ));
        }
    }
    Ok(())
}

/// Returns (token record, plaintext). Plaintext is returned exactly once,
/// on the create response; `token_value` is left unset so it is never
/// retained in memory or in the persisted snapshot (spec.md §9: the
/// default behavior, `token_value` exists only as an optional field for
/// deployments that deliberately opt into the copy-to-clipboard trade-off).
pub fn create_access_token(
    req: CreateTokenRequest,
    now: DateTime<Utc>,
) -> Result<(AccessToken, String), crate::token::TokenGenError> {
    let plaintext = generate_token()?;
    let token = AccessToken {
        id: Uuid::new_v4(),
        name: req.name,
        description: req.description,
        token_hash: hash_token(&plaintext),
        token_value: None,
        enabled: true,
        expires_at: req.expires_at,
        created_at: now,
        updated_at: now,
        last_used: None,
        usage_count: 0,
    };
    Ok((token, plaintext))
}

pub fn update_access_token(existing: &AccessToken, req: UpdateTokenRequest, now: DateTime<Utc>) -> AccessToken {
    let mut updated = existing.clone();
    if let Some(name) = req.name {
        updated.name = name;
    }
    if let Some(description) = req.description {
        updated.description = Some(description);
    }
    if let Some(expires_at) = req.expires_at {
        updated.expires_at = expires_at;
    }
    if let Some(enabled) = req.enabled {
        updated.enabled = enabled;
    }
    updated.updated_at = now;
    updated
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenStats {
    pub total: usize,
    pub active: usize,
    pub total_usage: u64,
    pub last_used: Option<DateTime<Utc>>,
}

pub fn calculate_token_stats(tokens: &[AccessToken], now: DateTime<Utc>) -> TokenStats {
    let mut stats = TokenStats {
        total: tokens.len(),
        ..Default::default()
    };
    for t in tokens {
        if t.is_active(now) {
            stats.active += 1;
        }
        stats.total_usage += t.usage_count;
        stats.last_used = match (stats.last_used, t.last_used) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, None) => a,
            (None, b) => b,
        };
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn create_token_fills_defaults() {
        let req = CreateTokenRequest {
            name: "t1".into(),
            description: None,
            expires_at: None,
        };
        let (token, plaintext) = create_access_token(req, now()).unwrap();
        assert_eq!(plaintext.len(), 64);
        assert!(token.enabled);
        assert_eq!(token.usage_count, 0);
        assert_eq!(token.token_hash, crate::token::hash_token(&plaintext));
    }

    #[test]
    fn sanitized_blanks_hash_and_plaintext_is_not_retained() {
        let req = CreateTokenRequest {
            name: "t1".into(),
            description: None,
            expires_at: None,
        };
        let (token, _) = create_access_token(req, now()).unwrap();
        assert_eq!(token.token_value, None);
        let sanitized = token.sanitized();
        assert!(sanitized.token_hash.is_empty());
    }

    #[test]
    fn validate_create_rejects_empty_name_and_past_expiry() {
        let n = now();
        let bad_name = CreateTokenRequest {
            name: "".into(),
            description: None,
            expires_at: None,
        };
        assert!(validate_create_token_request(&bad_name, n).is_err());

        let bad_expiry = CreateTokenRequest {
            name: "ok".into(),
            description: None,
            expires_at: Some(n - chrono::Duration::seconds(1)),
        };
        assert!(validate_create_token_request(&bad_expiry, n).is_err());
    }

    #[test]
    fn status_transitions_disabled_then_expired_then_active() {
        let n = now();
        let req = CreateTokenRequest {
            name: "t".into(),
            description: None,
            expires_at: None,
        };
        let (mut token, _) = create_access_token(req, n).unwrap();
        assert_eq!(token.status(n), TokenStatus::Active);

        token.enabled = false;
        assert_eq!(token.status(n), TokenStatus::Disabled);

        token.enabled = true;
        token.expires_at = Some(n - chrono::Duration::seconds(1));
        assert_eq!(token.status(n), TokenStatus::Expired);
    }
}
