//! Concurrent, indexed config store (spec.md §4.3 — component C3).
//!
//! Backing data is `HashMap<id, ProxyConfig>` plus `HashMap<subdomain, id>`
//! guarded by a single readers-writer lock, following the teacher's use of
//! `parking_lot::RwLock` for state that is read far more than it is
//! written (see `serverless::local_conn_pool::EndpointConnPool`).

pub mod filter;

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::access_token::{
    self, AccessToken, CreateTokenRequest, TokenStats, UpdateTokenRequest, MAX_TOKENS_PER_CONFIG,
};
use crate::models::config::{self, CreateConfigRequest, ProxyConfig, UpdateConfigRequest};
use crate::token::verify_token;

pub use filter::{paginate, ConfigListFilter, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOp {
    Enable,
    Disable,
    Delete,
    /// Any operation name the wire format doesn't recognize. Kept as a
    /// catch-all variant (rather than rejecting the request body outright)
    /// so an unknown op fails per-id with `UnsupportedOperation`, matching
    /// every other batch failure mode, instead of a blanket 400.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub success: Vec<Uuid>,
    pub failed: Vec<BatchFailure>,
    pub total_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    Skip,
    Replace,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMode {
    Preserve,
    Regenerate,
}

impl Default for IdMode {
    fn default() -> Self {
        IdMode::Regenerate
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ImportResult {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportData {
    pub version: &'static str,
    pub exported_at: chrono::DateTime<Utc>,
    pub configs: Vec<ProxyConfig>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<AccessToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

struct Inner {
    configs: HashMap<Uuid, ProxyConfig>,
    subdomains: HashMap<String, Uuid>,
}

/// Concurrent, indexed config store. One `RwLock` guards all state; every
/// value handed back to a caller is an owned copy (spec.md §4.3, §5).
pub struct ConfigStore {
    inner: RwLock<Inner>,
    max_entries: usize,
}

impl ConfigStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                configs: HashMap::new(),
                subdomains: HashMap::new(),
            }),
            max_entries,
        }
    }

    /// Rehydrates the store from a decoded snapshot (used by the
    /// persistence layer on load, after migration).
    pub fn load_from(configs: HashMap<Uuid, ProxyConfig>, max_entries: usize) -> Self {
        let mut subdomains = HashMap::new();
        for (id, c) in &configs {
            if let Some(sub) = &c.subdomain {
                if !sub.is_empty() {
                    subdomains.insert(sub.clone(), *id);
                }
            }
        }
        Self {
            inner: RwLock::new(Inner { configs, subdomains }),
            max_entries,
        }
    }

    /// Snapshot of the current map, for the persistence layer to encode.
    pub fn snapshot(&self) -> HashMap<Uuid, ProxyConfig> {
        self.inner.read().configs.clone()
    }

    pub fn add(&self, req: CreateConfigRequest) -> Result<ProxyConfig, StoreError> {
        config::validate_config_fields(&req.name, &req.target_url, req.subdomain.as_deref())?;
        let mut inner = self.inner.write();
        if let Some(sub) = &req.subdomain {
            if inner.subdomains.contains_key(sub) {
                return Err(StoreError::DuplicateSubdomain);
            }
        }
        if inner.configs.len() >= self.max_entries {
            return Err(StoreError::CapacityExceeded);
        }
        let now = Utc::now();
        let id = Uuid::new_v4();
        let config = ProxyConfig {
            id,
            name: req.name,
            target_url: req.target_url,
            protocol: req.protocol,
            enabled: req.enabled,
            subdomain: req.subdomain.clone(),
            created_at: now,
            updated_at: now,
            stats: Default::default(),
            access_tokens: Vec::new(),
        };
        if let Some(sub) = &req.subdomain {
            inner.subdomains.insert(sub.clone(), id);
        }
        inner.configs.insert(id, config.clone());
        Ok(config)
    }

    pub fn update(&self, id: Uuid, req: UpdateConfigRequest) -> Result<ProxyConfig, StoreError> {
        let mut inner = self.inner.write();
        let existing = inner
            .configs
            .get(&id)
            .ok_or(StoreError::ConfigNotFound)?
            .clone();

        let name = req.name.unwrap_or_else(|| existing.name.clone());
        let target_url = req.target_url.unwrap_or_else(|| existing.target_url.clone());
        let new_subdomain = req.subdomain.clone().unwrap_or_else(|| existing.subdomain.clone());
        config::validate_config_fields(&name, &target_url, new_subdomain.as_deref())?;

        if new_subdomain != existing.subdomain {
            if let Some(sub) = &new_subdomain {
                if inner.subdomains.get(sub).is_some_and(|owner| *owner != id) {
                    return Err(StoreError::DuplicateSubdomain);
                }
            }
        }

        let mut updated = existing.clone();
        updated.name = name;
        updated.target_url = target_url;
        if let Some(protocol) = req.protocol {
            updated.protocol = protocol;
        }
        if let Some(enabled) = req.enabled {
            updated.enabled = enabled;
        }
        updated.subdomain = new_subdomain.clone();
        updated.updated_at = Utc::now();
        // created_at is immutable after Add.

        if let Some(old_sub) = &existing.subdomain {
            if existing.subdomain != new_subdomain {
                inner.subdomains.remove(old_sub);
            }
        }
        if let Some(sub) = &new_subdomain {
            if existing.subdomain.as_deref() != Some(sub.as_str()) {
                inner.subdomains.insert(sub.clone(), id);
            }
        }

        inner.configs.insert(id, updated.clone());
        Ok(updated)
    }

    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let existing = inner.configs.remove(&id).ok_or(StoreError::ConfigNotFound)?;
        if let Some(sub) = existing.subdomain {
            inner.subdomains.remove(&sub);
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<ProxyConfig, StoreError> {
        self.inner
            .read()
            .configs
            .get(&id)
            .map(ProxyConfig::defensive_copy)
            .ok_or(StoreError::ConfigNotFound)
    }

    /// Treats `enabled=false` as not-found, per spec.md §4.3.
    pub fn get_by_subdomain(&self, subdomain: &str) -> Result<ProxyConfig, StoreError> {
        let inner = self.inner.read();
        let id = inner
            .subdomains
            .get(subdomain)
            .ok_or(StoreError::ConfigNotFound)?;
        let config = inner.configs.get(id).ok_or(StoreError::ConfigNotFound)?;
        if !config.enabled {
            return Err(StoreError::ConfigNotFound);
        }
        Ok(config.defensive_copy())
    }

    pub fn list(&self, filter: &ConfigListFilter) -> Page<ProxyConfig> {
        let inner = self.inner.read();
        let mut items: Vec<ProxyConfig> = inner.configs.values().cloned().collect();

        if let Some(enabled) = filter.enabled {
            items.retain(|c| c.enabled == enabled);
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            items.retain(|c| {
                c.name.to_lowercase().contains(&needle)
                    || c.subdomain
                        .as_ref()
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                    || c.target_url.to_lowercase().contains(&needle)
            });
        }
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        paginate(items, filter.page(), filter.limit())
    }

    pub fn batch_operation(&self, op: BatchOp, ids: &[Uuid]) -> BatchResult {
        let mut inner = self.inner.write();
        let mut result = BatchResult {
            total_count: ids.len(),
            ..Default::default()
        };
        for &id in ids {
            let outcome = match op {
                BatchOp::Enable | BatchOp::Disable => {
                    match inner.configs.get_mut(&id) {
                        Some(c) => {
                            c.enabled = matches!(op, BatchOp::Enable);
                            c.updated_at = Utc::now();
                            Ok(())
                        }
                        None => Err(StoreError::ConfigNotFound),
                    }
                }
                BatchOp::Delete => match inner.configs.remove(&id) {
                    Some(existing) => {
                        if let Some(sub) = existing.subdomain {
                            inner.subdomains.remove(&sub);
                        }
                        Ok(())
                    }
                    None => Err(StoreError::ConfigNotFound),
                },
                BatchOp::Unknown => Err(StoreError::UnsupportedOperation),
            };
            match outcome {
                Ok(()) => result.success.push(id),
                Err(e) => result.failed.push(BatchFailure {
                    id,
                    error: e.to_string(),
                }),
            }
        }
        result.failed_count = result.failed.len();
        result
    }

    pub fn export_all(&self) -> ExportData {
        let inner = self.inner.read();
        let configs: Vec<ProxyConfig> = inner.configs.values().cloned().collect();
        ExportData {
            version: "1.1.0",
            exported_at: Utc::now(),
            total: configs.len(),
            configs,
        }
    }

    pub fn import_configs(
        &self,
        configs: Vec<ProxyConfig>,
        mode: ImportMode,
        id_mode: IdMode,
    ) -> ImportResult {
        let mut inner = self.inner.write();
        let mut result = ImportResult::default();

        for candidate in configs {
            if inner.configs.len() >= self.max_entries {
                break;
            }
            if let Err(e) = config::validate_config_fields(
                &candidate.name,
                &candidate.target_url,
                candidate.subdomain.as_deref(),
            ) {
                result.error_count += 1;
                result.errors.push(e.to_string());
                continue;
            }

            let colliding_id = candidate
                .subdomain
                .as_ref()
                .and_then(|s| inner.subdomains.get(s).copied());

            if let Some(existing_id) = colliding_id {
                match mode {
                    ImportMode::Skip => {
                        result.skipped_count += 1;
                        continue;
                    }
                    ImportMode::Error => {
                        result.error_count += 1;
                        result.errors.push(format!(
                            "subdomain '{}' already in use",
                            candidate.subdomain.as_deref().unwrap_or_default()
                        ));
                        continue;
                    }
                    ImportMode::Replace => {
                        if let Some(existing) = inner.configs.remove(&existing_id) {
                            if let Some(sub) = existing.subdomain {
                                inner.subdomains.remove(&sub);
                            }
                        }
                    }
                }
            }

            let now = Utc::now();
            let id = match id_mode {
                IdMode::Preserve => candidate.id,
                IdMode::Regenerate => Uuid::new_v4(),
            };
            let mut stored = candidate;
            stored.id = id;
            stored.created_at = now;
            stored.updated_at = now;
            if let Some(sub) = &stored.subdomain {
                inner.subdomains.insert(sub.clone(), id);
            }
            inner.configs.insert(id, stored);
            result.imported_count += 1;
        }
        result
    }

    pub fn update_stats(&self, config_id: Uuid, response_time_ms: f64, success: bool, bytes: u64) {
        let mut inner = self.inner.write();
        if let Some(config) = inner.configs.get_mut(&config_id) {
            let stats = &mut config.stats;
            if !success {
                stats.error_count += 1;
            }
            if stats.request_count == 0 {
                stats.avg_response_time_ms = response_time_ms;
            } else {
                stats.avg_response_time_ms =
                    stats.avg_response_time_ms * 0.9 + response_time_ms * 0.1;
            }
            stats.request_count += 1;
            stats.total_bytes += bytes;
            stats.last_accessed = Some(Utc::now());
        }
    }

    // --- token ops ---

    pub fn add_token(&self, config_id: Uuid, req: CreateTokenRequest) -> Result<(AccessToken, String), StoreError> {
        let now = Utc::now();
        access_token::validate_create_token_request(&req, now)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let mut inner = self.inner.write();
        let config = inner
            .configs
            .get_mut(&config_id)
            .ok_or(StoreError::ConfigNotFound)?;
        if config.access_tokens.len() >= MAX_TOKENS_PER_CONFIG {
            return Err(StoreError::MaxTokensExceeded);
        }
        let (token, plaintext) = access_token::create_access_token(req, now)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        config.access_tokens.push(token.clone());
        Ok((token, plaintext))
    }

    pub fn update_token(
        &self,
        config_id: Uuid,
        token_id: Uuid,
        req: UpdateTokenRequest,
    ) -> Result<AccessToken, StoreError> {
        let now = Utc::now();
        access_token::validate_update_token_request(&req, now)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let mut inner = self.inner.write();
        let config = inner
            .configs
            .get_mut(&config_id)
            .ok_or(StoreError::ConfigNotFound)?;
        let existing = config
            .access_tokens
            .iter()
            .find(|t| t.id == token_id)
            .ok_or(StoreError::TokenNotFound)?;
        let updated = access_token::update_access_token(existing, req, now);
        let slot = config
            .access_tokens
            .iter_mut()
            .find(|t| t.id == token_id)
            .ok_or(StoreError::TokenNotFound)?;
        *slot = updated.clone();
        Ok(updated)
    }

    pub fn delete_token(&self, config_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let config = inner
            .configs
            .get_mut(&config_id)
            .ok_or(StoreError::ConfigNotFound)?;
        let before = config.access_tokens.len();
        config.access_tokens.retain(|t| t.id != token_id);
        if config.access_tokens.len() == before {
            return Err(StoreError::TokenNotFound);
        }
        Ok(())
    }

    pub fn get_tokens(&self, config_id: Uuid) -> Result<Vec<AccessToken>, StoreError> {
        let inner = self.inner.read();
        let config = inner.configs.get(&config_id).ok_or(StoreError::ConfigNotFound)?;
        Ok(config.access_tokens.iter().map(AccessToken::sanitized).collect())
    }

    pub fn get_token_by_id(&self, config_id: Uuid, token_id: Uuid) -> Result<AccessToken, StoreError> {
        let inner = self.inner.read();
        let config = inner.configs.get(&config_id).ok_or(StoreError::ConfigNotFound)?;
        config
            .access_tokens
            .iter()
            .find(|t| t.id == token_id)
            .map(AccessToken::sanitized)
            .ok_or(StoreError::TokenNotFound)
    }

    /// Valid iff a token whose `token_hash` matches exists and is active.
    /// Iterates every token with constant-time hash comparison so the
    /// overall timing does not leak which token (if any) matched.
    pub fn validate_token(&self, config_id: Uuid, plaintext: &str) -> ValidationResult {
        let inner = self.inner.read();
        let Some(config) = inner.configs.get(&config_id) else {
            return ValidationResult {
                valid: false,
                token: None,
                error_code: Some("CONFIG_NOT_FOUND"),
            };
        };

        let now = Utc::now();
        let mut found: Option<&AccessToken> = None;
        for t in &config.access_tokens {
            if verify_token(plaintext, &t.token_hash) {
                found = Some(t);
            }
        }

        match found {
            None => ValidationResult {
                valid: false,
                token: None,
                error_code: Some("TOKEN_NOT_FOUND"),
            },
            Some(t) if !t.enabled => ValidationResult {
                valid: false,
                token: Some(t.sanitized()),
                error_code: Some("TOKEN_DISABLED"),
            },
            Some(t) if t.is_expired(now) => ValidationResult {
                valid: false,
                token: Some(t.sanitized()),
                error_code: Some("TOKEN_EXPIRED"),
            },
            Some(t) => ValidationResult {
                valid: true,
                token: Some(t.sanitized()),
                error_code: None,
            },
        }
    }

    pub fn update_token_usage(&self, config_id: Uuid, plaintext: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let config = inner.configs.get_mut(&config_id).ok_or(StoreError::ConfigNotFound)?;
        let now = Utc::now();
        let token = config
            .access_tokens
            .iter_mut()
            .find(|t| verify_token(plaintext, &t.token_hash))
            .ok_or(StoreError::TokenNotFound)?;
        token.usage_count += 1;
        token.last_used = Some(now);
        Ok(())
    }

    pub fn get_token_stats(&self, config_id: Uuid) -> Result<TokenStats, StoreError> {
        let inner = self.inner.read();
        let config = inner.configs.get(&config_id).ok_or(StoreError::ConfigNotFound)?;
        Ok(access_token::calculate_token_stats(&config.access_tokens, Utc::now()))
    }
}

/// Validates subdomain/index invariants (I1, I2) over a decoded map — used
/// by the migration engine's integrity check (C5).
pub fn validate_integrity(configs: &HashMap<Uuid, ProxyConfig>) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen_subdomains: HashMap<&str, Uuid> = HashMap::new();
    for (id, c) in configs {
        if *id != c.id {
            problems.push(format!("config key {id} does not match stored id {}", c.id));
        }
        if let Some(sub) = &c.subdomain {
            if !sub.is_empty() {
                if let Some(owner) = seen_subdomains.insert(sub, *id) {
                    if owner != *id {
                        problems.push(format!("subdomain '{sub}' is claimed by multiple configs"));
                    }
                }
            }
        }
    }
    problems
}
