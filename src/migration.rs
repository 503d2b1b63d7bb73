//! Snapshot version detection and migration (spec.md §4.4/§9 — C5).
//!
//! Detection is structural rather than a version field lookup: a decoded
//! config object that already carries `access_tokens` is current; one that
//! doesn't is legacy and gets the field initialized empty. This mirrors the
//! teacher's tolerance for schema drift in `compute_api`-adjacent manifests,
//! where absence of a field is itself the version signal.

use std::path::Path;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::error::MigrationError;
use crate::models::config::ProxyConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("config integrity check failed: {0}")]
    Integrity(String),
}

/// `true` if any config in this snapshot predates the access-token
/// subsystem. Used by the persistence layer to decide whether to take a
/// backup copy before migrating in place.
pub fn contains_legacy_entries(bytes: &[u8]) -> bool {
    let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(bytes) else {
        return false;
    };
    obj.values().any(is_legacy)
}

/// Decodes raw snapshot bytes — a top-level object keyed by config id, each
/// value a ProxyConfig (spec.md §6) — migrating legacy entries in place, and
/// validates the result before handing it back to the persistence layer.
pub fn load_and_migrate(bytes: &[u8]) -> Result<Vec<ProxyConfig>, LoadError> {
    let value: Value = serde_json::from_slice(bytes).map_err(MigrationError::Decode)?;

    let obj = match value {
        Value::Object(obj) => obj,
        _ => serde_json::Map::new(),
    };

    let mut configs = Vec::with_capacity(obj.len());
    for (_, mut raw) in obj {
        migrate_one(&mut raw);
        let config: ProxyConfig = serde_json::from_value(raw).map_err(MigrationError::Decode)?;
        configs.push(config);
    }

    let problems = crate::store::validate_integrity(&configs.iter().map(|c| (c.id, c.clone())).collect());
    if !problems.is_empty() {
        return Err(LoadError::Integrity(problems.join("; ")));
    }

    Ok(configs)
}

/// `true` if this config object predates the access-token subsystem.
fn is_legacy(raw: &Value) -> bool {
    match raw {
        Value::Object(obj) => !obj.contains_key("access_tokens"),
        _ => false,
    }
}

fn migrate_one(raw: &mut Value) {
    if !is_legacy(raw) {
        return;
    }
    if let Value::Object(obj) = raw {
        obj.entry("access_tokens").or_insert_with(|| Value::Array(Vec::new()));
        obj.entry("stats").or_insert_with(|| {
            serde_json::json!({
                "request_count": 0,
                "error_count": 0,
                "avg_response_time_ms": 0.0,
                "last_accessed": null,
                "total_bytes": 0,
            })
        });
    }
}

/// Writes a timestamped copy of the raw snapshot bytes alongside `path`
/// before an in-place migration, so an operator can recover the
/// pre-migration file if the migrated one turns out to be wrong.
pub async fn backup_before_migration(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let mut backup_name = path.as_os_str().to_owned();
    backup_name.push(format!(".{stamp}.bak"));
    tokio::fs::write(backup_name, bytes).await
}
