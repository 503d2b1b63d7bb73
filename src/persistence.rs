//! Durable snapshot persistence for the config store (spec.md §4.4 — C4).
//!
//! Load is synchronous and happens once, at startup, before the store is
//! handed to any request handler. Persist is write-through: every mutating
//! store call is followed by a save attempt, serialized behind a dedicated
//! async mutex so concurrent mutations never interleave two writers on the
//! same file. A background ticker also saves periodically, the way the
//! teacher's `proxy::server` drives its own periodic upkeep tasks off a
//! `tokio::time::interval` guarded by a `CancellationToken`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::PersistError;
use crate::migration;
use crate::models::config::ProxyConfig;
use crate::store::ConfigStore;

const DEFAULT_AUTO_SAVE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

pub struct PersistenceLayer {
    path: PathBuf,
    write_lock: AsyncMutex<()>,
}

impl PersistenceLayer {
    /// Loads the store from `path`. A missing file yields an empty store
    /// (first run); a malformed file is fatal, per spec.md §4.4/§7 — an
    /// operator should notice and fix the snapshot rather than silently
    /// losing every config.
    pub async fn load(path: impl AsRef<Path>, max_entries: usize) -> Result<(Self, ConfigStore), PersistError> {
        let path = path.as_ref().to_path_buf();
        let layer = Self {
            path: path.clone(),
            write_lock: AsyncMutex::new(()),
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no existing snapshot, starting empty");
                return Ok((layer, ConfigStore::new(max_entries)));
            }
            Err(e) => return Err(PersistError::Io(e)),
        };

        if migration::contains_legacy_entries(&bytes) {
            if let Err(e) = migration::backup_before_migration(&path, &bytes).await {
                warn!(error = %e, "failed to write pre-migration backup, continuing anyway");
            }
        }

        let configs = migration::load_and_migrate(&bytes).map_err(|e| {
            error!(error = %e, "fatal: snapshot failed to decode/migrate");
            PersistError::Decode(serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e.to_string(),
            )))
        })?;

        let map: HashMap<Uuid, ProxyConfig> = configs.into_iter().map(|c| (c.id, c)).collect();
        info!(count = map.len(), path = %path.display(), "loaded config snapshot");
        Ok((layer, ConfigStore::load_from(map, max_entries)))
    }

    /// Serializes the current store state — a top-level object keyed by
    /// config id (spec.md §6) — and atomically replaces the snapshot file:
    /// write to `<path>.tmp`, then rename over `<path>`, so a crash mid-write
    /// never leaves a half-written snapshot in place.
    pub async fn persist(&self, store: &ConfigStore) -> Result<(), PersistError> {
        let _guard = self.write_lock.lock().await;
        let configs: HashMap<Uuid, ProxyConfig> = store.snapshot();
        let encoded = serde_json::to_vec_pretty(&configs).map_err(PersistError::Decode)?;

        let tmp_path = tmp_path_for(&self.path);
        tokio::fs::write(&tmp_path, &encoded).await.map_err(PersistError::Io)?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(PersistError::Io)?;
        Ok(())
    }

    /// Fire-and-log persist for use after a mutating store call: persistence
    /// failures are reported but never bubble up and fail the request that
    /// triggered them (spec.md §4.4).
    pub async fn persist_or_log(&self, store: &ConfigStore) {
        if let Err(e) = self.persist(store).await {
            error!(error = %e, "failed to persist config snapshot");
        }
    }

    /// Runs a periodic auto-save loop until `shutdown` is cancelled, then
    /// does one final persist before returning.
    pub async fn run_auto_save(
        self: Arc<Self>,
        store: Arc<ConfigStore>,
        interval: Option<std::time::Duration>,
        shutdown: CancellationToken,
    ) {
        let interval = interval.unwrap_or(DEFAULT_AUTO_SAVE_INTERVAL);
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it.

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.persist_or_log(&store).await;
                }
                _ = shutdown.cancelled() => {
                    warn!("auto-save loop shutting down, persisting final snapshot");
                    self.persist_or_log(&store).await;
                    return;
                }
            }
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
