//! Privacy-preserving reverse proxy gateway core: config store, access
//! tokens, and an in-memory access-log recorder behind an authenticated
//! admin HTTP surface.

pub mod access_log;
pub mod auth;
pub mod error;
pub mod http;
pub mod migration;
pub mod models;
pub mod persistence;
pub mod settings;
pub mod store;
pub mod token;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use access_log::AccessLogRecorder;
use auth::LogAuthenticator;
use error::PersistError;
use http::AppState;
use persistence::PersistenceLayer;
use settings::Settings;
use store::ConfigStore;

/// Wires up the store, persistence layer, log recorder and authenticator
/// from [`Settings`], and returns the composed [`AppState`] plus the
/// background tasks that should be spawned alongside the HTTP server.
pub struct Gateway {
    pub state: AppState,
    pub shutdown: CancellationToken,
}

impl Gateway {
    pub async fn bootstrap(settings: &Settings) -> Result<Self, PersistError> {
        let (persistence, store) =
            PersistenceLayer::load(&settings.persist_path, settings.max_configs).await?;

        let auth = LogAuthenticator::new(settings.admin_secret.clone())
            .map_err(|_| PersistError::Decode(serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "admin secret must be between 8 and 256 characters",
            ))))?;

        let logs = AccessLogRecorder::new(settings.max_log_entries, settings.max_log_memory_bytes());

        let state = AppState {
            store: Arc::new(store),
            persistence: Arc::new(persistence),
            logs: Arc::new(logs),
            auth: Arc::new(auth),
        };

        Ok(Self {
            state,
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawns the background auto-save and log-retention loops. Returns
    /// their join handles so the caller can await them during shutdown.
    pub fn spawn_background_tasks(&self, settings: &Settings) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let persistence = self.state.persistence.clone();
        let store = self.state.store.clone();
        let auto_save_interval = settings.auto_save_interval;
        let shutdown = self.shutdown.clone();
        handles.push(tokio::spawn(async move {
            persistence
                .run_auto_save(store, Some(auto_save_interval), shutdown)
                .await;
        }));

        let logs = self.state.logs.clone();
        let log_max_age = settings.log_max_age;
        let log_sweep_interval = settings.log_sweep_interval;
        let shutdown = self.shutdown.clone();
        handles.push(tokio::spawn(async move {
            logs.run_retention_sweep(log_max_age, log_sweep_interval, shutdown).await;
        }));

        handles
    }
}
