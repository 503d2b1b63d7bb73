//! Process bootstrap: CLI parsing and logging setup (spec.md §9, C0).

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gateway-core", about = "Privacy-preserving reverse proxy gateway core")]
pub struct Settings {
    /// Address the admin/log-view HTTP surface binds to.
    #[arg(long, env = "GATEWAY_LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    pub listen_addr: std::net::SocketAddr,

    /// Path to the config snapshot file (spec.md §4.4).
    #[arg(long, env = "GATEWAY_PERSIST_PATH", default_value = "gateway-configs.json")]
    pub persist_path: PathBuf,

    /// Shared secret gating the log-view surface (spec.md §4.7).
    #[arg(long, env = "GATEWAY_ADMIN_SECRET")]
    pub admin_secret: String,

    /// Maximum number of configs the store will hold (spec.md §4.3).
    #[arg(long, env = "GATEWAY_MAX_CONFIGS", default_value_t = 10_000)]
    pub max_configs: usize,

    /// Maximum number of entries kept in the access-log ring (spec.md §4.6).
    #[arg(long, env = "GATEWAY_MAX_LOG_ENTRIES", default_value_t = crate::access_log::DEFAULT_MAX_ENTRIES)]
    pub max_log_entries: usize,

    /// Soft cap, in megabytes, on estimated access-log memory use.
    #[arg(long, env = "GATEWAY_MAX_LOG_MEMORY_MB", default_value_t = 64)]
    pub max_log_memory_mb: usize,

    /// Interval between automatic config snapshot saves.
    #[arg(long, env = "GATEWAY_AUTO_SAVE_INTERVAL", default_value = "30s", value_parser = humantime::parse_duration)]
    pub auto_save_interval: std::time::Duration,

    /// Maximum age of an access-log entry before the retention sweep drops it.
    #[arg(long, env = "GATEWAY_LOG_MAX_AGE", default_value = "24h", value_parser = humantime::parse_duration)]
    pub log_max_age: std::time::Duration,

    /// Interval between access-log retention sweeps.
    #[arg(long, env = "GATEWAY_LOG_SWEEP_INTERVAL", default_value = "5m", value_parser = humantime::parse_duration)]
    pub log_sweep_interval: std::time::Duration,
}

impl Settings {
    pub fn max_log_memory_bytes(&self) -> usize {
        self.max_log_memory_mb * 1024 * 1024
    }
}

/// Installs a `tracing` subscriber reading `RUST_LOG` (falling back to
/// `info`), matching the teacher's `tracing-subscriber` bootstrap in its
/// binary entry points.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
