//! AccessLogEntry data model (spec.md §3 — consumed by the recorder, C6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
    WebSocket,
    WebSocketSecure,
    #[serde(rename = "SSE")]
    Sse,
}

/// One recorded upstream exchange. Created by `Record`, immutable once
/// stored, never persisted across restarts (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    #[serde(default = "Uuid::nil")]
    pub id: Uuid,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub method: String,
    pub request_type: RequestType,
    pub target_host: String,
    pub target_path: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub client_ip: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub response_size: u64,
    #[serde(default)]
    pub response_content_type: Option<String>,
    #[serde(default)]
    pub proxy_info: Option<String>,
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    #[serde(default)]
    pub response_headers: HashMap<String, String>,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default)]
    pub response_body: Option<String>,
}

impl AccessLogEntry {
    pub fn status_group(&self) -> u16 {
        self.status_code / 100
    }
}
