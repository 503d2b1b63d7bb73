//! HTTP surface: admin config/token API (C9) and the authenticated
//! log-view API (C8), composed into a single `axum::Router`, the way the
//! teacher composes its proxy and control surfaces off one `Router` in
//! `proxy::server`.

mod configs;
mod logs;
mod tokens;

use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::access_log::AccessLogRecorder;
use crate::auth::LogAuthenticator;
use crate::persistence::PersistenceLayer;
use crate::store::ConfigStore;

/// Shared application state, handed to every handler via `State`. Each
/// field is independently `Arc`'d/locked internally, so cloning
/// `AppState` is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub persistence: Arc<PersistenceLayer>,
    pub logs: Arc<AccessLogRecorder>,
    pub auth: Arc<LogAuthenticator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/config/proxy", get(configs::list).post(configs::create))
        .route("/config/proxy/batch", post(configs::batch))
        .route("/config/proxy/export", post(configs::export))
        .route("/config/proxy/import", post(configs::import))
        .route(
            "/config/proxy/:id",
            get(configs::get_one).put(configs::update).delete(configs::delete),
        )
        .route(
            "/config/proxy/:id/tokens",
            get(tokens::list).post(tokens::create),
        )
        .route("/config/proxy/:id/tokens/stats", get(tokens::stats))
        .route(
            "/config/proxy/:id/tokens/:token_id",
            get(tokens::get_one).put(tokens::update).delete(tokens::delete),
        )
        .route("/logs", get(logs::view).post(logs::login))
        .route("/logs/logout", any(logs::logout))
        .route("/logs/api", get(logs::query_api))
        .route("/logs/api/stats", get(logs::stats_api))
        .route("/logs/stats", get(logs::stats_view))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
