//! Authenticated log-view surface: HTML pages and their JSON counterparts
//! (spec.md §4.7/§6 — components C7/C8).

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::access_log::{self, LogQueryFilter, LogStats};
use crate::auth::{LogAuthenticator, COOKIE_NAME};
use crate::error::{AuthError, LogError};

use super::AppState;

const AUTO_RELOAD_SECONDS: u64 = 30;

/// Wraps `AuthError` so a failed authentication also carries the
/// `X-Clear-Auth-Storage` response header, telling the browser to drop
/// any cached credential rather than keep retrying a stale one.
struct AuthRejection(AuthError);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AuthError::AuthRequired => StatusCode::UNAUTHORIZED,
            AuthError::AuthFailed => StatusCode::UNAUTHORIZED,
            AuthError::InvalidSecret => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut response = (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response();
        response
            .headers_mut()
            .insert(crate::auth::CLEAR_AUTH_HEADER, "true".parse().unwrap());
        response
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQueryParams {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub secret: Option<String>,
}

impl LogsQueryParams {
    /// Parses the raw wire-format query params (spec.md §4.8: `domain`,
    /// `status` as comma-separated codes and/or group tokens, `from`/`to` as
    /// RFC3339 or bare dates, `sort_by`/`sort_order`) into a validated filter.
    fn filter(&self) -> Result<LogQueryFilter, LogError> {
        let statuses = match &self.status {
            Some(raw) => access_log::parse_status_filter(raw)?,
            None => Vec::new(),
        };
        let from = self.from.as_deref().map(access_log::parse_flexible_datetime).transpose()?;
        let to = self.to.as_deref().map(access_log::parse_flexible_datetime).transpose()?;
        let sort_by = match &self.sort_by {
            Some(raw) => access_log::SortBy::parse(raw)?,
            None => Default::default(),
        };
        let sort_order = match &self.sort_order {
            Some(raw) => access_log::SortOrder::parse(raw)?,
            None => Default::default(),
        };

        Ok(LogQueryFilter {
            domain: self.domain.clone(),
            statuses,
            from,
            to,
            search: self.search.clone(),
            sort_by,
            sort_order,
            page: self.page,
            limit: self.limit,
        })
    }
}

fn require_auth(auth: &LogAuthenticator, headers: &HeaderMap, query_secret: Option<&str>) -> Result<(), AuthRejection> {
    auth.authenticate(headers, None, query_secret).map_err(AuthRejection)
}

pub async fn query_api(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LogsQueryParams>,
) -> Result<Response, Response> {
    require_auth(&state.auth, &headers, params.secret.as_deref()).map_err(IntoResponse::into_response)?;

    if let Some(id) = params.id {
        return match state.logs.get_by_id(id) {
            Some(entry) => Ok(Json(entry).into_response()),
            None => Err(LogError::NotFound.into_response()),
        };
    }

    let filter = params.filter().map_err(IntoResponse::into_response)?;
    state
        .logs
        .query(&filter)
        .map(|page| Json(page).into_response())
        .map_err(IntoResponse::into_response)
}

pub async fn stats_api(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SecretOnly>,
) -> Result<Json<LogStats>, Response> {
    require_auth(&state.auth, &headers, params.secret.as_deref()).map_err(IntoResponse::into_response)?;
    Ok(Json(state.logs.stats()))
}

#[derive(Debug, Deserialize)]
pub struct SecretOnly {
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SecretOnly>,
) -> Response {
    if require_auth(&state.auth, &headers, params.secret.as_deref()).is_err() {
        return unauthenticated_page();
    }
    Html(logs_page()).into_response()
}

pub async fn stats_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SecretOnly>,
) -> Response {
    if require_auth(&state.auth, &headers, params.secret.as_deref()).is_err() {
        return unauthenticated_page();
    }
    let stats = state.logs.stats();
    Html(stats_page(&stats)).into_response()
}

/// A 401 response for a browser request carrying no/bad credentials: it
/// clears the server-set cookie, sets `X-Clear-Auth-Storage` and embeds a
/// script that clears anything the client cached locally, so a stale
/// credential can never make the client retry-loop against `/logs`
/// (spec.md §9 "Anti-loop auth flow").
fn unauthenticated_page() -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, Html(login_page(None))).into_response();
    let cleared = format!("{COOKIE_NAME}=; Path=/; HttpOnly; Max-Age=-1");
    response
        .headers_mut()
        .insert(header::SET_COOKIE, cleared.parse().unwrap());
    response
        .headers_mut()
        .insert(crate::auth::CLEAR_AUTH_HEADER, "true".parse().unwrap());
    response
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub secret: String,
}

pub async fn login(State(state): State<AppState>, axum::Form(form): axum::Form<LoginForm>) -> Response {
    match state.auth.login(&form.secret) {
        Ok(cookie_value) => {
            let mut response = Html(logs_page()).into_response();
            let cookie = format!("{COOKIE_NAME}={cookie_value}; Path=/; HttpOnly; SameSite=Strict");
            response
                .headers_mut()
                .insert(header::SET_COOKIE, cookie.parse().unwrap());
            response
        }
        Err(_) => Html(login_page(Some("incorrect secret"))).into_response(),
    }
}

pub async fn logout() -> Response {
    let mut response = Html(login_page(None)).into_response();
    let cleared = format!("{COOKIE_NAME}=; Path=/; HttpOnly; Max-Age=0");
    response
        .headers_mut()
        .insert(header::SET_COOKIE, cleared.parse().unwrap());
    response
        .headers_mut()
        .insert(crate::auth::CLEAR_AUTH_HEADER, "true".parse().unwrap());
    response
}

fn login_page(error: Option<&str>) -> String {
    let error_html = error
        .map(|e| format!("<p class=\"error\">{e}</p>"))
        .unwrap_or_default();
    format!(
        "<!doctype html><html><head><title>Access Logs</title>\
         <script>localStorage.removeItem('gateway_log_secret');</script></head><body>\
         <h1>Access Logs</h1>{error_html}\
         <form method=\"post\" action=\"/logs\">\
         <input type=\"password\" name=\"secret\" placeholder=\"secret\" autofocus>\
         <button type=\"submit\">Enter</button></form></body></html>"
    )
}

fn logs_page() -> String {
    format!(
        "<!doctype html><html><head><title>Access Logs</title>\
         <meta http-equiv=\"refresh\" content=\"{AUTO_RELOAD_SECONDS}\"></head><body>\
         <h1>Access Logs</h1>\
         <form method=\"post\" action=\"/logs/logout\"><button type=\"submit\">Log out</button></form>\
         <div id=\"logs\" data-source=\"/logs/api\"></div>\
         </body></html>"
    )
}

fn stats_page(stats: &LogStats) -> String {
    format!(
        "<!doctype html><html><head><title>Log Stats</title>\
         <meta http-equiv=\"refresh\" content=\"{AUTO_RELOAD_SECONDS}\"></head><body>\
         <h1>Log Stats</h1><ul>\
         <li>total: {}</li><li>2xx: {}</li><li>3xx: {}</li><li>4xx: {}</li><li>5xx: {}</li>\
         <li>avg duration ms: {:.2}</li><li>cleanups: {}</li></ul></body></html>",
        stats.total_entries,
        stats.status_2xx,
        stats.status_3xx,
        stats.status_4xx,
        stats.status_5xx,
        stats.avg_duration_ms,
        stats.cleanup_count,
    )
}
