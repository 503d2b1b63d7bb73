//! Crate-wide error taxonomy (spec.md §7).
//!
//! Every fallible operation in this crate returns one of the enums below.
//! Each implements [`ReportableError`] for internal classification/logging
//! and [`axum::response::IntoResponse`] for the HTTP surface, mirroring the
//! `ApiError`/`get_reason`/`UserFacingError` split the teacher uses in
//! `control_plane::provider::errors`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Coarse classification used for logging/metrics, independent of the HTTP
/// status a given error happens to map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Capacity,
    Validation,
    Auth,
    Internal,
}

pub trait ReportableError: std::error::Error {
    fn kind(&self) -> ErrorKind;
}

/// Errors raised by the config/token store (C3).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config not found")]
    ConfigNotFound,
    #[error("token not found")]
    TokenNotFound,
    #[error("subdomain already in use")]
    DuplicateSubdomain,
    #[error("store is at capacity")]
    CapacityExceeded,
    #[error("config already has the maximum number of tokens")]
    MaxTokensExceeded,
    #[error("unsupported batch operation")]
    UnsupportedOperation,
    #[error("validation failed: {0}")]
    Validation(String),
}

impl ReportableError for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ConfigNotFound | StoreError::TokenNotFound => ErrorKind::NotFound,
            StoreError::DuplicateSubdomain | StoreError::MaxTokensExceeded => ErrorKind::Conflict,
            StoreError::CapacityExceeded => ErrorKind::Capacity,
            StoreError::UnsupportedOperation | StoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Capacity => StatusCode::INSUFFICIENT_STORAGE,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Errors raised by the access-log recorder's query surface (C6).
#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("log entry not found")]
    NotFound,
}

impl ReportableError for LogError {
    fn kind(&self) -> ErrorKind {
        match self {
            LogError::InvalidFilter(_) => ErrorKind::Validation,
            LogError::NotFound => ErrorKind::NotFound,
        }
    }
}

impl IntoResponse for LogError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Errors raised by the log-view authenticator (C7).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("admin secret must be between 8 and 256 characters")]
    InvalidSecret,
    #[error("authentication required")]
    AuthRequired,
    #[error("authentication failed")]
    AuthFailed,
}

impl ReportableError for AuthError {
    fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidSecret => ErrorKind::Validation,
            AuthError::AuthRequired | AuthError::AuthFailed => ErrorKind::Auth,
        }
    }
}

/// Errors raised while persisting or loading the config snapshot (C4).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to read snapshot: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ReportableError for PersistError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Errors raised by the migration engine (C5). Fatal at load time.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to decode legacy snapshot: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to re-encode migrated snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ReportableError for MigrationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}
