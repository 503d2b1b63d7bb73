//! Admin access-token CRUD nested under a config (spec.md §6 — C9).

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::access_token::{AccessToken, CreateTokenRequest, TokenStats, UpdateTokenRequest};

use super::AppState;

/// Create response includes the plaintext token exactly once; every other
/// surface only ever returns `AccessToken::sanitized()` copies.
#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    #[serde(flatten)]
    pub token: AccessToken,
    pub plaintext: String,
}

pub async fn list(
    State(state): State<AppState>,
    Path(config_id): Path<Uuid>,
) -> Result<Json<Vec<AccessToken>>, StoreError> {
    state.store.get_tokens(config_id).map(Json)
}

pub async fn get_one(
    State(state): State<AppState>,
    Path((config_id, token_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AccessToken>, StoreError> {
    state.store.get_token_by_id(config_id, token_id).map(Json)
}

pub async fn create(
    State(state): State<AppState>,
    Path(config_id): Path<Uuid>,
    Json(req): Json<CreateTokenRequest>,
) -> Result<Json<CreateTokenResponse>, StoreError> {
    let (token, plaintext) = state.store.add_token(config_id, req)?;
    state.persistence.persist_or_log(&state.store).await;
    Ok(Json(CreateTokenResponse {
        token: token.sanitized(),
        plaintext,
    }))
}

pub async fn update(
    State(state): State<AppState>,
    Path((config_id, token_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateTokenRequest>,
) -> Result<Json<AccessToken>, StoreError> {
    let token = state.store.update_token(config_id, token_id, req)?;
    state.persistence.persist_or_log(&state.store).await;
    Ok(Json(token.sanitized()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((config_id, token_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, StoreError> {
    state.store.delete_token(config_id, token_id)?;
    state.persistence.persist_or_log(&state.store).await;
    Ok(())
}

pub async fn stats(
    State(state): State<AppState>,
    Path(config_id): Path<Uuid>,
) -> Result<Json<TokenStats>, StoreError> {
    state.store.get_token_stats(config_id).map(Json)
}
