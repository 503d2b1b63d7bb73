//! Admin config CRUD, batch ops, and import/export (spec.md §6 — C9).

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::config::{CreateConfigRequest, ProxyConfig, UpdateConfigRequest};
use crate::store::{BatchOp, ConfigListFilter, IdMode, ImportMode};

use super::AppState;

pub async fn list(State(state): State<AppState>, Query(filter): Query<ConfigListFilter>) -> impl IntoResponse {
    Json(state.store.list(&filter))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProxyConfig>, StoreError> {
    state.store.get_by_id(id).map(Json)
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateConfigRequest>,
) -> Result<Json<ProxyConfig>, StoreError> {
    let config = state.store.add(req)?;
    state.persistence.persist_or_log(&state.store).await;
    Ok(Json(config))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateConfigRequest>,
) -> Result<Json<ProxyConfig>, StoreError> {
    let config = state.store.update(id, req)?;
    state.persistence.persist_or_log(&state.store).await;
    Ok(Json(config))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<(), StoreError> {
    state.store.delete(id)?;
    state.persistence.persist_or_log(&state.store).await;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub operation: BatchOp,
    pub ids: Vec<Uuid>,
}

pub async fn batch(State(state): State<AppState>, Json(req): Json<BatchRequest>) -> impl IntoResponse {
    let result = state.store.batch_operation(req.operation, &req.ids);
    state.persistence.persist_or_log(&state.store).await;
    Json(result)
}

pub async fn export(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.export_all())
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub configs: Vec<ProxyConfig>,
    #[serde(default)]
    pub mode: ImportModeDto,
    #[serde(default)]
    pub id_mode: IdModeDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportModeDto {
    #[default]
    Skip,
    Replace,
    Error,
}

impl From<ImportModeDto> for ImportMode {
    fn from(v: ImportModeDto) -> Self {
        match v {
            ImportModeDto::Skip => ImportMode::Skip,
            ImportModeDto::Replace => ImportMode::Replace,
            ImportModeDto::Error => ImportMode::Error,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdModeDto {
    Preserve,
    #[default]
    Regenerate,
}

impl From<IdModeDto> for IdMode {
    fn from(v: IdModeDto) -> Self {
        match v {
            IdModeDto::Preserve => IdMode::Preserve,
            IdModeDto::Regenerate => IdMode::Regenerate,
        }
    }
}

pub async fn import(State(state): State<AppState>, Json(req): Json<ImportRequest>) -> impl IntoResponse {
    let result = state
        .store
        .import_configs(req.configs, req.mode.into(), req.id_mode.into());
    state.persistence.persist_or_log(&state.store).await;
    Json(result)
}
