//! File, finding, and association routes (spec §4.6/C8, §6).

use axum::extract::{Path, Query, State};
use axum::response::Json;
use filigree_core::files::AssocType;
use filigree_storage::{FileListQuery, IncomingFinding, RegisterFileParams};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterFileBody {
    pub path: String,
    pub language: Option<String>,
    pub file_type: Option<String>,
    pub metadata: Option<serde_json::Map<String, Value>>,
}

pub async fn register_file(State(state): State<AppState>, Json(body): Json<RegisterFileBody>) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let prefix = state.prefix.clone();
    let params = RegisterFileParams {
        path: body.path,
        language: body.language,
        file_type: body.file_type,
        metadata: body.metadata,
    };
    let file = crate::error::run_blocking(move || store.register_file_impl(&prefix, params)).await?;
    Ok(Json(serde_json::to_value(file).unwrap()))
}

pub async fn get_file(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let file = crate::error::run_blocking(move || store.get_file_impl(&id)).await?;
    Ok(Json(serde_json::to_value(file).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct ScanResultsBody {
    pub scan_source: String,
    pub scan_run_id: Option<String>,
    pub findings: Vec<IncomingFinding>,
}

pub async fn process_scan_results(
    State(state): State<AppState>,
    Json(body): Json<ScanResultsBody>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let prefix = state.prefix.clone();
    let findings = crate::error::run_blocking(move || {
        store.process_scan_results_impl(&prefix, &body.scan_source, body.scan_run_id.as_deref(), &body.findings)
    })
    .await?;
    Ok(Json(serde_json::to_value(findings).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct CleanStaleBody {
    pub scan_source: String,
    pub scan_run_id: String,
}

pub async fn clean_stale_findings(
    State(state): State<AppState>,
    Json(body): Json<CleanStaleBody>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let cleaned = crate::error::run_blocking(move || store.clean_stale_findings_impl(&body.scan_source, &body.scan_run_id)).await?;
    Ok(Json(serde_json::to_value(cleaned).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct AddAssociationBody {
    pub issue_id: String,
    pub assoc_type: AssocType,
}

pub async fn add_file_association(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Json(body): Json<AddAssociationBody>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let assoc = crate::error::run_blocking(move || store.add_file_association_impl(&file_id, &body.issue_id, body.assoc_type)).await?;
    Ok(Json(serde_json::to_value(assoc).unwrap()))
}

#[derive(Debug, Deserialize, Default)]
pub struct FileListParams {
    pub language: Option<String>,
    pub path_prefix: Option<String>,
    pub min_findings: Option<i64>,
    pub has_severity: Option<String>,
    pub scan_source: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_files(State(state): State<AppState>, Query(q): Query<FileListParams>) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let has_severity = q
        .has_severity
        .as_deref()
        .map(|s| s.parse().map_err(|_| filigree_core::error::FiligreeError::validation(format!("unknown severity: {s}"))))
        .transpose()?;
    let query = FileListQuery {
        language: q.language,
        path_prefix: q.path_prefix,
        min_findings: q.min_findings,
        has_severity,
        scan_source: q.scan_source,
        limit: q.limit.unwrap_or(50),
        offset: q.offset.unwrap_or(0),
    };
    let paginated = crate::error::run_blocking(move || store.list_files_paginated_impl(&query)).await?;
    Ok(Json(serde_json::to_value(paginated).unwrap()))
}

#[derive(Debug, Deserialize, Default)]
pub struct TimelineParams {
    pub event_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn get_file_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<TimelineParams>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let timeline = crate::error::run_blocking(move || {
        store.get_file_timeline_impl(&id, q.event_type.as_deref(), q.limit.unwrap_or(50), q.offset.unwrap_or(0))
    })
    .await?;
    Ok(Json(serde_json::to_value(timeline).unwrap()))
}

#[derive(Debug, Deserialize, Default)]
pub struct HotspotsParams {
    pub limit: Option<i64>,
}

pub async fn get_file_hotspots(
    State(state): State<AppState>,
    Query(q): Query<HotspotsParams>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let hotspots = crate::error::run_blocking(move || store.get_file_hotspots_impl(q.limit.unwrap_or(20))).await?;
    Ok(Json(serde_json::to_value(hotspots).unwrap()))
}
