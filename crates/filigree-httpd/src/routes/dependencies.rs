//! Dependency graph routes (spec §4.2/C6, §6).

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiResult;
use crate::routes::issues::ActorBody;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddDependencyBody {
    pub depends_on_id: String,
    #[serde(default = "super::issues::default_actor")]
    pub actor: String,
}

pub async fn add_dependency(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddDependencyBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let store = state.store.clone();
    crate::error::run_blocking(move || store.add_dependency_impl(&id, &body.depends_on_id, &body.actor)).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn remove_dependency(
    State(state): State<AppState>,
    Path((id, depends_on_id)): Path<(String, String)>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let store = state.store.clone();
    crate::error::run_blocking(move || store.remove_dependency_impl(&id, &depends_on_id, &body.actor)).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize, Default)]
pub struct ReadyParams {
    #[serde(rename = "type")]
    pub type_filter: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_ready(State(state): State<AppState>, Query(q): Query<ReadyParams>) -> ApiResult<Json<Value>> {
    let registry = state.registry.clone();
    let store = state.store.clone();
    let issues = crate::error::run_blocking(move || store.get_ready_impl(&registry.current(), q.type_filter.as_deref(), q.limit)).await?;
    Ok(Json(serde_json::to_value(issues).unwrap()))
}

pub async fn get_blocked(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let registry = state.registry.clone();
    let store = state.store.clone();
    let blocked = crate::error::run_blocking(move || store.get_blocked_impl(&registry.current())).await?;
    Ok(Json(serde_json::to_value(blocked).unwrap()))
}

pub async fn get_critical_path(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let registry = state.registry.clone();
    let store = state.store.clone();
    let path = crate::error::run_blocking(move || store.get_critical_path_impl(&registry.current())).await?;
    Ok(Json(serde_json::to_value(path).unwrap()))
}
