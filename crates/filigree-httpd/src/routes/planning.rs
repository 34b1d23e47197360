//! Milestone/phase/step planning routes (spec §4.5/C7, §6).

use axum::extract::{Path, State};
use axum::response::Json;
use filigree_core::plan::PlanPayload;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct CreatePlanBody {
    #[serde(flatten)]
    pub payload: PlanPayload,
    #[serde(default = "super::issues::default_actor")]
    pub actor: String,
}

pub async fn create_plan(State(state): State<AppState>, Json(body): Json<CreatePlanBody>) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let registry = state.registry.clone();
    let store = state.store.clone();
    let prefix = state.prefix.clone();
    let view =
        crate::error::run_blocking(move || store.create_plan_impl(&registry.current(), &prefix, &body.payload, &body.actor)).await?;
    Ok(Json(serde_json::to_value(view).unwrap()))
}

pub async fn get_plan(State(state): State<AppState>, Path(milestone_id): Path<String>) -> ApiResult<Json<Value>> {
    let registry = state.registry.clone();
    let store = state.store.clone();
    let view = crate::error::run_blocking(move || store.get_plan_impl(&registry.current(), &milestone_id)).await?;
    Ok(Json(serde_json::to_value(view).unwrap()))
}
