//! Issue CRUD and lifecycle routes (spec §4.1/C5, §6).

use axum::extract::{Path, Query, State};
use axum::response::Json;
use filigree_core::fields::FieldMap;
use filigree_storage::{BatchOutcome, CreateIssueParams, IssueQuery, UpdateIssueParams};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActorBody {
    #[serde(default = "default_actor")]
    pub actor: String,
}

pub(crate) fn default_actor() -> String {
    "http".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueBody {
    pub title: String,
    #[serde(rename = "type")]
    pub issue_type: Option<String>,
    pub priority: Option<i32>,
    pub parent_id: Option<String>,
    pub assignee: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

pub async fn create_issue(State(state): State<AppState>, Json(body): Json<CreateIssueBody>) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let actor = body.actor.clone();
    let params = CreateIssueParams {
        title: body.title,
        issue_type: body.issue_type,
        priority: body.priority,
        parent_id: body.parent_id,
        assignee: body.assignee,
        description: body.description,
        notes: body.notes,
        fields: if body.fields.is_empty() { None } else { Some(FieldMap(body.fields)) },
        status: body.status,
    };
    let registry = state.registry.clone();
    let store = state.store.clone();
    let prefix = state.prefix.clone();
    let issue = crate::error::run_blocking(move || store.create_issue_impl(&registry.current(), &prefix, params, &actor)).await?;
    Ok(Json(serde_json::to_value(issue).unwrap()))
}

pub async fn get_issue(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let issue = crate::error::run_blocking(move || store.get_issue_impl(&id)).await?;
    Ok(Json(serde_json::to_value(issue).unwrap()))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQueryParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub issue_type: Option<String>,
    pub assignee: Option<String>,
    pub parent_id: Option<String>,
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_issues(State(state): State<AppState>, Query(q): Query<ListQueryParams>) -> ApiResult<Json<Value>> {
    let query = IssueQuery {
        status: q.status,
        issue_type: q.issue_type,
        assignee: q.assignee,
        parent_id: q.parent_id,
        text_query: q.query,
        limit: q.limit.unwrap_or(50),
        offset: q.offset.unwrap_or(0),
    };
    let store = state.store.clone();
    let issues = crate::error::run_blocking(move || store.search_issues_impl(&query)).await?;
    Ok(Json(serde_json::to_value(issues).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueBody {
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub title: Option<String>,
    pub assignee: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Option<String>>,
    pub fields: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub force: bool,
    #[serde(default = "default_actor")]
    pub actor: String,
}

pub async fn update_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateIssueBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let actor = body.actor.clone();
    let params = UpdateIssueParams {
        status: body.status,
        priority: body.priority,
        title: body.title,
        assignee: body.assignee,
        description: body.description,
        notes: body.notes,
        parent_id: body.parent_id,
        fields: body.fields.map(FieldMap),
        skip_transition_check: body.force,
    };
    let registry = state.registry.clone();
    let store = state.store.clone();
    let (issue, outcome) = crate::error::run_blocking(move || store.update_issue_impl(&registry.current(), &id, params, &actor)).await?;
    Ok(Json(json!({ "issue": issue, "warnings": outcome.warnings })))
}

#[derive(Debug, Deserialize, Default)]
pub struct CloseBody {
    pub reason: Option<String>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

pub async fn close_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CloseBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let registry = state.registry.clone();
    let store = state.store.clone();
    let (issue, unblocked) =
        crate::error::run_blocking(move || store.close_issue_impl(&registry.current(), &id, body.reason.as_deref(), &body.actor)).await?;
    Ok(Json(json!({ "issue": issue, "newly_unblocked": unblocked })))
}

pub async fn reopen_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let registry = state.registry.clone();
    let store = state.store.clone();
    let issue = crate::error::run_blocking(move || store.reopen_issue_impl(&registry.current(), &id, &body.actor)).await?;
    Ok(Json(serde_json::to_value(issue).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct ClaimBody {
    pub assignee: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

pub async fn claim_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ClaimBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let registry = state.registry.clone();
    let store = state.store.clone();
    let issue =
        crate::error::run_blocking(move || store.claim_issue_impl(&registry.current(), &id, &body.assignee, &body.actor)).await?;
    Ok(Json(serde_json::to_value(issue).unwrap()))
}

pub async fn release_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let store = state.store.clone();
    let issue = crate::error::run_blocking(move || store.release_claim_impl(&id, &body.actor)).await?;
    Ok(Json(serde_json::to_value(issue).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct ClaimNextBody {
    pub assignee: String,
    #[serde(rename = "type")]
    pub type_filter: Option<String>,
    pub priority_min: Option<i32>,
    pub priority_max: Option<i32>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

pub async fn claim_next(State(state): State<AppState>, Json(body): Json<ClaimNextBody>) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let registry = state.registry.clone();
    let store = state.store.clone();
    let outcome = crate::error::run_blocking(move || {
        store.claim_next_impl(
            &registry.current(),
            &body.assignee,
            body.type_filter.as_deref(),
            body.priority_min,
            body.priority_max,
            &body.actor,
        )
    })
    .await?;
    Ok(Json(match outcome {
        Some(o) => json!({ "issue": o.issue, "reason": o.reason }),
        None => json!(null),
    }))
}

#[derive(Debug, Deserialize)]
pub struct BatchIdsBody {
    pub ids: Vec<String>,
    pub reason: Option<String>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

pub async fn batch_close(State(state): State<AppState>, Json(body): Json<BatchIdsBody>) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let registry = state.registry.clone();
    let store = state.store.clone();
    let outcome: BatchOutcome =
        crate::error::run_blocking(move || store.batch_close_impl(&registry.current(), &body.ids, body.reason.as_deref(), &body.actor))
            .await?;
    Ok(Json(outcome_to_json(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct BatchUpdateBody {
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub update: UpdateIssueBody,
}

pub async fn batch_update(State(state): State<AppState>, Json(body): Json<BatchUpdateBody>) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.update.actor)?;
    let registry = state.registry.clone();
    let store = state.store.clone();
    let actor = body.update.actor.clone();
    let params = UpdateIssueParams {
        status: body.update.status,
        priority: body.update.priority,
        title: body.update.title,
        assignee: body.update.assignee,
        description: body.update.description,
        notes: body.update.notes,
        parent_id: body.update.parent_id,
        fields: body.update.fields.map(FieldMap),
        skip_transition_check: body.update.force,
    };
    let outcome: BatchOutcome = crate::error::run_blocking(move || {
        store.batch_update_impl(&registry.current(), &body.ids, || params.clone(), &actor)
    })
    .await?;
    Ok(Json(outcome_to_json(outcome)))
}

fn outcome_to_json(outcome: BatchOutcome) -> Value {
    json!({
        "succeeded": outcome.succeeded,
        "failed": outcome.failed.iter().map(|f| json!({
            "id": f.id,
            "error": f.error,
            "code": f.code,
            "valid_transitions": f.valid_transitions,
        })).collect::<Vec<_>>(),
    })
}

pub async fn undo_last(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let store = state.store.clone();
    let outcome = crate::error::run_blocking(move || store.undo_last_impl(&id, &body.actor)).await?;
    Ok(Json(match outcome {
        filigree_storage::UndoOutcome::Undone { event_type, event_id } => {
            json!({ "undone": true, "event_type": event_type, "event_id": event_id })
        }
        filigree_storage::UndoOutcome::NotUndone { reason } => {
            json!({ "undone": false, "reason": reason })
        }
    }))
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub text: String,
    pub author: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CommentBody>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let comment = crate::error::run_blocking(move || store.add_comment_impl(&id, &body.author, &body.text)).await?;
    Ok(Json(serde_json::to_value(comment).unwrap()))
}

pub async fn get_comments(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let comments = crate::error::run_blocking(move || store.get_comments_impl(&id)).await?;
    Ok(Json(serde_json::to_value(comments).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct LabelBody {
    pub label: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

pub async fn add_label(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LabelBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let store = state.store.clone();
    crate::error::run_blocking(move || store.add_label_impl(&id, &body.label, &body.actor)).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn remove_label(
    State(state): State<AppState>,
    Path((id, label)): Path<(String, String)>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Value>> {
    crate::error::check_actor(&body.actor)?;
    let store = state.store.clone();
    crate::error::run_blocking(move || store.remove_label_impl(&id, &label, &body.actor)).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn get_labels(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let labels = crate::error::run_blocking(move || store.get_labels_impl(&id)).await?;
    Ok(Json(serde_json::to_value(labels).unwrap()))
}
