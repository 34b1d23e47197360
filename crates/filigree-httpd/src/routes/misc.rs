//! Template introspection (C3), event log (C4), flow analytics (C10), and
//! config (spec §6) routes -- everything that doesn't belong to the issue,
//! dependency, planning, or file surfaces.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use filigree_core::error::FiligreeError;
use filigree_core::issue::IssueBuilder;
use filigree_templates::transition::get_valid_transitions;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_types(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.registry.current();
    Json(json!(snapshot.known_types()))
}

pub async fn type_info(State(state): State<AppState>, Path(type_name): Path<String>) -> ApiResult<Json<Value>> {
    let snapshot = state.registry.current();
    let template = snapshot
        .get_template(&type_name)
        .ok_or_else(|| FiligreeError::not_found("template", &type_name))?;
    Ok(Json(serde_json::to_value(template).unwrap()))
}

fn probe_issue(type_name: &str, state: &str) -> filigree_core::issue::Issue {
    IssueBuilder::new("(probe)").issue_type(type_name).status(state).build()
}

#[derive(Debug, Deserialize)]
pub struct StateQuery {
    pub state: String,
}

pub async fn valid_transitions(
    State(app): State<AppState>,
    Path(type_name): Path<String>,
    Query(q): Query<StateQuery>,
) -> ApiResult<Json<Value>> {
    let snapshot = app.registry.current();
    let template = snapshot
        .get_template(&type_name)
        .ok_or_else(|| FiligreeError::not_found("template", &type_name))?;
    let issue = probe_issue(&type_name, &q.state);
    let transitions = get_valid_transitions(template, &issue);
    Ok(Json(json!(
        transitions
            .iter()
            .map(|t| json!({
                "to": t.to,
                "category": t.category.as_str(),
                "enforcement": format!("{:?}", t.enforcement).to_lowercase(),
                "requires_fields": t.requires_fields,
                "missing_fields": t.missing_fields,
                "ready": t.ready,
            }))
            .collect::<Vec<_>>()
    )))
}

pub async fn explain_state(
    State(app): State<AppState>,
    Path(type_name): Path<String>,
    Query(q): Query<StateQuery>,
) -> ApiResult<Json<Value>> {
    let snapshot = app.registry.current();
    let template = snapshot
        .get_template(&type_name)
        .ok_or_else(|| FiligreeError::not_found("template", &type_name))?;
    let category = template.category_of(&q.state);
    let issue = probe_issue(&type_name, &q.state);
    let outbound = get_valid_transitions(template, &issue);
    let required_here: Vec<&str> = template
        .field_schema
        .iter()
        .filter(|f| f.required_at.as_deref() == Some(q.state.as_str()))
        .map(|f| f.name.as_str())
        .collect();
    Ok(Json(json!({
        "type": type_name,
        "state": q.state,
        "category": category.as_str(),
        "required_fields": required_here,
        "reachable_states": outbound.iter().map(|t| t.to.clone()).collect::<Vec<_>>(),
    })))
}

pub async fn workflow_guide(State(app): State<AppState>, Path(type_name): Path<String>) -> ApiResult<Json<Value>> {
    let snapshot = app.registry.current();
    let template = snapshot
        .get_template(&type_name)
        .ok_or_else(|| FiligreeError::not_found("template", &type_name))?;

    let mut guide = String::new();
    guide.push_str(&format!("# {}\n\n{}\n\n", template.display_name, template.description));
    guide.push_str(&format!("Initial state: `{}`\n\n", template.initial_state));
    guide.push_str("## States\n\n");
    for s in &template.states {
        guide.push_str(&format!("- `{}` ({})\n", s.name, s.category.as_str()));
    }
    guide.push_str("\n## Transitions\n\n");
    for t in &template.transitions {
        let enforcement = if t.enforcement == filigree_core::template::Enforcement::Hard {
            "hard"
        } else {
            "soft"
        };
        guide.push_str(&format!("- `{}` → `{}` ({enforcement}", t.from_state, t.to_state));
        if !t.requires_fields.is_empty() {
            guide.push_str(&format!(", requires {:?}", t.requires_fields));
        }
        guide.push_str(")\n");
    }
    Ok(Json(json!({ "type": type_name, "guide": guide })))
}

pub async fn workflow_states(State(app): State<AppState>, Path(type_name): Path<String>) -> ApiResult<Json<Value>> {
    let snapshot = app.registry.current();
    let template = snapshot
        .get_template(&type_name)
        .ok_or_else(|| FiligreeError::not_found("template", &type_name))?;
    Ok(Json(serde_json::to_value(&template.states).unwrap()))
}

#[derive(Debug, Deserialize, Default)]
pub struct EventsParams {
    pub limit: Option<i64>,
}

pub async fn get_issue_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<EventsParams>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let events = crate::error::run_blocking(move || store.get_issue_events_impl(&id, q.limit.unwrap_or(100))).await?;
    Ok(Json(serde_json::to_value(events).unwrap()))
}

#[derive(Debug, Deserialize, Default)]
pub struct EventsSinceParams {
    pub since_id: i64,
    pub limit: Option<i64>,
}

pub async fn get_events_since(
    State(state): State<AppState>,
    Query(q): Query<EventsSinceParams>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let events = crate::error::run_blocking(move || store.get_events_since_impl(q.since_id, q.limit.unwrap_or(100))).await?;
    Ok(Json(serde_json::to_value(events).unwrap()))
}

pub async fn get_recent_events(
    State(state): State<AppState>,
    Query(q): Query<EventsParams>,
) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let events = crate::error::run_blocking(move || store.get_recent_events_impl(q.limit.unwrap_or(50))).await?;
    Ok(Json(serde_json::to_value(events).unwrap()))
}

#[derive(Debug, Deserialize, Default)]
pub struct AnalyticsParams {
    pub window_days: Option<i64>,
}

pub async fn flow_metrics(
    State(state): State<AppState>,
    Query(q): Query<AnalyticsParams>,
) -> ApiResult<Json<Value>> {
    let registry = state.registry.clone();
    let store = state.store.clone();
    let metrics = crate::error::run_blocking(move || store.compute_flow_metrics_impl(&registry.current(), q.window_days.unwrap_or(30))).await?;
    Ok(Json(serde_json::to_value(metrics).unwrap()))
}

pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    let config = crate::error::run_blocking(move || store.get_all_config_impl()).await?;
    Ok(Json(serde_json::to_value(config).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct SetConfigBody {
    pub key: String,
    pub value: String,
}

pub async fn set_config(State(state): State<AppState>, Json(body): Json<SetConfigBody>) -> ApiResult<Json<Value>> {
    let store = state.store.clone();
    crate::error::run_blocking(move || store.set_config_impl(&body.key, &body.value)).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn render_summary(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let registry = state.registry.clone();
    let store = state.store.clone();
    let summary = crate::error::run_blocking(move || store.render_summary_impl(&registry.current())).await?;
    Ok(Json(json!({ "summary": summary })))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
