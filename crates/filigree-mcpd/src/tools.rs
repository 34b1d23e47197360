//! Tool dispatch table: each MCP tool call maps 1:1 onto a `SqliteStore`
//! method, mirroring the CLI's `commands::*` and the HTTP boundary's
//! `routes::*` (spec §6, C11). No business logic lives here.

use filigree_core::error::FiligreeError;
use filigree_core::fields::FieldMap;
use filigree_core::issue::IssueBuilder;
use filigree_core::plan::PlanPayload;
use filigree_storage::{
    BatchOutcome, CreateIssueParams, FileListQuery, IncomingFinding, IssueQuery, RegisterFileParams,
    UndoOutcome, UpdateIssueParams,
};
use filigree_templates::transition::get_valid_transitions;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::state::ServerState;

/// Tool-call error envelope (spec §6): `{ "error": <message>, "code": <taxonomy> }`.
/// Distinct in shape from the HTTP boundary's nested `{error: {message, code}}`.
#[derive(Debug)]
pub struct ToolError {
    pub message: String,
    pub code: &'static str,
}

impl From<FiligreeError> for ToolError {
    fn from(e: FiligreeError) -> Self {
        ToolError { message: e.to_string(), code: e.code() }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError { message: format!("invalid arguments: {e}"), code: "invalid" }
    }
}

impl ToolError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ToolError { message: msg.into(), code: "invalid" }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ToolError { message: msg.into(), code: "validation_error" }
    }

    pub fn to_json(&self) -> Value {
        json!({ "error": self.message, "code": self.code })
    }
}

pub type ToolResult = Result<Value, ToolError>;

fn args<T: for<'de> Deserialize<'de>>(params: &Value) -> Result<T, ToolError> {
    serde_json::from_value(params.clone()).map_err(ToolError::from)
}

/// Boundary validation of `actor` (spec §6: "actor name non-empty after
/// whitespace trim, ≤128 characters, no Unicode category-C characters"),
/// called by every tool that records an actor-attributed mutation.
fn check_actor(actor: &str) -> Result<(), ToolError> {
    filigree_core::validation::validate_actor(actor)
        .map_err(|e| ToolError::validation(e.to_string()))
}

fn default_actor() -> String {
    "mcp".to_string()
}

/// Returns the MCP `tools/list` payload: name, one-line description, and a
/// permissive JSON-schema input shape for every tool this server exposes.
pub fn list_tools() -> Value {
    let t = |name: &str, description: &str| {
        json!({
            "name": name,
            "description": description,
            "inputSchema": { "type": "object" },
        })
    };
    json!({
        "tools": [
            t("create_issue", "Create a new issue"),
            t("get_issue", "Fetch an issue by id"),
            t("list_issues", "Search/list issues by status, type, assignee, parent, or full-text query"),
            t("update_issue", "Update mutable fields on an issue, enforcing workflow transitions"),
            t("close_issue", "Close an issue and unblock any dependents that become ready"),
            t("reopen_issue", "Reopen a closed issue"),
            t("claim_issue", "Claim a specific issue for an assignee"),
            t("release_claim", "Release a claim on an issue"),
            t("claim_next", "Atomically claim the highest-priority ready issue matching filters"),
            t("undo_last", "Undo the most recent reversible event for an issue"),
            t("batch_close", "Close a batch of issues, collecting per-item failures"),
            t("batch_update", "Apply the same update to a batch of issues, collecting per-item failures"),
            t("add_comment", "Add a comment to an issue"),
            t("get_comments", "List an issue's comments"),
            t("add_label", "Add a label to an issue"),
            t("remove_label", "Remove a label from an issue"),
            t("get_labels", "List an issue's labels"),
            t("add_dependency", "Record that an issue depends on another"),
            t("remove_dependency", "Remove a dependency edge"),
            t("get_ready", "List issues with no unresolved dependencies, ordered by priority"),
            t("get_blocked", "List issues blocked on open dependencies"),
            t("get_critical_path", "Compute the longest dependency chain still open"),
            t("create_plan", "Create a milestone with phases and steps in one call"),
            t("get_plan", "Fetch a milestone's full phase/step tree"),
            t("register_file", "Register a tracked file by project-relative path"),
            t("get_file", "Fetch a tracked file record"),
            t("process_scan_results", "Ingest findings from a scan run, opening or updating issues"),
            t("clean_stale_findings", "Resolve findings from a prior scan run no longer reported"),
            t("add_file_association", "Associate a file with an issue"),
            t("list_files", "List tracked files with finding-count and severity filters"),
            t("get_file_timeline", "List events recorded against a file"),
            t("get_file_hotspots", "Rank files by open finding count"),
            t("list_types", "List issue types known to the template registry"),
            t("get_type_info", "Fetch a type's full state machine and field schema"),
            t("get_valid_transitions", "List the transitions available from a given state"),
            t("explain_state", "Explain what a state means and what it requires"),
            t("get_workflow_guide", "Render a human-readable guide for a type's workflow"),
            t("get_workflow_states", "List a type's states with their categories"),
            t("get_issue_events", "List events recorded against one issue"),
            t("get_events_since", "List events with id greater than a watermark, for polling a change feed"),
            t("get_recent_events", "List the most recent events across the project"),
            t("flow_metrics", "Compute lead/cycle time and throughput metrics over a trailing window"),
            t("get_config", "List all project config key/value pairs"),
            t("set_config", "Set a project config key"),
            t("render_summary", "Render the project status summary"),
        ]
    })
}

pub fn call_tool(state: &ServerState, name: &str, params: &Value) -> ToolResult {
    match name {
        "create_issue" => create_issue(state, params),
        "get_issue" => get_issue(state, params),
        "list_issues" => list_issues(state, params),
        "update_issue" => update_issue(state, params),
        "close_issue" => close_issue(state, params),
        "reopen_issue" => reopen_issue(state, params),
        "claim_issue" => claim_issue(state, params),
        "release_claim" => release_claim(state, params),
        "claim_next" => claim_next(state, params),
        "undo_last" => undo_last(state, params),
        "batch_close" => batch_close(state, params),
        "batch_update" => batch_update(state, params),
        "add_comment" => add_comment(state, params),
        "get_comments" => get_comments(state, params),
        "add_label" => add_label(state, params),
        "remove_label" => remove_label(state, params),
        "get_labels" => get_labels(state, params),
        "add_dependency" => add_dependency(state, params),
        "remove_dependency" => remove_dependency(state, params),
        "get_ready" => get_ready(state, params),
        "get_blocked" => get_blocked(state, params),
        "get_critical_path" => get_critical_path(state, params),
        "create_plan" => create_plan(state, params),
        "get_plan" => get_plan(state, params),
        "register_file" => register_file(state, params),
        "get_file" => get_file(state, params),
        "process_scan_results" => process_scan_results(state, params),
        "clean_stale_findings" => clean_stale_findings(state, params),
        "add_file_association" => add_file_association(state, params),
        "list_files" => list_files(state, params),
        "get_file_timeline" => get_file_timeline(state, params),
        "get_file_hotspots" => get_file_hotspots(state, params),
        "list_types" => list_types(state, params),
        "get_type_info" => get_type_info(state, params),
        "get_valid_transitions" => get_valid_transitions_tool(state, params),
        "explain_state" => explain_state(state, params),
        "get_workflow_guide" => get_workflow_guide(state, params),
        "get_workflow_states" => get_workflow_states(state, params),
        "get_issue_events" => get_issue_events(state, params),
        "get_events_since" => get_events_since(state, params),
        "get_recent_events" => get_recent_events(state, params),
        "flow_metrics" => flow_metrics(state, params),
        "get_config" => get_config(state, params),
        "set_config" => set_config(state, params),
        "render_summary" => render_summary(state, params),
        other => Err(ToolError::invalid(format!("unknown tool: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
struct CreateIssueArgs {
    title: String,
    #[serde(rename = "type")]
    issue_type: Option<String>,
    priority: Option<i32>,
    parent_id: Option<String>,
    assignee: Option<String>,
    description: Option<String>,
    notes: Option<String>,
    status: Option<String>,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
    #[serde(default = "default_actor")]
    actor: String,
}

fn create_issue(state: &ServerState, params: &Value) -> ToolResult {
    let a: CreateIssueArgs = args(params)?;
    check_actor(&a.actor)?;
    let create_params = CreateIssueParams {
        title: a.title,
        issue_type: a.issue_type,
        priority: a.priority,
        parent_id: a.parent_id,
        assignee: a.assignee,
        description: a.description,
        notes: a.notes,
        fields: if a.fields.is_empty() { None } else { Some(FieldMap(a.fields)) },
        status: a.status,
    };
    let issue = state.store.create_issue_impl(&state.registry, &state.prefix, create_params, &a.actor)?;
    Ok(serde_json::to_value(issue).unwrap())
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: String,
}

fn get_issue(state: &ServerState, params: &Value) -> ToolResult {
    let a: IdArgs = args(params)?;
    let issue = state.store.get_issue_impl(&a.id)?;
    Ok(serde_json::to_value(issue).unwrap())
}

#[derive(Debug, Deserialize, Default)]
struct ListIssuesArgs {
    status: Option<String>,
    #[serde(rename = "type")]
    issue_type: Option<String>,
    assignee: Option<String>,
    parent_id: Option<String>,
    query: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

fn list_issues(state: &ServerState, params: &Value) -> ToolResult {
    let a: ListIssuesArgs = args(params)?;
    let query = IssueQuery {
        status: a.status,
        issue_type: a.issue_type,
        assignee: a.assignee,
        parent_id: a.parent_id,
        text_query: a.query,
        limit: a.limit.unwrap_or(50),
        offset: a.offset.unwrap_or(0),
    };
    let issues = state.store.search_issues_impl(&query)?;
    Ok(serde_json::to_value(issues).unwrap())
}

#[derive(Debug, Deserialize)]
struct UpdateIssueArgs {
    id: String,
    status: Option<String>,
    priority: Option<i32>,
    title: Option<String>,
    assignee: Option<String>,
    description: Option<String>,
    notes: Option<String>,
    #[serde(default)]
    parent_id: Option<Option<String>>,
    fields: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    force: bool,
    #[serde(default = "default_actor")]
    actor: String,
}

fn update_issue(state: &ServerState, params: &Value) -> ToolResult {
    let a: UpdateIssueArgs = args(params)?;
    check_actor(&a.actor)?;
    let update_params = UpdateIssueParams {
        status: a.status,
        priority: a.priority,
        title: a.title,
        assignee: a.assignee,
        description: a.description,
        notes: a.notes,
        parent_id: a.parent_id,
        fields: a.fields.map(FieldMap),
        skip_transition_check: a.force,
    };
    let (issue, outcome) = state.store.update_issue_impl(&state.registry, &a.id, update_params, &a.actor)?;
    Ok(json!({ "issue": issue, "warnings": outcome.warnings }))
}

#[derive(Debug, Deserialize)]
struct CloseArgs {
    id: String,
    reason: Option<String>,
    #[serde(default = "default_actor")]
    actor: String,
}

fn close_issue(state: &ServerState, params: &Value) -> ToolResult {
    let a: CloseArgs = args(params)?;
    check_actor(&a.actor)?;
    let (issue, unblocked) = state.store.close_issue_impl(&state.registry, &a.id, a.reason.as_deref(), &a.actor)?;
    Ok(json!({ "issue": issue, "newly_unblocked": unblocked }))
}

#[derive(Debug, Deserialize)]
struct IdActorArgs {
    id: String,
    #[serde(default = "default_actor")]
    actor: String,
}

fn reopen_issue(state: &ServerState, params: &Value) -> ToolResult {
    let a: IdActorArgs = args(params)?;
    check_actor(&a.actor)?;
    let issue = state.store.reopen_issue_impl(&state.registry, &a.id, &a.actor)?;
    Ok(serde_json::to_value(issue).unwrap())
}

#[derive(Debug, Deserialize)]
struct ClaimArgs {
    id: String,
    assignee: String,
    #[serde(default = "default_actor")]
    actor: String,
}

fn claim_issue(state: &ServerState, params: &Value) -> ToolResult {
    let a: ClaimArgs = args(params)?;
    check_actor(&a.actor)?;
    let issue = state.store.claim_issue_impl(&state.registry, &a.id, &a.assignee, &a.actor)?;
    Ok(serde_json::to_value(issue).unwrap())
}

fn release_claim(state: &ServerState, params: &Value) -> ToolResult {
    let a: IdActorArgs = args(params)?;
    check_actor(&a.actor)?;
    let issue = state.store.release_claim_impl(&a.id, &a.actor)?;
    Ok(serde_json::to_value(issue).unwrap())
}

#[derive(Debug, Deserialize)]
struct ClaimNextArgs {
    assignee: String,
    #[serde(rename = "type")]
    type_filter: Option<String>,
    priority_min: Option<i32>,
    priority_max: Option<i32>,
    #[serde(default = "default_actor")]
    actor: String,
}

fn claim_next(state: &ServerState, params: &Value) -> ToolResult {
    let a: ClaimNextArgs = args(params)?;
    check_actor(&a.actor)?;
    let outcome = state.store.claim_next_impl(
        &state.registry,
        &a.assignee,
        a.type_filter.as_deref(),
        a.priority_min,
        a.priority_max,
        &a.actor,
    )?;
    Ok(match outcome {
        Some(o) => json!({ "issue": o.issue, "reason": o.reason }),
        None => json!(null),
    })
}

fn undo_last(state: &ServerState, params: &Value) -> ToolResult {
    let a: IdActorArgs = args(params)?;
    check_actor(&a.actor)?;
    let outcome = state.store.undo_last_impl(&a.id, &a.actor)?;
    Ok(match outcome {
        UndoOutcome::Undone { event_type, event_id } => json!({ "undone": true, "event_type": event_type, "event_id": event_id }),
        UndoOutcome::NotUndone { reason } => json!({ "undone": false, "reason": reason }),
    })
}

#[derive(Debug, Deserialize)]
struct BatchIdsArgs {
    ids: Vec<String>,
    reason: Option<String>,
    #[serde(default = "default_actor")]
    actor: String,
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

fn batch_close(state: &ServerState, params: &Value) -> ToolResult {
    let a: BatchIdsArgs = args(params)?;
    check_actor(&a.actor)?;
    let outcome = state.store.batch_close_impl(&state.registry, &a.ids, a.reason.as_deref(), &a.actor)?;
    Ok(outcome_to_json(outcome))
}

#[derive(Debug, Deserialize)]
struct BatchUpdateArgs {
    ids: Vec<String>,
    #[serde(flatten)]
    update: UpdateFields,
}

#[derive(Debug, Deserialize)]
struct UpdateFields {
    status: Option<String>,
    priority: Option<i32>,
    title: Option<String>,
    assignee: Option<String>,
    description: Option<String>,
    notes: Option<String>,
    #[serde(default)]
    parent_id: Option<Option<String>>,
    fields: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    force: bool,
    #[serde(default = "default_actor")]
    actor: String,
}

fn batch_update(state: &ServerState, params: &Value) -> ToolResult {
    let a: BatchUpdateArgs = args(params)?;
    check_actor(&a.update.actor)?;
    let update_params = UpdateIssueParams {
        status: a.update.status,
        priority: a.update.priority,
        title: a.update.title,
        assignee: a.update.assignee,
        description: a.update.description,
        notes: a.update.notes,
        parent_id: a.update.parent_id,
        fields: a.update.fields.map(FieldMap),
        skip_transition_check: a.update.force,
    };
    let outcome = state.store.batch_update_impl(&state.registry, &a.ids, || update_params.clone(), &a.update.actor)?;
    Ok(outcome_to_json(outcome))
}

#[derive(Debug, Deserialize)]
struct CommentArgs {
    id: String,
    text: String,
    author: String,
}

fn add_comment(state: &ServerState, params: &Value) -> ToolResult {
    let a: CommentArgs = args(params)?;
    let comment = state.store.add_comment_impl(&a.id, &a.author, &a.text)?;
    Ok(serde_json::to_value(comment).unwrap())
}

fn get_comments(state: &ServerState, params: &Value) -> ToolResult {
    let a: IdArgs = args(params)?;
    let comments = state.store.get_comments_impl(&a.id)?;
    Ok(serde_json::to_value(comments).unwrap())
}

#[derive(Debug, Deserialize)]
struct LabelArgs {
    id: String,
    label: String,
    #[serde(default = "default_actor")]
    actor: String,
}

fn add_label(state: &ServerState, params: &Value) -> ToolResult {
    let a: LabelArgs = args(params)?;
    check_actor(&a.actor)?;
    state.store.add_label_impl(&a.id, &a.label, &a.actor)?;
    Ok(json!({ "ok": true }))
}

fn remove_label(state: &ServerState, params: &Value) -> ToolResult {
    let a: LabelArgs = args(params)?;
    check_actor(&a.actor)?;
    state.store.remove_label_impl(&a.id, &a.label, &a.actor)?;
    Ok(json!({ "ok": true }))
}

fn get_labels(state: &ServerState, params: &Value) -> ToolResult {
    let a: IdArgs = args(params)?;
    let labels = state.store.get_labels_impl(&a.id)?;
    Ok(serde_json::to_value(labels).unwrap())
}

#[derive(Debug, Deserialize)]
struct DependencyArgs {
    id: String,
    depends_on_id: String,
    #[serde(default = "default_actor")]
    actor: String,
}

fn add_dependency(state: &ServerState, params: &Value) -> ToolResult {
    let a: DependencyArgs = args(params)?;
    check_actor(&a.actor)?;
    state.store.add_dependency_impl(&a.id, &a.depends_on_id, &a.actor)?;
    Ok(json!({ "ok": true }))
}

fn remove_dependency(state: &ServerState, params: &Value) -> ToolResult {
    let a: DependencyArgs = args(params)?;
    check_actor(&a.actor)?;
    state.store.remove_dependency_impl(&a.id, &a.depends_on_id, &a.actor)?;
    Ok(json!({ "ok": true }))
}

#[derive(Debug, Deserialize, Default)]
struct ReadyArgs {
    #[serde(rename = "type")]
    type_filter: Option<String>,
    limit: Option<i64>,
}

fn get_ready(state: &ServerState, params: &Value) -> ToolResult {
    let a: ReadyArgs = args(params)?;
    let issues = state.store.get_ready_impl(&state.registry, a.type_filter.as_deref(), a.limit)?;
    Ok(serde_json::to_value(issues).unwrap())
}

fn get_blocked(state: &ServerState, _params: &Value) -> ToolResult {
    let blocked = state.store.get_blocked_impl(&state.registry)?;
    Ok(serde_json::to_value(blocked).unwrap())
}

fn get_critical_path(state: &ServerState, _params: &Value) -> ToolResult {
    let path = state.store.get_critical_path_impl(&state.registry)?;
    Ok(serde_json::to_value(path).unwrap())
}

#[derive(Debug, Deserialize)]
struct CreatePlanArgs {
    #[serde(flatten)]
    payload: PlanPayload,
    #[serde(default = "default_actor")]
    actor: String,
}

fn create_plan(state: &ServerState, params: &Value) -> ToolResult {
    let a: CreatePlanArgs = args(params)?;
    check_actor(&a.actor)?;
    let view = state.store.create_plan_impl(&state.registry, &state.prefix, &a.payload, &a.actor)?;
    Ok(serde_json::to_value(view).unwrap())
}

#[derive(Debug, Deserialize)]
struct MilestoneIdArgs {
    milestone_id: String,
}

fn get_plan(state: &ServerState, params: &Value) -> ToolResult {
    let a: MilestoneIdArgs = args(params)?;
    let view = state.store.get_plan_impl(&state.registry, &a.milestone_id)?;
    Ok(serde_json::to_value(view).unwrap())
}

#[derive(Debug, Deserialize)]
struct RegisterFileArgs {
    path: String,
    language: Option<String>,
    file_type: Option<String>,
    metadata: Option<serde_json::Map<String, Value>>,
}

fn register_file(state: &ServerState, params: &Value) -> ToolResult {
    let a: RegisterFileArgs = args(params)?;
    let p = RegisterFileParams { path: a.path, language: a.language, file_type: a.file_type, metadata: a.metadata };
    let file = state.store.register_file_impl(&state.prefix, p)?;
    Ok(serde_json::to_value(file).unwrap())
}

fn get_file(state: &ServerState, params: &Value) -> ToolResult {
    let a: IdArgs = args(params)?;
    let file = state.store.get_file_impl(&a.id)?;
    Ok(serde_json::to_value(file).unwrap())
}

#[derive(Debug, Deserialize)]
struct ScanResultsArgs {
    scan_source: String,
    scan_run_id: Option<String>,
    findings: Vec<IncomingFinding>,
}

fn process_scan_results(state: &ServerState, params: &Value) -> ToolResult {
    let a: ScanResultsArgs = args(params)?;
    let findings =
        state.store.process_scan_results_impl(&state.prefix, &a.scan_source, a.scan_run_id.as_deref(), &a.findings)?;
    Ok(serde_json::to_value(findings).unwrap())
}

#[derive(Debug, Deserialize)]
struct CleanStaleArgs {
    scan_source: String,
    scan_run_id: String,
}

fn clean_stale_findings(state: &ServerState, params: &Value) -> ToolResult {
    let a: CleanStaleArgs = args(params)?;
    let cleaned = state.store.clean_stale_findings_impl(&a.scan_source, &a.scan_run_id)?;
    Ok(serde_json::to_value(cleaned).unwrap())
}

#[derive(Debug, Deserialize)]
struct FileAssociationArgs {
    file_id: String,
    issue_id: String,
    assoc_type: filigree_core::files::AssocType,
}

fn add_file_association(state: &ServerState, params: &Value) -> ToolResult {
    let a: FileAssociationArgs = args(params)?;
    let assoc = state.store.add_file_association_impl(&a.file_id, &a.issue_id, a.assoc_type)?;
    Ok(serde_json::to_value(assoc).unwrap())
}

#[derive(Debug, Deserialize, Default)]
struct FileListArgs {
    language: Option<String>,
    path_prefix: Option<String>,
    min_findings: Option<i64>,
    has_severity: Option<String>,
    scan_source: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

fn list_files(state: &ServerState, params: &Value) -> ToolResult {
    let a: FileListArgs = args(params)?;
    let has_severity = a
        .has_severity
        .as_deref()
        .map(|s| s.parse().map_err(|_| ToolError::invalid(format!("unknown severity: {s}"))))
        .transpose()?;
    let query = FileListQuery {
        language: a.language,
        path_prefix: a.path_prefix,
        min_findings: a.min_findings,
        has_severity,
        scan_source: a.scan_source,
        limit: a.limit.unwrap_or(50),
        offset: a.offset.unwrap_or(0),
    };
    let paginated = state.store.list_files_paginated_impl(&query)?;
    Ok(serde_json::to_value(paginated).unwrap())
}

#[derive(Debug, Deserialize)]
struct FileTimelineArgs {
    id: String,
    event_type: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

fn get_file_timeline(state: &ServerState, params: &Value) -> ToolResult {
    let a: FileTimelineArgs = args(params)?;
    let timeline = state.store.get_file_timeline_impl(&a.id, a.event_type.as_deref(), a.limit.unwrap_or(50), a.offset.unwrap_or(0))?;
    Ok(serde_json::to_value(timeline).unwrap())
}

#[derive(Debug, Deserialize, Default)]
struct HotspotsArgs {
    limit: Option<i64>,
}

fn get_file_hotspots(state: &ServerState, params: &Value) -> ToolResult {
    let a: HotspotsArgs = args(params)?;
    let hotspots = state.store.get_file_hotspots_impl(a.limit.unwrap_or(20))?;
    Ok(serde_json::to_value(hotspots).unwrap())
}

fn list_types(state: &ServerState, _params: &Value) -> ToolResult {
    let snapshot = state.registry.current();
    Ok(json!(snapshot.known_types()))
}

#[derive(Debug, Deserialize)]
struct TypeArgs {
    #[serde(rename = "type")]
    type_name: String,
}

fn get_type_info(state: &ServerState, params: &Value) -> ToolResult {
    let a: TypeArgs = args(params)?;
    let snapshot = state.registry.current();
    let template = snapshot.get_template(&a.type_name).ok_or_else(|| FiligreeError::not_found("template", &a.type_name))?;
    Ok(serde_json::to_value(template).unwrap())
}

fn probe_issue(type_name: &str, state: &str) -> filigree_core::issue::Issue {
    IssueBuilder::new("(probe)").issue_type(type_name).status(state).build()
}

#[derive(Debug, Deserialize)]
struct TypeStateArgs {
    #[serde(rename = "type")]
    type_name: String,
    state: String,
}

fn get_valid_transitions_tool(state: &ServerState, params: &Value) -> ToolResult {
    let a: TypeStateArgs = args(params)?;
    let snapshot = state.registry.current();
    let template = snapshot.get_template(&a.type_name).ok_or_else(|| FiligreeError::not_found("template", &a.type_name))?;
    let issue = probe_issue(&a.type_name, &a.state);
    let transitions = get_valid_transitions(template, &issue);
    Ok(json!(
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
    ))
}

fn explain_state(state: &ServerState, params: &Value) -> ToolResult {
    let a: TypeStateArgs = args(params)?;
    let snapshot = state.registry.current();
    let template = snapshot.get_template(&a.type_name).ok_or_else(|| FiligreeError::not_found("template", &a.type_name))?;
    let category = template.category_of(&a.state);
    let issue = probe_issue(&a.type_name, &a.state);
    let outbound = get_valid_transitions(template, &issue);
    let required_here: Vec<&str> =
        template.field_schema.iter().filter(|f| f.required_at.as_deref() == Some(a.state.as_str())).map(|f| f.name.as_str()).collect();
    Ok(json!({
        "type": a.type_name,
        "state": a.state,
        "category": category.as_str(),
        "required_fields": required_here,
        "reachable_states": outbound.iter().map(|t| t.to.clone()).collect::<Vec<_>>(),
    }))
}

fn get_workflow_guide(state: &ServerState, params: &Value) -> ToolResult {
    let a: TypeArgs = args(params)?;
    let snapshot = state.registry.current();
    let template = snapshot.get_template(&a.type_name).ok_or_else(|| FiligreeError::not_found("template", &a.type_name))?;

    let mut guide = String::new();
    guide.push_str(&format!("# {}\n\n{}\n\n", template.display_name, template.description));
    guide.push_str(&format!("Initial state: `{}`\n\n", template.initial_state));
    guide.push_str("## States\n\n");
    for s in &template.states {
        guide.push_str(&format!("- `{}` ({})\n", s.name, s.category.as_str()));
    }
    guide.push_str("\n## Transitions\n\n");
    for t in &template.transitions {
        let enforcement = if t.enforcement == filigree_core::template::Enforcement::Hard { "hard" } else { "soft" };
        guide.push_str(&format!("- `{}` → `{}` ({enforcement}", t.from_state, t.to_state));
        if !t.requires_fields.is_empty() {
            guide.push_str(&format!(", requires {:?}", t.requires_fields));
        }
        guide.push_str(")\n");
    }
    Ok(json!({ "type": a.type_name, "guide": guide }))
}

fn get_workflow_states(state: &ServerState, params: &Value) -> ToolResult {
    let a: TypeArgs = args(params)?;
    let snapshot = state.registry.current();
    let template = snapshot.get_template(&a.type_name).ok_or_else(|| FiligreeError::not_found("template", &a.type_name))?;
    Ok(serde_json::to_value(&template.states).unwrap())
}

#[derive(Debug, Deserialize)]
struct IssueEventsArgs {
    id: String,
    limit: Option<i64>,
}

fn get_issue_events(state: &ServerState, params: &Value) -> ToolResult {
    let a: IssueEventsArgs = args(params)?;
    let events = state.store.get_issue_events_impl(&a.id, a.limit.unwrap_or(100))?;
    Ok(serde_json::to_value(events).unwrap())
}

#[derive(Debug, Deserialize)]
struct EventsSinceArgs {
    since_id: i64,
    limit: Option<i64>,
}

fn get_events_since(state: &ServerState, params: &Value) -> ToolResult {
    let a: EventsSinceArgs = args(params)?;
    let events = state.store.get_events_since_impl(a.since_id, a.limit.unwrap_or(100))?;
    Ok(serde_json::to_value(events).unwrap())
}

#[derive(Debug, Deserialize, Default)]
struct LimitArgs {
    limit: Option<i64>,
}

fn get_recent_events(state: &ServerState, params: &Value) -> ToolResult {
    let a: LimitArgs = args(params)?;
    let events = state.store.get_recent_events_impl(a.limit.unwrap_or(50))?;
    Ok(serde_json::to_value(events).unwrap())
}

#[derive(Debug, Deserialize, Default)]
struct FlowMetricsArgs {
    window_days: Option<i64>,
}

fn flow_metrics(state: &ServerState, params: &Value) -> ToolResult {
    let a: FlowMetricsArgs = args(params)?;
    let metrics = state.store.compute_flow_metrics_impl(&state.registry, a.window_days.unwrap_or(30))?;
    Ok(serde_json::to_value(metrics).unwrap())
}

fn get_config(state: &ServerState, _params: &Value) -> ToolResult {
    let config = state.store.get_all_config_impl()?;
    Ok(serde_json::to_value(config).unwrap())
}

#[derive(Debug, Deserialize)]
struct SetConfigArgs {
    key: String,
    value: String,
}

fn set_config(state: &ServerState, params: &Value) -> ToolResult {
    let a: SetConfigArgs = args(params)?;
    state.store.set_config_impl(&a.key, &a.value)?;
    Ok(json!({ "ok": true }))
}

fn render_summary(state: &ServerState, _params: &Value) -> ToolResult {
    let summary = state.store.render_summary_impl(&state.registry)?;
    Ok(json!({ "summary": summary }))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use filigree_storage::SqliteStore;
    use filigree_templates::TemplateRegistry;

    use super::*;

    fn test_state() -> ServerState {
        ServerState {
            store: SqliteStore::open_in_memory().unwrap(),
            registry: TemplateRegistry::load(Path::new("/nonexistent-project-root-for-tests")).unwrap(),
            prefix: "demo".to_string(),
            project_root: std::path::PathBuf::new(),
        }
    }

    #[test]
    fn list_tools_is_nonempty() {
        let list = list_tools();
        assert!(list["tools"].as_array().unwrap().len() > 20);
    }

    #[test]
    fn create_then_get_issue_round_trips() {
        let state = test_state();
        let created = call_tool(&state, "create_issue", &json!({ "title": "Write docs", "actor": "agent-1" })).unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert!(id.starts_with("demo-"));

        let fetched = call_tool(&state, "get_issue", &json!({ "id": id })).unwrap();
        assert_eq!(fetched["title"], "Write docs");
    }

    #[test]
    fn get_issue_not_found_maps_to_taxonomy_code() {
        let state = test_state();
        let err = call_tool(&state, "get_issue", &json!({ "id": "demo-ffffffffff" })).unwrap_err();
        assert_eq!(err.code, "not_found");
    }

    #[test]
    fn unknown_tool_is_invalid() {
        let state = test_state();
        let err = call_tool(&state, "not_a_real_tool", &json!({})).unwrap_err();
        assert_eq!(err.code, "invalid");
    }

    #[test]
    fn claim_next_on_empty_project_returns_null() {
        let state = test_state();
        let result = call_tool(&state, "claim_next", &json!({ "assignee": "agent-1" })).unwrap();
        assert!(result.is_null());
    }

    #[test]
    fn list_types_includes_default_task_type() {
        let state = test_state();
        let types = call_tool(&state, "list_types", &json!({})).unwrap();
        let types: Vec<String> = serde_json::from_value(types).unwrap();
        assert!(types.iter().any(|t| t == "task"));
    }
}
