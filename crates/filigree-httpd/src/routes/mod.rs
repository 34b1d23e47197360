//! Route handler modules, one per spec surface (spec §6).

pub mod dependencies;
pub mod files;
pub mod issues;
pub mod misc;
pub mod planning;

use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(misc::health))
        .route("/issues", post(issues::create_issue).get(issues::list_issues))
        .route("/issues/{id}", get(issues::get_issue).put(issues::update_issue))
        .route("/issues/{id}/close", post(issues::close_issue))
        .route("/issues/{id}/reopen", post(issues::reopen_issue))
        .route("/issues/{id}/claim", post(issues::claim_issue))
        .route("/issues/{id}/release", post(issues::release_claim))
        .route("/issues/{id}/undo", post(issues::undo_last))
        .route("/issues/{id}/comments", get(issues::get_comments).post(issues::add_comment))
        .route("/issues/{id}/labels", get(issues::get_labels).post(issues::add_label))
        .route("/issues/{id}/labels/{label}", delete(issues::remove_label))
        .route("/issues/{id}/events", get(misc::get_issue_events))
        .route("/issues/{id}/dependencies", post(dependencies::add_dependency))
        .route(
            "/issues/{id}/dependencies/{depends_on_id}",
            delete(dependencies::remove_dependency),
        )
        .route("/claim-next", post(issues::claim_next))
        .route("/batch/close", post(issues::batch_close))
        .route("/batch/update", put(issues::batch_update))
        .route("/ready", get(dependencies::get_ready))
        .route("/blocked", get(dependencies::get_blocked))
        .route("/critical-path", get(dependencies::get_critical_path))
        .route("/plans", post(planning::create_plan))
        .route("/plans/{milestone_id}", get(planning::get_plan))
        .route("/files", get(files::list_files).post(files::register_file))
        .route("/files/{id}", get(files::get_file))
        .route("/files/{id}/associations", post(files::add_file_association))
        .route("/files/{id}/timeline", get(files::get_file_timeline))
        .route("/files/hotspots", get(files::get_file_hotspots))
        .route("/scan-results", post(files::process_scan_results))
        .route("/scan-results/clean-stale", post(files::clean_stale_findings))
        .route("/events", get(misc::get_recent_events))
        .route("/events/since", get(misc::get_events_since))
        .route("/analytics/flow", get(misc::flow_metrics))
        .route("/config", get(misc::get_config).post(misc::set_config))
        .route("/summary", get(misc::render_summary))
        .route("/templates", get(misc::list_types))
        .route("/templates/{type_name}", get(misc::type_info))
        .route("/templates/{type_name}/valid-transitions", get(misc::valid_transitions))
        .route("/templates/{type_name}/explain-state", get(misc::explain_state))
        .route("/templates/{type_name}/workflow-guide", get(misc::workflow_guide))
        .route("/templates/{type_name}/workflow-states", get(misc::workflow_states))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
