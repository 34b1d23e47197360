//! Translates [`FiligreeError`] into the wire error envelope (spec §6/§7):
//! `{ "error": { "message": <message>, "code": <taxonomy string> } }` plus an
//! HTTP status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use filigree_core::error::FiligreeError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    code: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

pub struct ApiError(pub FiligreeError);

impl From<FiligreeError> for ApiError {
    fn from(e: FiligreeError) -> Self {
        ApiError(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError(FiligreeError::Internal(e.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FiligreeError::Validation(_) | FiligreeError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            FiligreeError::NotFound { .. } => StatusCode::NOT_FOUND,
            FiligreeError::InvalidTransition { .. }
            | FiligreeError::AlreadyClaimed { .. }
            | FiligreeError::WouldCreateCycle { .. }
            | FiligreeError::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FiligreeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: self.0.to_string(),
                code: self.0.code(),
            },
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Boundary validation of `actor` (spec §6: "actor name non-empty after
/// whitespace trim, ≤128 characters, no Unicode category-C characters"),
/// called by every route that records an actor-attributed mutation.
pub fn check_actor(actor: &str) -> ApiResult<()> {
    filigree_core::validation::validate_actor(actor)
        .map_err(|e| ApiError(FiligreeError::validation(e.to_string())))
}

/// Runs a blocking `SqliteStore` call on the blocking pool and maps both
/// the join failure and the storage error into [`ApiError`]. Every route
/// handler uses this to bridge the engine's synchronous calls into axum's
/// async handlers (spec §9: "the engine is synchronous; the HTTP and
/// tool-call adapters provide their own concurrency").
pub async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> Result<T, filigree_storage::StorageError> + Send + 'static,
) -> ApiResult<T> {
    let result = tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| FiligreeError::Internal(e.to_string()))?;
    Ok(result.map_err(FiligreeError::from)?)
}
