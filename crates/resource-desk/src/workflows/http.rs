use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use super::error::WorkflowError;
use super::repository::RepositoryError;

pub(crate) fn status_for(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::Validation(_) | WorkflowError::NoOfficerAvailable { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WorkflowError::InvalidTransition { .. }
        | WorkflowError::DuplicatePendingApproval { .. }
        | WorkflowError::Repository(RepositoryError::Conflict)
        | WorkflowError::Repository(RepositoryError::Stale { .. }) => StatusCode::CONFLICT,
        WorkflowError::NotAuthorized { .. } => StatusCode::FORBIDDEN,
        WorkflowError::NotFound { .. } | WorkflowError::Repository(RepositoryError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Renders a workflow failure as `{ "error": ... }` with a matching status code.
pub(crate) fn error_response(error: WorkflowError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        error!(error = %error, "workflow request failed");
    }
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) fn respond<T: Serialize>(status: StatusCode, result: Result<T, WorkflowError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}
