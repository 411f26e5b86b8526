use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Utc;

use super::domain::ApprovalId;
use super::service::{ApprovalService, DecisionRequest};
use crate::workflows::directory::UserId;
use crate::workflows::http::respond;
use crate::workflows::notifications::NotificationOutbox;
use crate::workflows::repository::WorkflowRepository;

/// Approval dashboard and decision endpoints.
pub fn approval_router<R, N>(service: Arc<ApprovalService<R, N>>) -> Router
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    Router::new()
        .route("/api/v1/approvals/:approval_id", get(approval_handler::<R, N>))
        .route(
            "/api/v1/approvals/:approval_id/decision",
            post(decision_handler::<R, N>),
        )
        .route(
            "/api/v1/officers/:officer_id/approvals/pending",
            get(pending_handler::<R, N>),
        )
        .route(
            "/api/v1/officers/:officer_id/approvals/history",
            get(history_handler::<R, N>),
        )
        .with_state(service)
}

pub(crate) async fn approval_handler<R, N>(
    State(service): State<Arc<ApprovalService<R, N>>>,
    Path(approval_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(StatusCode::OK, service.approval(&ApprovalId(approval_id)))
}

pub(crate) async fn decision_handler<R, N>(
    State(service): State<Arc<ApprovalService<R, N>>>,
    Path(approval_id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(
        StatusCode::OK,
        service.decide(&ApprovalId(approval_id), request, Utc::now()),
    )
}

pub(crate) async fn pending_handler<R, N>(
    State(service): State<Arc<ApprovalService<R, N>>>,
    Path(officer_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(StatusCode::OK, service.pending_for(&UserId(officer_id)))
}

pub(crate) async fn history_handler<R, N>(
    State(service): State<Arc<ApprovalService<R, N>>>,
    Path(officer_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(StatusCode::OK, service.history_for(&UserId(officer_id)))
}
