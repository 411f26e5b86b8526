use crate::infra::AppState;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use resource_desk::error::AppError;
use resource_desk::workflows::directory::UserId;
use resource_desk::workflows::equipment::{EquipmentImporter, ImportSummary};
use resource_desk::workflows::memory::InboxEntry;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;

#[derive(Debug, Serialize)]
pub(crate) struct InboxResponse {
    pub(crate) user_id: UserId,
    pub(crate) unread: usize,
    pub(crate) notifications: Vec<InboxEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportParams {
    pub(crate) actor_id: String,
}

/// Service endpoints layered over the workflow routes.
pub(crate) fn with_desk_routes(workflows: Router) -> Router {
    workflows
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/users/:user_id/notifications", get(inbox_endpoint))
        .route(
            "/api/v1/users/:user_id/notifications/:notification_id/read",
            post(mark_read_endpoint),
        )
        .route("/api/v1/equipment/import", post(import_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn inbox_endpoint(
    Extension(state): Extension<AppState>,
    Path(user_id): Path<String>,
) -> Json<InboxResponse> {
    let user_id = UserId(user_id);
    Json(InboxResponse {
        unread: state.inbox.unread_count(&user_id),
        notifications: state.inbox.inbox(&user_id),
        user_id,
    })
}

pub(crate) async fn mark_read_endpoint(
    Extension(state): Extension<AppState>,
    Path((user_id, notification_id)): Path<(String, u64)>,
) -> Response {
    match state
        .inbox
        .mark_read(&UserId(user_id), notification_id, Utc::now())
    {
        Some(entry) => (StatusCode::OK, Json(entry)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("notification {notification_id} not found") })),
        )
            .into_response(),
    }
}

/// Accepts a raw inventory CSV export as the request body.
pub(crate) async fn import_endpoint(
    Extension(state): Extension<AppState>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Result<Json<ImportSummary>, AppError> {
    let batch = EquipmentImporter::from_reader(Cursor::new(body.into_bytes()))?;
    let summary = state
        .desk
        .inventory()
        .import(batch, &UserId(params.actor_id), Utc::now())?;
    Ok(Json(summary))
}
