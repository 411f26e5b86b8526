use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Utc;

use super::domain::AssetTag;
use super::service::{EquipmentFilter, InventoryService, RegisterEquipmentRequest};
use crate::workflows::email::ActorRequest;
use crate::workflows::http::respond;
use crate::workflows::repository::WorkflowRepository;

/// Equipment register endpoints.
pub fn equipment_router<R>(service: Arc<InventoryService<R>>) -> Router
where
    R: WorkflowRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/equipment",
            get(list_handler::<R>).post(register_handler::<R>),
        )
        .route("/api/v1/equipment/:asset_tag", get(detail_handler::<R>))
        .route(
            "/api/v1/equipment/:asset_tag/maintenance",
            post(maintenance_handler::<R>),
        )
        .route(
            "/api/v1/equipment/:asset_tag/maintenance/release",
            post(release_handler::<R>),
        )
        .route(
            "/api/v1/equipment/:asset_tag/retire",
            post(retire_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn list_handler<R>(
    State(service): State<Arc<InventoryService<R>>>,
    Query(filter): Query<EquipmentFilter>,
) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(StatusCode::OK, service.list(filter))
}

pub(crate) async fn register_handler<R>(
    State(service): State<Arc<InventoryService<R>>>,
    axum::Json(request): axum::Json<RegisterEquipmentRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(StatusCode::CREATED, service.register(request, Utc::now()))
}

pub(crate) async fn detail_handler<R>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(asset_tag): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(StatusCode::OK, service.get(&AssetTag::new(&asset_tag)))
}

pub(crate) async fn maintenance_handler<R>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(asset_tag): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.send_to_maintenance(&AssetTag::new(&asset_tag), &request.actor_id, Utc::now()),
    )
}

pub(crate) async fn release_handler<R>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(asset_tag): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.release_from_maintenance(&AssetTag::new(&asset_tag), &request.actor_id, Utc::now()),
    )
}

pub(crate) async fn retire_handler<R>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(asset_tag): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.retire(&AssetTag::new(&asset_tag), &request.actor_id, Utc::now()),
    )
}
