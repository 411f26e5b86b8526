use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::ReportService;
use crate::workflows::directory::UserId;
use crate::workflows::http::respond;
use crate::workflows::repository::WorkflowRepository;

pub fn report_router<R>(service: Arc<ReportService<R>>) -> Router
where
    R: WorkflowRepository + 'static,
{
    Router::new()
        .route("/api/v1/reports/equipment", get(equipment_handler::<R>))
        .route("/api/v1/reports/loans", get(loans_handler::<R>))
        .route("/api/v1/reports/email-accounts", get(email_handler::<R>))
        .route("/api/v1/reports/user-activity", get(activity_handler::<R>))
        .route(
            "/api/v1/officers/:officer_id/dashboard",
            get(dashboard_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoanReportParams {
    pub(crate) today: Option<NaiveDate>,
}

async fn equipment_handler<R>(State(service): State<Arc<ReportService<R>>>) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(StatusCode::OK, service.equipment_inventory())
}

async fn loans_handler<R>(
    State(service): State<Arc<ReportService<R>>>,
    Query(params): Query<LoanReportParams>,
) -> Response
where
    R: WorkflowRepository + 'static,
{
    let today = params.today.unwrap_or_else(|| Utc::now().date_naive());
    respond(StatusCode::OK, service.loans(today))
}

async fn email_handler<R>(State(service): State<Arc<ReportService<R>>>) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(StatusCode::OK, service.email_accounts())
}

async fn activity_handler<R>(State(service): State<Arc<ReportService<R>>>) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(StatusCode::OK, service.user_activity())
}

async fn dashboard_handler<R>(
    State(service): State<Arc<ReportService<R>>>,
    Path(officer_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.approval_dashboard(&UserId(officer_id), Utc::now()),
    )
}
