use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::domain::{LoanApplication, LoanApplicationId, LoanApplicationView, LoanSubmission};
use super::service::{IssueRequest, LoanService, ReturnRequest};
use crate::workflows::email::ActorRequest;
use crate::workflows::http::respond;
use crate::workflows::notifications::NotificationOutbox;
use crate::workflows::repository::WorkflowRepository;

/// Loan intake, fulfilment and overdue sweep endpoints.
pub fn loan_router<R, N>(service: Arc<LoanService<R, N>>) -> Router
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    Router::new()
        .route(
            "/api/v1/loan-applications",
            get(list_handler::<R, N>).post(submit_new_handler::<R, N>),
        )
        .route("/api/v1/loan-applications/drafts", post(draft_handler::<R, N>))
        .route(
            "/api/v1/loan-applications/:application_id",
            get(status_handler::<R, N>),
        )
        .route(
            "/api/v1/loan-applications/:application_id/submit",
            post(submit_handler::<R, N>),
        )
        .route(
            "/api/v1/loan-applications/:application_id/cancel",
            post(cancel_handler::<R, N>),
        )
        .route(
            "/api/v1/loan-applications/:application_id/approvals",
            get(approvals_handler::<R, N>),
        )
        .route(
            "/api/v1/loan-applications/:application_id/transactions",
            get(transactions_handler::<R, N>),
        )
        .route(
            "/api/v1/loan-applications/:application_id/issue",
            post(issue_handler::<R, N>),
        )
        .route(
            "/api/v1/loan-applications/:application_id/return",
            post(return_handler::<R, N>),
        )
        .route("/api/v1/loans/overdue-sweep", post(sweep_handler::<R, N>))
        .with_state(service)
}

type Service<R, N> = State<Arc<LoanService<R, N>>>;

fn view(application: LoanApplication) -> LoanApplicationView {
    application.status_view()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SweepParams {
    /// Defaults to the current UTC date.
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) async fn list_handler<R, N>(State(service): Service<R, N>) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let result = service
        .list()
        .map(|applications| applications.into_iter().map(view).collect::<Vec<_>>());
    respond(StatusCode::OK, result)
}

pub(crate) async fn draft_handler<R, N>(
    State(service): Service<R, N>,
    axum::Json(submission): axum::Json<LoanSubmission>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(
        StatusCode::CREATED,
        service.draft(submission, Utc::now()).map(view),
    )
}

pub(crate) async fn submit_new_handler<R, N>(
    State(service): Service<R, N>,
    axum::Json(submission): axum::Json<LoanSubmission>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(
        StatusCode::ACCEPTED,
        service.submit_new(submission, Utc::now()).map(view),
    )
}

pub(crate) async fn status_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(
        StatusCode::OK,
        service.get(&LoanApplicationId(application_id)).map(view),
    )
}

pub(crate) async fn submit_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let id = LoanApplicationId(application_id);
    respond(
        StatusCode::ACCEPTED,
        service.submit(&id, &request.actor_id, Utc::now()).map(view),
    )
}

pub(crate) async fn cancel_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let id = LoanApplicationId(application_id);
    respond(
        StatusCode::OK,
        service.cancel(&id, &request.actor_id, Utc::now()).map(view),
    )
}

pub(crate) async fn approvals_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(
        StatusCode::OK,
        service.approvals(&LoanApplicationId(application_id)),
    )
}

pub(crate) async fn transactions_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    respond(
        StatusCode::OK,
        service.transactions(&LoanApplicationId(application_id)),
    )
}

pub(crate) async fn issue_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<IssueRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let id = LoanApplicationId(application_id);
    respond(StatusCode::OK, service.issue(&id, request, Utc::now()))
}

pub(crate) async fn return_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ReturnRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let id = LoanApplicationId(application_id);
    respond(StatusCode::OK, service.record_return(&id, request, Utc::now()))
}

pub(crate) async fn sweep_handler<R, N>(
    State(service): Service<R, N>,
    Query(params): Query<SweepParams>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let now = Utc::now();
    let today = params.today.unwrap_or_else(|| now.date_naive());
    respond(StatusCode::OK, service.sweep_overdue(today, now))
}
