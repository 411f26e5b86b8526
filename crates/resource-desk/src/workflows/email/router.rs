use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Utc;

use super::domain::{
    EmailApplication, EmailApplicationId, EmailApplicationSubmission, EmailApplicationView,
};
use super::service::{
    ActorRequest, EmailApplicationService, ProvisioningCompletion, ProvisioningFailure,
};
use crate::workflows::http::respond;
use crate::workflows::notifications::NotificationOutbox;
use crate::workflows::repository::WorkflowRepository;

/// Intake, withdrawal and provisioning endpoints for email applications.
pub fn email_router<R, N>(service: Arc<EmailApplicationService<R, N>>) -> Router
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    Router::new()
        .route(
            "/api/v1/email-applications",
            get(list_handler::<R, N>).post(submit_new_handler::<R, N>),
        )
        .route(
            "/api/v1/email-applications/drafts",
            post(draft_handler::<R, N>),
        )
        .route(
            "/api/v1/email-applications/:application_id",
            get(status_handler::<R, N>),
        )
        .route(
            "/api/v1/email-applications/:application_id/submit",
            post(submit_handler::<R, N>),
        )
        .route(
            "/api/v1/email-applications/:application_id/cancel",
            post(cancel_handler::<R, N>),
        )
        .route(
            "/api/v1/email-applications/:application_id/approvals",
            get(approvals_handler::<R, N>),
        )
        .route(
            "/api/v1/email-applications/:application_id/provisioning/start",
            post(start_provisioning_handler::<R, N>),
        )
        .route(
            "/api/v1/email-applications/:application_id/provisioning/complete",
            post(complete_provisioning_handler::<R, N>),
        )
        .route(
            "/api/v1/email-applications/:application_id/provisioning/fail",
            post(fail_provisioning_handler::<R, N>),
        )
        .with_state(service)
}

type Service<R, N> = State<Arc<EmailApplicationService<R, N>>>;

fn view(application: EmailApplication) -> EmailApplicationView {
    application.status_view()
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
    axum::Json(submission): axum::Json<EmailApplicationSubmission>,
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
    axum::Json(submission): axum::Json<EmailApplicationSubmission>,
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
        service.get(&EmailApplicationId(application_id)).map(view),
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
    let id = EmailApplicationId(application_id);
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
    let id = EmailApplicationId(application_id);
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
        service.approvals(&EmailApplicationId(application_id)),
    )
}

pub(crate) async fn start_provisioning_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let id = EmailApplicationId(application_id);
    respond(
        StatusCode::OK,
        service
            .start_provisioning(&id, &request.actor_id, Utc::now())
            .map(view),
    )
}

pub(crate) async fn complete_provisioning_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
    axum::Json(completion): axum::Json<ProvisioningCompletion>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let id = EmailApplicationId(application_id);
    respond(
        StatusCode::OK,
        service
            .complete_provisioning(&id, completion, Utc::now())
            .map(view),
    )
}

pub(crate) async fn fail_provisioning_handler<R, N>(
    State(service): Service<R, N>,
    Path(application_id): Path<String>,
    axum::Json(failure): axum::Json<ProvisioningFailure>,
) -> Response
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    let id = EmailApplicationId(application_id);
    respond(
        StatusCode::OK,
        service.fail_provisioning(&id, failure, Utc::now()).map(view),
    )
}
