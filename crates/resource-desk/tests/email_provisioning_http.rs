//! Email account applications exercised over the desk's HTTP surface, from intake through
//! the two sign-off stages to a provisioned mailbox.

mod common {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use axum::response::Response;
    use serde_json::Value;

    use resource_desk::config::WorkflowConfig;
    use resource_desk::workflows::directory::{Role, User, UserId};
    use resource_desk::workflows::memory::{MemoryOutbox, MemoryStore};
    use resource_desk::workflows::ResourceDesk;

    fn staff(id: &str, grade: u16, roles: Vec<Role>) -> User {
        User {
            id: UserId(id.to_string()),
            name: id.to_uppercase(),
            email: format!("{id}@agency.gov.my"),
            department: Some("Registry".to_string()),
            position: None,
            grade: Some(grade),
            roles,
        }
    }

    pub(super) fn desk() -> (axum::Router, Arc<MemoryOutbox>) {
        let store = Arc::new(MemoryStore::with_users(vec![
            staff("dina", 22, Vec::new()),
            staff("omar", 19, Vec::new()),
            staff("yusof", 44, Vec::new()),
            staff("aziz", 41, vec![Role::ItAdmin]),
            staff("ravi", 32, vec![Role::BpmStaff]),
        ]));
        let outbox = Arc::new(MemoryOutbox::default());
        let desk = ResourceDesk::new(store, Arc::clone(&outbox), WorkflowConfig::default());
        (desk.router(), outbox)
    }

    pub(super) fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    pub(super) fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    pub(super) async fn json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }
}

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use tower::ServiceExt;

async fn decide(router: &axum::Router, officer: &str, verdict: &str) -> serde_json::Value {
    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/officers/{officer}/approvals/pending")))
        .await
        .expect("response");
    let pending = json(response).await;
    let approval_id = pending[0]["id"].as_str().expect("pending approval").to_string();

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/approvals/{approval_id}/decision"),
            json!({ "officer_id": officer, "verdict": verdict, "comments": "reviewed" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    json(response).await
}

#[tokio::test]
async fn approved_application_is_provisioned_over_http() {
    let (router, outbox) = desk();

    let response = router
        .clone()
        .oneshot(post(
            "/api/v1/email-applications",
            json!({
                "applicant_id": "dina",
                "purpose": "Registry counter duty",
                "proposed_email": "dina@agency.gov.my",
                "supporting_officer_id": "yusof",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let application = json(response).await;
    let id = application["id"].as_str().expect("id").to_string();

    let support = decide(&router, "yusof", "approve").await;
    assert_eq!(support["application_status"], "pending_admin");
    assert_eq!(support["next_approval"]["officer_id"], "aziz");

    let admin = decide(&router, "aziz", "approve").await;
    assert_eq!(admin["application_status"], "approved");

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/email-applications/{id}/provisioning/start"),
            json!({ "actor_id": "aziz" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "processing");

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/email-applications/{id}/provisioning/complete"),
            json!({ "actor_id": "aziz", "assigned_email": "dina@gmail.com" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/email-applications/{id}/provisioning/complete"),
            json!({
                "actor_id": "aziz",
                "assigned_email": "Dina@Agency.gov.my",
                "assigned_user_id": "dina",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let completed = json(response).await;
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["final_assigned_email"], "dina@agency.gov.my");

    let response = router
        .oneshot(get("/api/v1/reports/email-accounts"))
        .await
        .expect("response");
    let report = json(response).await;
    assert_eq!(report["total"], 1);
    assert_eq!(report["provisioned"][0]["final_assigned_email"], "dina@agency.gov.my");

    let applicant_events: Vec<&str> = outbox
        .delivered()
        .iter()
        .filter(|notification| notification.recipient.0 == "dina")
        .map(|notification| notification.event)
        .collect();
    assert_eq!(
        applicant_events,
        vec![
            "application_submitted",
            "application_approved",
            "provisioning_completed"
        ]
    );
}

#[tokio::test]
async fn rejection_at_support_closes_the_chain() {
    let (router, outbox) = desk();

    let response = router
        .clone()
        .oneshot(post(
            "/api/v1/email-applications",
            json!({
                "applicant_id": "omar",
                "purpose": "Temporary project mailbox",
                "supporting_officer_id": "yusof",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let id = json(response).await["id"].as_str().expect("id").to_string();

    let outcome = decide(&router, "yusof", "reject").await;
    assert_eq!(outcome["application_status"], "rejected");
    assert!(outcome.get("next_approval").is_none());

    let response = router
        .clone()
        .oneshot(get("/api/v1/officers/aziz/approvals/pending"))
        .await
        .expect("response");
    assert_eq!(json(response).await, json!([]));

    let response = router
        .oneshot(post(
            &format!("/api/v1/email-applications/{id}/provisioning/start"),
            json!({ "actor_id": "aziz" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert!(outbox
        .delivered()
        .iter()
        .any(|notification| notification.event == "application_rejected"
            && notification.recipient.0 == "omar"));
}
