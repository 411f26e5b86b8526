use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::directory::{Role, User, UserId};
use crate::workflows::email::EmailApplicationSubmission;
use crate::workflows::equipment::{
    AssetTag, EquipmentRegistration, EquipmentType, RegisterEquipmentRequest,
};
use crate::workflows::loans::{LoanItemRequest, LoanSubmission};
use crate::workflows::memory::{MemoryOutbox, MemoryStore};
use crate::workflows::notifications::{Notification, NotificationOutbox, OutboxError};
use crate::workflows::ResourceDesk;

pub(super) const APPLICANT: &str = "aina";
pub(super) const SUPPORT: &str = "siti";
pub(super) const JUNIOR: &str = "zul";
pub(super) const IT_ADMIN: &str = "rahman";
pub(super) const HOD: &str = "hafiz";
pub(super) const BPM: &str = "farid";
pub(super) const ADMIN: &str = "nora";

pub(super) fn id(value: &str) -> UserId {
    UserId(value.to_string())
}

pub(super) fn tag(value: &str) -> AssetTag {
    AssetTag(value.to_string())
}

pub(super) fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).expect("valid date")
}

fn user(id: &str, name: &str, department: &str, grade: u16, roles: Vec<Role>) -> User {
    User {
        id: UserId(id.to_string()),
        name: name.to_string(),
        email: format!("{id}@agency.gov.my"),
        department: Some(department.to_string()),
        position: None,
        grade: Some(grade),
        roles,
    }
}

pub(super) fn staff() -> Vec<User> {
    vec![
        user(APPLICANT, "Aina Rahim", "Finance", 19, Vec::new()),
        user(SUPPORT, "Siti Hajar", "Finance", 44, Vec::new()),
        user(JUNIOR, "Zulkifli", "Finance", 22, Vec::new()),
        user(IT_ADMIN, "Rahman Idris", "ICT", 41, vec![Role::ItAdmin]),
        user(HOD, "Hafiz Osman", "Finance", 48, vec![Role::Hod]),
        user(BPM, "Farid Kamal", "BPM", 29, vec![Role::BpmStaff]),
        user(ADMIN, "Nora Aziz", "ICT", 52, vec![Role::Admin]),
    ]
}

pub(super) type Desk<N> = ResourceDesk<MemoryStore, N>;

pub(super) fn desk_with_outbox<N>(users: Vec<User>, outbox: Arc<N>) -> (Desk<N>, Arc<MemoryStore>)
where
    N: NotificationOutbox + 'static,
{
    let store = Arc::new(MemoryStore::with_users(users));
    let desk = ResourceDesk::new(Arc::clone(&store), outbox, WorkflowConfig::default());
    (desk, store)
}

pub(super) fn build_desk() -> (Desk<MemoryOutbox>, Arc<MemoryStore>, Arc<MemoryOutbox>) {
    let outbox = Arc::new(MemoryOutbox::default());
    let (desk, store) = desk_with_outbox(staff(), Arc::clone(&outbox));
    (desk, store, outbox)
}

pub(super) fn email_submission() -> EmailApplicationSubmission {
    EmailApplicationSubmission {
        applicant_id: id(APPLICANT),
        purpose: "New staff onboarding".to_string(),
        proposed_email: Some("aina.rahim@agency.gov.my".to_string()),
        supporting_officer_id: id(SUPPORT),
    }
}

pub(super) fn loan_submission() -> LoanSubmission {
    LoanSubmission {
        applicant_id: id(APPLICANT),
        responsible_officer_id: None,
        supporting_officer_id: id(SUPPORT),
        purpose: "Budget roadshow".to_string(),
        location: "Dewan Utama".to_string(),
        loan_start_date: date(3),
        loan_end_date: date(7),
        items: vec![
            LoanItemRequest {
                equipment_type: EquipmentType::Laptop,
                quantity: 2,
                notes: None,
            },
            LoanItemRequest {
                equipment_type: EquipmentType::Projector,
                quantity: 1,
                notes: Some("With HDMI cable".to_string()),
            },
        ],
    }
}

pub(super) fn register<N>(desk: &Desk<N>, asset_tag: &str, equipment_type: EquipmentType)
where
    N: NotificationOutbox + 'static,
{
    desk.inventory()
        .register(
            RegisterEquipmentRequest {
                actor_id: id(BPM),
                registration: EquipmentRegistration {
                    asset_tag: tag(asset_tag),
                    equipment_type,
                    brand: Some("Dell".to_string()),
                    model: None,
                    serial_number: None,
                    location: Some("Store B".to_string()),
                    department: None,
                },
            },
            at(1),
        )
        .expect("register equipment");
}

/// Registers two laptops and a projector.
pub(super) fn stock<N>(desk: &Desk<N>)
where
    N: NotificationOutbox + 'static,
{
    register(desk, "ICT-LPT-001", EquipmentType::Laptop);
    register(desk, "ICT-LPT-002", EquipmentType::Laptop);
    register(desk, "ICT-PRJ-001", EquipmentType::Projector);
}

pub(super) fn events_for(outbox: &MemoryOutbox, recipient: &str) -> Vec<&'static str> {
    outbox
        .delivered()
        .into_iter()
        .filter(|notification| notification.recipient.0 == recipient)
        .map(|notification| notification.event)
        .collect()
}

#[derive(Default)]
pub(super) struct FailingOutbox;

impl NotificationOutbox for FailingOutbox {
    fn publish(&self, _notification: Notification) -> Result<(), OutboxError> {
        Err(OutboxError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
