use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use resource_desk::config::WorkflowConfig;
use resource_desk::error::AppError;
use resource_desk::workflows::directory::{Role, User, UserId};
use resource_desk::workflows::memory::{MemoryOutbox, MemoryStore};
use resource_desk::workflows::ResourceDesk;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type Desk = ResourceDesk<MemoryStore, MemoryOutbox>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) desk: Arc<Desk>,
    pub(crate) inbox: Arc<MemoryOutbox>,
}

/// In-process desk backed by the memory store; the outbox doubles as the inbox.
pub(crate) fn build_desk(users: Vec<User>, config: WorkflowConfig) -> (Arc<Desk>, Arc<MemoryOutbox>) {
    let store = Arc::new(MemoryStore::with_users(users));
    let outbox = Arc::new(MemoryOutbox::default());
    let desk = Arc::new(ResourceDesk::new(store, Arc::clone(&outbox), config));
    (desk, outbox)
}

/// Staff records from a JSON array, or the sample directory when no file is given.
pub(crate) fn load_directory(path: Option<&Path>) -> Result<Vec<User>, AppError> {
    let Some(path) = path else {
        return Ok(sample_directory());
    };
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| {
        AppError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {err}", path.display()),
        ))
    })
}

fn staff(
    id: &str,
    name: &str,
    department: &str,
    position: &str,
    grade: u16,
    roles: Vec<Role>,
) -> User {
    User {
        id: UserId(id.to_string()),
        name: name.to_string(),
        email: format!("{id}@agency.gov.my"),
        department: Some(department.to_string()),
        position: Some(position.to_string()),
        grade: Some(grade),
        roles,
    }
}

pub(crate) fn sample_directory() -> Vec<User> {
    vec![
        staff("aina", "Aina Rahim", "Finance", "Assistant Accountant", 19, Vec::new()),
        staff("siti", "Siti Hajar", "Finance", "Senior Accountant", 44, Vec::new()),
        staff("hafiz", "Hafiz Osman", "Finance", "Director of Finance", 52, vec![Role::Hod]),
        staff("rahman", "Rahman Idris", "ICT", "Systems Administrator", 41, vec![Role::ItAdmin]),
        staff("farid", "Farid Kamal", "BPM", "ICT Store Officer", 29, vec![Role::BpmStaff]),
        staff("nora", "Nora Aziz", "ICT", "Head of ICT", 54, vec![Role::Admin, Role::Hod]),
    ]
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
