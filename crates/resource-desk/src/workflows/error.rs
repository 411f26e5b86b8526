use chrono::{DateTime, NaiveDate, Utc};

use super::repository::RepositoryError;

/// Failure raised by any workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} {id} cannot {action} while {status}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        status: &'static str,
        action: &'static str,
    },
    #[error("{user} is not permitted to {action}")]
    NotAuthorized { user: String, action: &'static str },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("no officer is available for {stage}")]
    NoOfficerAvailable { stage: &'static str },
    #[error("{approvable} already has a pending approval at {stage}")]
    DuplicatePendingApproval {
        approvable: String,
        stage: &'static str,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn not_authorized(user: impl ToString, action: &'static str) -> Self {
        Self::NotAuthorized {
            user: user.to_string(),
            action,
        }
    }
}

/// Input rejected before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("email address '{address}' must belong to {domain}")]
    ForeignEmailDomain { address: String, domain: String },
    #[error("supporting officer {officer} must hold grade {minimum} or above")]
    SupportingOfficerGrade { officer: String, minimum: u16 },
    #[error("applicants cannot support their own application")]
    SelfSupport,
    #[error("loan period {start} to {end} is invalid")]
    InvalidLoanPeriod { start: NaiveDate, end: NaiveDate },
    #[error("loan period of {days} days exceeds the {max} day limit")]
    LoanPeriodTooLong { days: i64, max: u32 },
    #[error("at least one equipment item is required")]
    NoItems,
    #[error("item {line} must request at least one unit")]
    ZeroQuantity { line: u32 },
    #[error("item {line}: {field} of {value} would exceed {limit_field} of {limit}")]
    QuantityExceeded {
        line: u32,
        field: &'static str,
        value: u32,
        limit_field: &'static str,
        limit: u32,
    },
    #[error("item {0} does not exist on this application")]
    UnknownItem(u32),
    #[error("equipment {asset_tag} is a {actual}, item {line} requested a {expected}")]
    EquipmentTypeMismatch {
        asset_tag: String,
        line: u32,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("equipment {0} is listed more than once")]
    DuplicateEquipment(String),
    #[error("return at {returned} precedes issue at {issued}")]
    ReturnBeforeIssue {
        issued: DateTime<Utc>,
        returned: DateTime<Utc>,
    },
    #[error("approved quantities only apply to the final stage of a loan application")]
    UnexpectedQuantities,
    #[error("equipment {0} is already registered")]
    DuplicateAssetTag(String),
}
