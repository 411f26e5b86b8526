//! Multi-stage officer sign-off shared by email and loan applications.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{
    ApplicationKind, Approvable, Approval, ApprovalId, ApprovalStage, ApprovalStatus, Verdict,
};
pub use router::approval_router;
pub use service::{ApprovalService, DecisionOutcome, DecisionRequest};
