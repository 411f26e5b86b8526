//! ICT equipment loan lifecycle: request, approval, issue, return and overdue
//! tracking.
//!
//! Quantities on every line satisfy `issued <= approved <= requested`. A unit
//! is `on_loan` exactly while an open transaction (no return timestamp)
//! references it.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{
    ApprovedQuantity, LoanApplication, LoanApplicationId, LoanApplicationItem,
    LoanApplicationView, LoanItemRequest, LoanStatus, LoanSubmission, LoanTransaction,
    TransactionId, TransactionStatus,
};
pub use router::loan_router;
pub use service::{
    FulfilmentOutcome, IssueRequest, IssueUnit, LoanService, OverdueSweep, ReturnRequest,
    ReturnUnit, SYSTEM_ACTOR,
};
