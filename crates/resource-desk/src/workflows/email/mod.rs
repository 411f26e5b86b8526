//! Official email account and user ID applications.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{
    validate_org_email, EmailApplication, EmailApplicationId, EmailApplicationStatus,
    EmailApplicationSubmission, EmailApplicationView,
};
pub use router::email_router;
pub use service::{
    ActorRequest, EmailApplicationService, ProvisioningCompletion, ProvisioningFailure,
};
