pub mod approvals;
pub mod audit;
pub mod desk;
pub mod directory;
pub mod email;
pub mod equipment;
pub mod error;
pub(crate) mod http;
pub mod loans;
mod locks;
pub mod memory;
pub mod notifications;
pub mod reports;
pub mod repository;

pub use desk::ResourceDesk;
pub use error::{ValidationError, WorkflowError};

#[cfg(test)]
mod tests;
