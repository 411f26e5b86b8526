//! Approval, email provisioning and ICT equipment loan workflows.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
