use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::approvals::domain::ApprovalStage;
use crate::workflows::audit::AuditFields;
use crate::workflows::directory::UserId;
use crate::workflows::error::{ValidationError, WorkflowError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmailApplicationId(pub String);

impl fmt::Display for EmailApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of an email account / user ID request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailApplicationStatus {
    Draft,
    PendingSupport,
    PendingAdmin,
    Approved,
    Processing,
    Completed,
    ProvisionFailed,
    Rejected,
    Cancelled,
}

impl EmailApplicationStatus {
    pub const fn ordered() -> [Self; 9] {
        [
            Self::Draft,
            Self::PendingSupport,
            Self::PendingAdmin,
            Self::Approved,
            Self::Processing,
            Self::Completed,
            Self::ProvisionFailed,
            Self::Rejected,
            Self::Cancelled,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingSupport => "pending_support",
            Self::PendingAdmin => "pending_admin",
            Self::Approved => "approved",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::ProvisionFailed => "provision_failed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn pending_stage(self) -> Option<ApprovalStage> {
        match self {
            Self::PendingSupport => Some(ApprovalStage::SupportReview),
            Self::PendingAdmin => Some(ApprovalStage::ItAdminReview),
            _ => None,
        }
    }

    const fn for_stage(stage: ApprovalStage) -> Option<Self> {
        match stage {
            ApprovalStage::SupportReview => Some(Self::PendingSupport),
            ApprovalStage::ItAdminReview => Some(Self::PendingAdmin),
            ApprovalStage::HodReview => None,
        }
    }
}

/// Applicant supplied request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailApplicationSubmission {
    pub applicant_id: UserId,
    pub purpose: String,
    #[serde(default)]
    pub proposed_email: Option<String>,
    pub supporting_officer_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailApplication {
    pub id: EmailApplicationId,
    pub applicant_id: UserId,
    pub purpose: String,
    pub proposed_email: Option<String>,
    pub supporting_officer_id: UserId,
    pub status: EmailApplicationStatus,
    pub final_assigned_email: Option<String>,
    pub final_assigned_user_id: Option<String>,
    pub provisioning_note: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub audit: AuditFields,
    #[serde(default)]
    pub version: u64,
}

impl EmailApplication {
    pub fn draft(
        id: EmailApplicationId,
        submission: EmailApplicationSubmission,
        at: DateTime<Utc>,
    ) -> Self {
        let audit = AuditFields::new(&submission.applicant_id, at);
        Self {
            id,
            applicant_id: submission.applicant_id,
            purpose: submission.purpose.trim().to_string(),
            proposed_email: submission
                .proposed_email
                .map(|email| email.trim().to_ascii_lowercase())
                .filter(|email| !email.is_empty()),
            supporting_officer_id: submission.supporting_officer_id,
            status: EmailApplicationStatus::Draft,
            final_assigned_email: None,
            final_assigned_user_id: None,
            provisioning_note: None,
            submitted_at: None,
            audit,
            version: 0,
        }
    }

    fn transition(
        &mut self,
        action: &'static str,
        allowed: &[EmailApplicationStatus],
        next: EmailApplicationStatus,
    ) -> Result<(), WorkflowError> {
        if !allowed.contains(&self.status) {
            return Err(WorkflowError::InvalidTransition {
                entity: "email application",
                id: self.id.0.clone(),
                status: self.status.label(),
                action,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn submit(&mut self, at: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.transition(
            "submit",
            &[EmailApplicationStatus::Draft],
            EmailApplicationStatus::PendingSupport,
        )?;
        self.submitted_at = Some(at);
        Ok(())
    }

    /// Moves from the stage that was just approved into `next`.
    pub fn advance_to(&mut self, next: ApprovalStage) -> Result<(), WorkflowError> {
        let target = EmailApplicationStatus::for_stage(next).ok_or_else(|| {
            WorkflowError::InvalidTransition {
                entity: "email application",
                id: self.id.0.clone(),
                status: self.status.label(),
                action: "enter a stage outside its approval chain",
            }
        })?;
        self.transition(
            "advance to the next approval stage",
            &[EmailApplicationStatus::PendingSupport],
            target,
        )
    }

    pub fn approve(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "be approved",
            &[EmailApplicationStatus::PendingAdmin],
            EmailApplicationStatus::Approved,
        )
    }

    pub fn reject(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "be rejected",
            &[
                EmailApplicationStatus::PendingSupport,
                EmailApplicationStatus::PendingAdmin,
            ],
            EmailApplicationStatus::Rejected,
        )
    }

    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "be cancelled",
            &[
                EmailApplicationStatus::Draft,
                EmailApplicationStatus::PendingSupport,
                EmailApplicationStatus::PendingAdmin,
            ],
            EmailApplicationStatus::Cancelled,
        )
    }

    pub fn start_provisioning(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "start provisioning",
            &[
                EmailApplicationStatus::Approved,
                EmailApplicationStatus::ProvisionFailed,
            ],
            EmailApplicationStatus::Processing,
        )?;
        self.provisioning_note = None;
        Ok(())
    }

    pub fn complete_provisioning(
        &mut self,
        assigned_email: String,
        assigned_user_id: Option<String>,
    ) -> Result<(), WorkflowError> {
        self.transition(
            "complete provisioning",
            &[EmailApplicationStatus::Processing],
            EmailApplicationStatus::Completed,
        )?;
        self.final_assigned_email = Some(assigned_email);
        self.final_assigned_user_id = assigned_user_id;
        Ok(())
    }

    pub fn fail_provisioning(&mut self, reason: String) -> Result<(), WorkflowError> {
        self.transition(
            "fail provisioning",
            &[EmailApplicationStatus::Processing],
            EmailApplicationStatus::ProvisionFailed,
        )?;
        self.provisioning_note = Some(reason);
        Ok(())
    }

    pub fn status_view(&self) -> EmailApplicationView {
        EmailApplicationView {
            id: self.id.clone(),
            applicant_id: self.applicant_id.clone(),
            status: self.status.label(),
            pending_stage: self.status.pending_stage().map(ApprovalStage::label),
            proposed_email: self.proposed_email.clone(),
            final_assigned_email: self.final_assigned_email.clone(),
            final_assigned_user_id: self.final_assigned_user_id.clone(),
            provisioning_note: self.provisioning_note.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Public payload for an email application.
#[derive(Debug, Clone, Serialize)]
pub struct EmailApplicationView {
    pub id: EmailApplicationId,
    pub applicant_id: UserId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_assigned_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_assigned_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Checks an address is well formed and inside the organisation domain.
pub fn validate_org_email(address: &str, domain: &str) -> Result<(), ValidationError> {
    let address = address.trim();
    let (local, host) = address
        .split_once('@')
        .ok_or_else(|| ValidationError::InvalidEmail(address.to_string()))?;

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !local_ok || host.is_empty() || host.contains('@') {
        return Err(ValidationError::InvalidEmail(address.to_string()));
    }

    if !host.eq_ignore_ascii_case(domain) {
        return Err(ValidationError::ForeignEmailDomain {
            address: address.to_string(),
            domain: domain.to_string(),
        });
    }

    Ok(())
}
