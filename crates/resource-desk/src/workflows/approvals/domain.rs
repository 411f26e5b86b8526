use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::audit::AuditFields;
use crate::workflows::directory::{Role, UserId};
use crate::workflows::email::domain::EmailApplicationId;
use crate::workflows::error::WorkflowError;
use crate::workflows::loans::domain::LoanApplicationId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The application an approval belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Approvable {
    Email(EmailApplicationId),
    Loan(LoanApplicationId),
}

impl Approvable {
    pub fn kind(&self) -> ApplicationKind {
        match self {
            Self::Email(_) => ApplicationKind::Email,
            Self::Loan(_) => ApplicationKind::Loan,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Email(id) => &id.0,
            Self::Loan(id) => &id.0,
        }
    }

    /// Key used to serialise transitions on the owning application.
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.kind().slug(), self.id())
    }

    pub fn link_path(&self) -> String {
        match self {
            Self::Email(id) => format!("email-applications/{}", id.0),
            Self::Loan(id) => format!("loan-applications/{}", id.0),
        }
    }
}

impl fmt::Display for Approvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind().label(), self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    Email,
    Loan,
}

impl ApplicationKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Email => "email application",
            Self::Loan => "loan application",
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Loan => "loan",
        }
    }

    /// Stages an application of this kind passes through, in order.
    pub const fn chain(self) -> &'static [ApprovalStage] {
        match self {
            Self::Email => &[ApprovalStage::SupportReview, ApprovalStage::ItAdminReview],
            Self::Loan => &[ApprovalStage::SupportReview, ApprovalStage::HodReview],
        }
    }

    pub fn first_stage(self) -> ApprovalStage {
        self.chain()[0]
    }

    pub fn next_stage(self, current: ApprovalStage) -> Option<ApprovalStage> {
        let chain = self.chain();
        chain
            .iter()
            .position(|stage| *stage == current)
            .and_then(|index| chain.get(index + 1))
            .copied()
    }

    pub fn is_final_stage(self, stage: ApprovalStage) -> bool {
        self.chain().last() == Some(&stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    SupportReview,
    ItAdminReview,
    HodReview,
}

impl ApprovalStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SupportReview => "support review",
            Self::ItAdminReview => "IT admin review",
            Self::HodReview => "HOD review",
        }
    }

    /// Role an officer must hold to be assigned this stage. Support review is
    /// gated by grade instead.
    pub const fn required_role(self) -> Option<Role> {
        match self {
            Self::SupportReview => None,
            Self::ItAdminReview => Some(Role::ItAdmin),
            Self::HodReview => Some(Role::Hod),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
}

/// One officer sign-off on one stage of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub approvable: Approvable,
    pub stage: ApprovalStage,
    pub officer_id: UserId,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Officer who recorded the verdict. Withdrawals leave this empty.
    #[serde(default)]
    pub decided_by: Option<UserId>,
    pub audit: AuditFields,
    #[serde(default)]
    pub version: u64,
}

impl Approval {
    pub fn pending(
        id: ApprovalId,
        approvable: Approvable,
        stage: ApprovalStage,
        officer_id: UserId,
        audit: AuditFields,
    ) -> Self {
        Self {
            id,
            approvable,
            stage,
            officer_id,
            status: ApprovalStatus::Pending,
            comments: None,
            decided_at: None,
            decided_by: None,
            audit,
            version: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    pub fn record(
        &mut self,
        verdict: Verdict,
        comments: Option<String>,
        by: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if !self.is_pending() {
            return Err(WorkflowError::InvalidTransition {
                entity: "approval",
                id: self.id.0.clone(),
                status: self.status.label(),
                action: "record a decision",
            });
        }

        self.status = match verdict {
            Verdict::Approve => ApprovalStatus::Approved,
            Verdict::Reject => ApprovalStatus::Rejected,
        };
        self.comments = comments.filter(|text| !text.trim().is_empty());
        self.decided_at = Some(at);
        self.decided_by = Some(by.clone());
        self.audit.touch(by, at);
        Ok(())
    }

    /// Closes a pending approval without notifying anyone, e.g. on withdrawal.
    pub(crate) fn withdraw(&mut self, reason: &str, by: &UserId, at: DateTime<Utc>) {
        self.status = ApprovalStatus::Rejected;
        self.comments = Some(reason.to_string());
        self.decided_at = Some(at);
        self.audit.touch(by, at);
    }
}
