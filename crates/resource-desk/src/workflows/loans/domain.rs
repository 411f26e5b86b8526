use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::approvals::domain::ApprovalStage;
use crate::workflows::audit::AuditFields;
use crate::workflows::directory::UserId;
use crate::workflows::equipment::domain::{AssetTag, EquipmentType, ReturnCondition};
use crate::workflows::error::{ValidationError, WorkflowError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanApplicationId(pub String);

impl LoanApplicationId {
    pub fn lock_key(&self) -> String {
        format!("loan:{}", self.0)
    }
}

impl fmt::Display for LoanApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Draft,
    PendingSupport,
    PendingHod,
    Approved,
    PartiallyIssued,
    Issued,
    Overdue,
    Returned,
    Rejected,
    Cancelled,
}

impl LoanStatus {
    pub const fn ordered() -> [Self; 10] {
        [
            Self::Draft,
            Self::PendingSupport,
            Self::PendingHod,
            Self::Approved,
            Self::PartiallyIssued,
            Self::Issued,
            Self::Overdue,
            Self::Returned,
            Self::Rejected,
            Self::Cancelled,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingSupport => "pending_support",
            Self::PendingHod => "pending_hod",
            Self::Approved => "approved",
            Self::PartiallyIssued => "partially_issued",
            Self::Issued => "issued",
            Self::Overdue => "overdue",
            Self::Returned => "returned",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn pending_stage(self) -> Option<ApprovalStage> {
        match self {
            Self::PendingSupport => Some(ApprovalStage::SupportReview),
            Self::PendingHod => Some(ApprovalStage::HodReview),
            _ => None,
        }
    }

    /// States in which equipment may still be issued or returned.
    pub const fn is_fulfilling(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::PartiallyIssued | Self::Issued | Self::Overdue
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanItemRequest {
    pub equipment_type: EquipmentType,
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSubmission {
    pub applicant_id: UserId,
    /// Officer accountable for the equipment when different from the applicant.
    #[serde(default)]
    pub responsible_officer_id: Option<UserId>,
    pub supporting_officer_id: UserId,
    pub purpose: String,
    pub location: String,
    pub loan_start_date: NaiveDate,
    pub loan_end_date: NaiveDate,
    pub items: Vec<LoanItemRequest>,
}

/// One requested line, tracked through approval, issue and return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApplicationItem {
    pub line: u32,
    pub equipment_type: EquipmentType,
    pub quantity_requested: u32,
    pub quantity_approved: u32,
    pub quantity_issued: u32,
    pub quantity_returned: u32,
    pub notes: Option<String>,
}

impl LoanApplicationItem {
    pub fn remaining_to_issue(&self) -> u32 {
        self.quantity_approved.saturating_sub(self.quantity_issued)
    }

    pub fn outstanding(&self) -> u32 {
        self.quantity_issued.saturating_sub(self.quantity_returned)
    }

    fn set_approved(&mut self, quantity: u32) -> Result<(), ValidationError> {
        if quantity > self.quantity_requested {
            return Err(ValidationError::QuantityExceeded {
                line: self.line,
                field: "quantity_approved",
                value: quantity,
                limit_field: "quantity_requested",
                limit: self.quantity_requested,
            });
        }
        self.quantity_approved = quantity;
        Ok(())
    }

    fn record_issue(&mut self) -> Result<(), ValidationError> {
        if self.quantity_issued + 1 > self.quantity_approved {
            return Err(ValidationError::QuantityExceeded {
                line: self.line,
                field: "quantity_issued",
                value: self.quantity_issued + 1,
                limit_field: "quantity_approved",
                limit: self.quantity_approved,
            });
        }
        self.quantity_issued += 1;
        Ok(())
    }

    fn record_return(&mut self) -> Result<(), ValidationError> {
        if self.quantity_returned + 1 > self.quantity_issued {
            return Err(ValidationError::QuantityExceeded {
                line: self.line,
                field: "quantity_returned",
                value: self.quantity_returned + 1,
                limit_field: "quantity_issued",
                limit: self.quantity_issued,
            });
        }
        self.quantity_returned += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedQuantity {
    pub line: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: LoanApplicationId,
    pub applicant_id: UserId,
    pub responsible_officer_id: Option<UserId>,
    pub supporting_officer_id: UserId,
    pub purpose: String,
    pub location: String,
    pub loan_start_date: NaiveDate,
    pub loan_end_date: NaiveDate,
    pub status: LoanStatus,
    pub items: Vec<LoanApplicationItem>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub audit: AuditFields,
    #[serde(default)]
    pub version: u64,
}

impl LoanApplication {
    pub fn draft(id: LoanApplicationId, submission: LoanSubmission, at: DateTime<Utc>) -> Self {
        let audit = AuditFields::new(&submission.applicant_id, at);
        let items = submission
            .items
            .into_iter()
            .zip(1u32..)
            .map(|(request, line)| LoanApplicationItem {
                line,
                equipment_type: request.equipment_type,
                quantity_requested: request.quantity,
                quantity_approved: 0,
                quantity_issued: 0,
                quantity_returned: 0,
                notes: request.notes,
            })
            .collect();

        Self {
            id,
            applicant_id: submission.applicant_id,
            responsible_officer_id: submission.responsible_officer_id,
            supporting_officer_id: submission.supporting_officer_id,
            purpose: submission.purpose.trim().to_string(),
            location: submission.location.trim().to_string(),
            loan_start_date: submission.loan_start_date,
            loan_end_date: submission.loan_end_date,
            status: LoanStatus::Draft,
            items,
            submitted_at: None,
            audit,
            version: 0,
        }
    }

    /// Person who physically holds issued equipment.
    pub fn holder(&self) -> &UserId {
        self.responsible_officer_id
            .as_ref()
            .unwrap_or(&self.applicant_id)
    }

    pub fn item(&self, line: u32) -> Option<&LoanApplicationItem> {
        self.items.iter().find(|item| item.line == line)
    }

    fn item_mut(&mut self, line: u32) -> Result<&mut LoanApplicationItem, ValidationError> {
        self.items
            .iter_mut()
            .find(|item| item.line == line)
            .ok_or(ValidationError::UnknownItem(line))
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidTransition {
            entity: "loan application",
            id: self.id.0.clone(),
            status: self.status.label(),
            action,
        }
    }

    fn transition(
        &mut self,
        action: &'static str,
        allowed: &[LoanStatus],
        next: LoanStatus,
    ) -> Result<(), WorkflowError> {
        if !allowed.contains(&self.status) {
            return Err(self.invalid(action));
        }
        self.status = next;
        Ok(())
    }

    pub fn submit(&mut self, at: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.transition("submit", &[LoanStatus::Draft], LoanStatus::PendingSupport)?;
        self.submitted_at = Some(at);
        Ok(())
    }

    pub fn advance_to(&mut self, next: ApprovalStage) -> Result<(), WorkflowError> {
        match next {
            ApprovalStage::HodReview => self.transition(
                "advance to the next approval stage",
                &[LoanStatus::PendingSupport],
                LoanStatus::PendingHod,
            ),
            _ => Err(self.invalid("enter a stage outside its approval chain")),
        }
    }

    /// Final approval. Every line is approved in full unless overridden.
    pub fn approve(&mut self, overrides: &[ApprovedQuantity]) -> Result<(), WorkflowError> {
        if self.status != LoanStatus::PendingHod {
            return Err(self.invalid("be approved"));
        }

        let mut items = self.items.clone();
        for item in &mut items {
            item.quantity_approved = item.quantity_requested;
        }
        for approved in overrides {
            items
                .iter_mut()
                .find(|item| item.line == approved.line)
                .ok_or(ValidationError::UnknownItem(approved.line))?
                .set_approved(approved.quantity)?;
        }

        self.items = items;
        self.status = LoanStatus::Approved;
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "be rejected",
            &[LoanStatus::PendingSupport, LoanStatus::PendingHod],
            LoanStatus::Rejected,
        )
    }

    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "be cancelled",
            &[
                LoanStatus::Draft,
                LoanStatus::PendingSupport,
                LoanStatus::PendingHod,
                LoanStatus::Approved,
            ],
            LoanStatus::Cancelled,
        )
    }

    pub fn record_issue(&mut self, line: u32) -> Result<(), WorkflowError> {
        if !matches!(
            self.status,
            LoanStatus::Approved | LoanStatus::PartiallyIssued | LoanStatus::Overdue
        ) {
            return Err(self.invalid("issue equipment"));
        }
        self.item_mut(line)?.record_issue()?;
        Ok(())
    }

    pub fn record_return(&mut self, line: u32) -> Result<(), WorkflowError> {
        if !self.status.is_fulfilling() {
            return Err(self.invalid("receive returned equipment"));
        }
        self.item_mut(line)?.record_return()?;
        Ok(())
    }

    /// Derives the fulfilment status from item quantities and open transactions.
    pub fn refresh_fulfilment(&mut self, overdue_open: bool) {
        if !self.status.is_fulfilling() {
            return;
        }

        let approved: u32 = self.items.iter().map(|item| item.quantity_approved).sum();
        let issued: u32 = self.items.iter().map(|item| item.quantity_issued).sum();
        let returned: u32 = self.items.iter().map(|item| item.quantity_returned).sum();

        self.status = if issued == 0 {
            LoanStatus::Approved
        } else if overdue_open && returned < issued {
            LoanStatus::Overdue
        } else if issued < approved {
            LoanStatus::PartiallyIssued
        } else if returned < issued {
            LoanStatus::Issued
        } else {
            LoanStatus::Returned
        };
    }

    pub fn status_view(&self) -> LoanApplicationView {
        LoanApplicationView {
            id: self.id.clone(),
            applicant_id: self.applicant_id.clone(),
            status: self.status.label(),
            pending_stage: self.status.pending_stage().map(ApprovalStage::label),
            loan_start_date: self.loan_start_date,
            loan_end_date: self.loan_end_date,
            items: self.items.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanApplicationView {
    pub id: LoanApplicationId,
    pub applicant_id: UserId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_stage: Option<&'static str>,
    pub loan_start_date: NaiveDate,
    pub loan_end_date: NaiveDate,
    pub items: Vec<LoanApplicationItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Issued,
    Returned,
    Overdue,
}

impl TransactionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Returned => "returned",
            Self::Overdue => "overdue",
        }
    }
}

/// Issue and return record for one physical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTransaction {
    pub id: TransactionId,
    pub loan_application_id: LoanApplicationId,
    pub line: u32,
    pub asset_tag: AssetTag,
    pub issuing_officer_id: UserId,
    pub receiving_officer_id: UserId,
    pub returning_officer_id: Option<UserId>,
    pub return_accepting_officer_id: Option<UserId>,
    pub issue_timestamp: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub return_timestamp: Option<DateTime<Utc>>,
    pub return_condition: Option<ReturnCondition>,
    pub accessories: Vec<String>,
    pub notes: Option<String>,
    pub status: TransactionStatus,
    pub audit: AuditFields,
    #[serde(default)]
    pub version: u64,
}

impl LoanTransaction {
    pub fn is_open(&self) -> bool {
        self.return_timestamp.is_none()
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_open() && today > self.due_date {
            (today - self.due_date).num_days()
        } else {
            0
        }
    }

    /// Flags an open transaction past its due date. Returns whether it changed.
    pub fn mark_overdue(&mut self, today: NaiveDate) -> bool {
        if self.status == TransactionStatus::Issued && self.days_overdue(today) > 0 {
            self.status = TransactionStatus::Overdue;
            true
        } else {
            false
        }
    }

    pub fn close(
        &mut self,
        condition: ReturnCondition,
        returned_by: UserId,
        accepted_by: &UserId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if !self.is_open() {
            return Err(WorkflowError::InvalidTransition {
                entity: "loan transaction",
                id: self.id.0.clone(),
                status: self.status.label(),
                action: "be returned again",
            });
        }
        if at < self.issue_timestamp {
            return Err(ValidationError::ReturnBeforeIssue {
                issued: self.issue_timestamp,
                returned: at,
            }
            .into());
        }

        self.status = TransactionStatus::Returned;
        self.return_timestamp = Some(at);
        self.return_condition = Some(condition);
        self.returning_officer_id = Some(returned_by);
        self.return_accepting_officer_id = Some(accepted_by.clone());
        if notes.is_some() {
            self.notes = notes;
        }
        self.audit.touch(accepted_by, at);
        Ok(())
    }
}
