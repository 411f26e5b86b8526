use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::workflows::approvals::{Approvable, ApprovalId, ApprovalStage};
use crate::workflows::directory::UserId;
use crate::workflows::email::EmailApplicationId;
use crate::workflows::equipment::{AssetTag, EquipmentType};
use crate::workflows::loans::{LoanApplicationId, TransactionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCountEntry {
    pub status: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCountEntry {
    pub equipment_type: EquipmentType,
    pub type_label: &'static str,
    pub total: usize,
    pub available: usize,
    pub on_loan: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EquipmentInventorySummary {
    pub total: usize,
    pub by_availability: Vec<StatusCountEntry>,
    pub by_type: Vec<TypeCountEntry>,
    /// Share of units in circulation (not retired or lost) that are on loan.
    pub utilisation_pct: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueLoanView {
    pub transaction_id: TransactionId,
    pub loan_application_id: LoanApplicationId,
    pub asset_tag: AssetTag,
    pub holder_name: String,
    pub due_date: NaiveDate,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanReportSummary {
    pub total: usize,
    pub by_status: Vec<StatusCountEntry>,
    pub open_transactions: usize,
    pub overdue: Vec<OverdueLoanView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedAccountView {
    pub application_id: EmailApplicationId,
    pub applicant_name: String,
    pub final_assigned_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_assigned_user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailAccountSummary {
    pub total: usize,
    pub by_status: Vec<StatusCountEntry>,
    pub provisioned: Vec<ProvisionedAccountView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserActivityEntry {
    pub user_id: UserId,
    pub name: String,
    pub department: String,
    pub email_applications: usize,
    pub loan_applications: usize,
    pub approvals_decided: usize,
    pub approvals_pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingApprovalView {
    pub approval_id: ApprovalId,
    pub application: Approvable,
    pub stage: ApprovalStage,
    pub stage_label: &'static str,
    pub applicant_name: String,
    pub requested_at: DateTime<Utc>,
    pub waiting_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalDashboard {
    pub officer_id: UserId,
    pub officer_name: String,
    pub pending: Vec<PendingApprovalView>,
    pub approved: usize,
    pub rejected: usize,
}
