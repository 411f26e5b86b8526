//! Read-only reports over the desk's repositories.

mod router;
mod summary;
pub mod views;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::workflows::approvals::Approvable;
use crate::workflows::directory::UserId;
use crate::workflows::error::WorkflowError;
use crate::workflows::repository::WorkflowRepository;

pub use router::report_router;
pub use summary::{
    approval_dashboard, email_account_summary, user_activity, EquipmentReport, LoanReport,
    TypeLoad,
};
pub use views::{
    ApprovalDashboard, EmailAccountSummary, EquipmentInventorySummary, LoanReportSummary,
    OverdueLoanView, PendingApprovalView, ProvisionedAccountView, StatusCountEntry,
    TypeCountEntry, UserActivityEntry,
};

pub struct ReportService<R> {
    repository: Arc<R>,
}

impl<R> ReportService<R>
where
    R: WorkflowRepository + 'static,
{
    pub(crate) fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn equipment_inventory(&self) -> Result<EquipmentInventorySummary, WorkflowError> {
        let equipment = self.repository.equipment_list()?;
        Ok(EquipmentReport::build(&equipment).summary())
    }

    pub fn loans(&self, today: NaiveDate) -> Result<LoanReportSummary, WorkflowError> {
        let loans = self.repository.loan_applications()?;
        let transactions = self.repository.transactions()?;
        let users = self.repository.users()?;
        Ok(LoanReport::build(&loans, &transactions, &users, today).summary())
    }

    pub fn email_accounts(&self) -> Result<EmailAccountSummary, WorkflowError> {
        let applications = self.repository.email_applications()?;
        let users = self.repository.users()?;
        Ok(email_account_summary(&applications, &users))
    }

    pub fn user_activity(&self) -> Result<Vec<UserActivityEntry>, WorkflowError> {
        Ok(user_activity(
            &self.repository.users()?,
            &self.repository.email_applications()?,
            &self.repository.loan_applications()?,
            &self.repository.approvals()?,
        ))
    }

    pub fn approval_dashboard(
        &self,
        officer: &UserId,
        now: DateTime<Utc>,
    ) -> Result<ApprovalDashboard, WorkflowError> {
        let officer = self
            .repository
            .user(officer)?
            .ok_or_else(|| WorkflowError::not_found("user", officer))?;

        let mut applicants: HashMap<Approvable, UserId> = HashMap::new();
        for application in self.repository.email_applications()? {
            applicants.insert(Approvable::Email(application.id), application.applicant_id);
        }
        for application in self.repository.loan_applications()? {
            applicants.insert(Approvable::Loan(application.id), application.applicant_id);
        }

        Ok(approval_dashboard(
            &officer,
            &self.repository.approvals()?,
            &applicants,
            &self.repository.users()?,
            now,
        ))
    }
}
