use std::sync::Arc;

use axum::Router;

use super::approvals::{approval_router, ApprovalService};
use super::email::{email_router, EmailApplicationService};
use super::equipment::{equipment_router, InventoryService};
use super::loans::{loan_router, LoanService};
use super::locks::TransitionLocks;
use super::notifications::NotificationOutbox;
use super::reports::{report_router, ReportService};
use super::repository::WorkflowRepository;
use crate::config::WorkflowConfig;

/// Every workflow service wired to one repository, one outbox and one set of
/// transition locks.
pub struct ResourceDesk<R, N> {
    approvals: Arc<ApprovalService<R, N>>,
    email: Arc<EmailApplicationService<R, N>>,
    loans: Arc<LoanService<R, N>>,
    inventory: Arc<InventoryService<R>>,
    reports: Arc<ReportService<R>>,
}

impl<R, N> ResourceDesk<R, N>
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    pub fn new(repository: Arc<R>, outbox: Arc<N>, config: WorkflowConfig) -> Self {
        let config = Arc::new(config);
        let locks = Arc::new(TransitionLocks::default());
        let approvals = Arc::new(ApprovalService::new(
            Arc::clone(&repository),
            Arc::clone(&outbox),
            Arc::clone(&config),
            Arc::clone(&locks),
        ));
        let email = Arc::new(EmailApplicationService::new(
            Arc::clone(&repository),
            Arc::clone(&outbox),
            Arc::clone(&config),
            Arc::clone(&locks),
            Arc::clone(&approvals),
        ));
        let loans = Arc::new(LoanService::new(
            Arc::clone(&repository),
            outbox,
            config,
            Arc::clone(&locks),
            Arc::clone(&approvals),
        ));
        let inventory = Arc::new(InventoryService::new(Arc::clone(&repository), locks));
        let reports = Arc::new(ReportService::new(repository));

        Self {
            approvals,
            email,
            loans,
            inventory,
            reports,
        }
    }

    pub fn approvals(&self) -> &ApprovalService<R, N> {
        &self.approvals
    }

    pub fn email(&self) -> &EmailApplicationService<R, N> {
        &self.email
    }

    pub fn loans(&self) -> &LoanService<R, N> {
        &self.loans
    }

    pub fn inventory(&self) -> &InventoryService<R> {
        &self.inventory
    }

    pub fn reports(&self) -> &ReportService<R> {
        &self.reports
    }

    /// All `/api/v1` workflow routes.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(approval_router(Arc::clone(&self.approvals)))
            .merge(email_router(Arc::clone(&self.email)))
            .merge(loan_router(Arc::clone(&self.loans)))
            .merge(equipment_router(Arc::clone(&self.inventory)))
            .merge(report_router(Arc::clone(&self.reports)))
    }
}
