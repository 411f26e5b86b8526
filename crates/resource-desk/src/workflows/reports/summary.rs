use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use super::views::{
    ApprovalDashboard, EmailAccountSummary, EquipmentInventorySummary, LoanReportSummary,
    OverdueLoanView, PendingApprovalView, ProvisionedAccountView, StatusCountEntry,
    TypeCountEntry, UserActivityEntry,
};
use crate::workflows::approvals::{Approvable, Approval, ApprovalStatus};
use crate::workflows::directory::{label_or_placeholder, User, UserId, NOT_STATED};
use crate::workflows::email::{EmailApplication, EmailApplicationStatus};
use crate::workflows::equipment::{AvailabilityStatus, Equipment, EquipmentType};
use crate::workflows::loans::{LoanApplication, LoanStatus, LoanTransaction};

fn name_of(users: &HashMap<&UserId, &User>, id: &UserId) -> String {
    users
        .get(id)
        .map(|user| user.name.clone())
        .unwrap_or_else(|| NOT_STATED.to_string())
}

#[derive(Debug, Default, Clone)]
pub struct TypeLoad {
    pub total: usize,
    pub available: usize,
    pub on_loan: usize,
}

#[derive(Debug, Default)]
pub struct EquipmentReport {
    pub by_availability: HashMap<AvailabilityStatus, usize>,
    pub by_type: HashMap<EquipmentType, TypeLoad>,
}

impl EquipmentReport {
    pub fn build(equipment: &[Equipment]) -> Self {
        let mut report = Self::default();
        for unit in equipment {
            *report
                .by_availability
                .entry(unit.availability_status)
                .or_default() += 1;
            let load = report.by_type.entry(unit.equipment_type).or_default();
            load.total += 1;
            match unit.availability_status {
                AvailabilityStatus::Available => load.available += 1,
                AvailabilityStatus::OnLoan => load.on_loan += 1,
                _ => {}
            }
        }
        report
    }

    fn count(&self, status: AvailabilityStatus) -> usize {
        self.by_availability.get(&status).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> EquipmentInventorySummary {
        let total: usize = self.by_availability.values().sum();
        let by_availability = AvailabilityStatus::ordered()
            .into_iter()
            .map(|status| StatusCountEntry {
                status: status.label(),
                count: self.count(status),
            })
            .collect();

        let by_type = EquipmentType::ordered()
            .into_iter()
            .filter_map(|kind| {
                self.by_type.get(&kind).map(|load| TypeCountEntry {
                    equipment_type: kind,
                    type_label: kind.label(),
                    total: load.total,
                    available: load.available,
                    on_loan: load.on_loan,
                })
            })
            .collect();

        let circulating = total
            - self.count(AvailabilityStatus::Retired)
            - self.count(AvailabilityStatus::Lost);
        let utilisation_pct = if circulating == 0 {
            0.0
        } else {
            let pct = self.count(AvailabilityStatus::OnLoan) as f32 / circulating as f32 * 100.0;
            (pct * 10.0).round() / 10.0
        };

        EquipmentInventorySummary {
            total,
            by_availability,
            by_type,
            utilisation_pct,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoanReport {
    pub by_status: HashMap<LoanStatus, usize>,
    pub open_transactions: usize,
    pub overdue: Vec<OverdueLoanView>,
}

impl LoanReport {
    /// Overdue is measured against `today` so units past due are listed even
    /// before the sweep has flagged them.
    pub fn build(
        loans: &[LoanApplication],
        transactions: &[LoanTransaction],
        users: &[User],
        today: NaiveDate,
    ) -> Self {
        let directory: HashMap<&UserId, &User> = users.iter().map(|user| (&user.id, user)).collect();
        let holders: HashMap<_, _> = loans
            .iter()
            .map(|loan| (&loan.id, loan.holder()))
            .collect();

        let mut report = Self::default();
        for loan in loans {
            *report.by_status.entry(loan.status).or_default() += 1;
        }

        for transaction in transactions.iter().filter(|txn| txn.is_open()) {
            report.open_transactions += 1;
            let days_overdue = transaction.days_overdue(today);
            if days_overdue == 0 {
                continue;
            }
            let holder_name = holders
                .get(&transaction.loan_application_id)
                .map(|holder| name_of(&directory, holder))
                .unwrap_or_else(|| NOT_STATED.to_string());
            report.overdue.push(OverdueLoanView {
                transaction_id: transaction.id.clone(),
                loan_application_id: transaction.loan_application_id.clone(),
                asset_tag: transaction.asset_tag.clone(),
                holder_name,
                due_date: transaction.due_date,
                days_overdue,
            });
        }
        report
            .overdue
            .sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue).then(a.asset_tag.cmp(&b.asset_tag)));
        report
    }

    pub fn summary(&self) -> LoanReportSummary {
        LoanReportSummary {
            total: self.by_status.values().sum(),
            by_status: LoanStatus::ordered()
                .into_iter()
                .map(|status| StatusCountEntry {
                    status: status.label(),
                    count: self.by_status.get(&status).copied().unwrap_or(0),
                })
                .collect(),
            open_transactions: self.open_transactions,
            overdue: self.overdue.clone(),
        }
    }
}

pub fn email_account_summary(
    applications: &[EmailApplication],
    users: &[User],
) -> EmailAccountSummary {
    let directory: HashMap<&UserId, &User> = users.iter().map(|user| (&user.id, user)).collect();
    let mut by_status: HashMap<EmailApplicationStatus, usize> = HashMap::new();
    let mut provisioned = Vec::new();

    for application in applications {
        *by_status.entry(application.status).or_default() += 1;
        if let (EmailApplicationStatus::Completed, Some(email)) =
            (application.status, &application.final_assigned_email)
        {
            provisioned.push(ProvisionedAccountView {
                application_id: application.id.clone(),
                applicant_name: name_of(&directory, &application.applicant_id),
                final_assigned_email: email.clone(),
                final_assigned_user_id: application.final_assigned_user_id.clone(),
            });
        }
    }
    provisioned.sort_by(|a, b| a.final_assigned_email.cmp(&b.final_assigned_email));

    EmailAccountSummary {
        total: applications.len(),
        by_status: EmailApplicationStatus::ordered()
            .into_iter()
            .map(|status| StatusCountEntry {
                status: status.label(),
                count: by_status.get(&status).copied().unwrap_or(0),
            })
            .collect(),
        provisioned,
    }
}

pub fn user_activity(
    users: &[User],
    emails: &[EmailApplication],
    loans: &[LoanApplication],
    approvals: &[Approval],
) -> Vec<UserActivityEntry> {
    let mut entries: Vec<UserActivityEntry> = users
        .iter()
        .map(|user| UserActivityEntry {
            user_id: user.id.clone(),
            name: user.name.clone(),
            department: label_or_placeholder(user.department.as_deref()).to_string(),
            email_applications: emails
                .iter()
                .filter(|app| app.applicant_id == user.id)
                .count(),
            loan_applications: loans
                .iter()
                .filter(|loan| loan.applicant_id == user.id)
                .count(),
            approvals_decided: approvals
                .iter()
                .filter(|approval| approval.decided_by.as_ref() == Some(&user.id))
                .count(),
            approvals_pending: approvals
                .iter()
                .filter(|approval| approval.is_pending() && approval.officer_id == user.id)
                .count(),
        })
        .collect();
    entries.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    entries
}

/// Pending work and decision counts for one officer.
pub fn approval_dashboard(
    officer: &User,
    approvals: &[Approval],
    applicants: &HashMap<Approvable, UserId>,
    users: &[User],
    now: DateTime<Utc>,
) -> ApprovalDashboard {
    let directory: HashMap<&UserId, &User> = users.iter().map(|user| (&user.id, user)).collect();

    let mut dashboard = ApprovalDashboard {
        officer_id: officer.id.clone(),
        officer_name: officer.name.clone(),
        pending: Vec::new(),
        approved: 0,
        rejected: 0,
    };

    for approval in approvals {
        if approval.decided_by.as_ref() == Some(&officer.id) {
            match approval.status {
                ApprovalStatus::Approved => dashboard.approved += 1,
                ApprovalStatus::Rejected => dashboard.rejected += 1,
                ApprovalStatus::Pending => {}
            }
        }
        if !approval.is_pending() || approval.officer_id != officer.id {
            continue;
        }

        let applicant_name = applicants
            .get(&approval.approvable)
            .map(|id| name_of(&directory, id))
            .unwrap_or_else(|| NOT_STATED.to_string());
        dashboard.pending.push(PendingApprovalView {
            approval_id: approval.id.clone(),
            application: approval.approvable.clone(),
            stage: approval.stage,
            stage_label: approval.stage.label(),
            applicant_name,
            requested_at: approval.audit.created_at,
            waiting_days: (now - approval.audit.created_at).num_days().max(0),
        });
    }
    dashboard
        .pending
        .sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
    dashboard
}
