use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    LoanApplication, LoanApplicationId, LoanSubmission, LoanTransaction, TransactionId,
    TransactionStatus,
};
use crate::config::WorkflowConfig;
use crate::workflows::approvals::{Approvable, Approval, ApprovalService, ApprovalStage};
use crate::workflows::audit::AuditFields;
use crate::workflows::directory::{display_name, staff_with_roles, Role, User, UserId};
use crate::workflows::equipment::domain::{AssetTag, Equipment, ReturnCondition};
use crate::workflows::error::{ValidationError, WorkflowError};
use crate::workflows::locks::{hold, TransitionLocks};
use crate::workflows::notifications::{
    compose, dispatch, ApplicationContext, Notification, NotificationEvent, NotificationOutbox,
};
use crate::workflows::repository::{written, ChangeSet, WorkflowRepository};

static LOAN_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TRANSACTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_loan_id() -> LoanApplicationId {
    let id = LOAN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LoanApplicationId(format!("loan-{id:06}"))
}

fn next_transaction_id() -> TransactionId {
    let id = TRANSACTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TransactionId(format!("txn-{id:06}"))
}

/// Recorded as the editor of rows changed by scheduled jobs.
pub const SYSTEM_ACTOR: &str = "system";

const FULFILMENT_ROLES: [Role; 2] = [Role::BpmStaff, Role::Admin];

/// One physical unit handed over against an application line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueUnit {
    pub line: u32,
    pub asset_tag: AssetTag,
    #[serde(default)]
    pub accessories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub actor_id: UserId,
    /// Defaults to the responsible officer, then the applicant.
    #[serde(default)]
    pub receiving_officer_id: Option<UserId>,
    /// Defaults to the loan end date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub units: Vec<IssueUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnUnit {
    pub asset_tag: AssetTag,
    pub condition: ReturnCondition,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub actor_id: UserId,
    /// Defaults to the responsible officer, then the applicant.
    #[serde(default)]
    pub returning_officer_id: Option<UserId>,
    pub units: Vec<ReturnUnit>,
}

/// Result of an issue or return: the refreshed application and the
/// transactions written.
#[derive(Debug, Clone, Serialize)]
pub struct FulfilmentOutcome {
    pub application: LoanApplication,
    pub transactions: Vec<LoanTransaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverdueSweep {
    pub transactions_flagged: usize,
    pub loans_flagged: Vec<LoanApplicationId>,
}

/// ICT equipment loans from request through issue and return.
pub struct LoanService<R, N> {
    repository: Arc<R>,
    outbox: Arc<N>,
    config: Arc<WorkflowConfig>,
    locks: Arc<TransitionLocks>,
    approvals: Arc<ApprovalService<R, N>>,
}

impl<R, N> LoanService<R, N>
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    pub(crate) fn new(
        repository: Arc<R>,
        outbox: Arc<N>,
        config: Arc<WorkflowConfig>,
        locks: Arc<TransitionLocks>,
        approvals: Arc<ApprovalService<R, N>>,
    ) -> Self {
        Self {
            repository,
            outbox,
            config,
            locks,
            approvals,
        }
    }

    fn validate(&self, submission: &LoanSubmission) -> Result<(), WorkflowError> {
        if submission.purpose.trim().is_empty() {
            return Err(ValidationError::MissingField("purpose").into());
        }
        if submission.location.trim().is_empty() {
            return Err(ValidationError::MissingField("location").into());
        }

        let (start, end) = (submission.loan_start_date, submission.loan_end_date);
        if end < start {
            return Err(ValidationError::InvalidLoanPeriod { start, end }.into());
        }
        let days = (end - start).num_days() + 1;
        let max = self.config.max_loan_days;
        if days > i64::from(max) {
            return Err(ValidationError::LoanPeriodTooLong { days, max }.into());
        }

        if submission.items.is_empty() {
            return Err(ValidationError::NoItems.into());
        }
        if let Some(line) = submission
            .items
            .iter()
            .zip(1u32..)
            .find_map(|(item, line)| (item.quantity == 0).then_some(line))
        {
            return Err(ValidationError::ZeroQuantity { line }.into());
        }

        let applicant = self.approvals.user(&submission.applicant_id)?;
        if let Some(responsible) = &submission.responsible_officer_id {
            self.approvals.user(responsible)?;
        }
        self.approvals.resolve_officer(
            ApprovalStage::SupportReview,
            &applicant,
            &submission.supporting_officer_id,
        )?;
        Ok(())
    }

    pub fn draft(
        &self,
        submission: LoanSubmission,
        at: DateTime<Utc>,
    ) -> Result<LoanApplication, WorkflowError> {
        self.validate(&submission)?;
        let application = LoanApplication::draft(next_loan_id(), submission, at);
        let application = self.repository.insert_loan_application(application)?;
        info!(
            application = %application.id,
            applicant = %application.applicant_id,
            lines = application.items.len(),
            "loan application drafted"
        );
        Ok(application)
    }

    /// Sends a draft to its supporting officer.
    pub fn submit(
        &self,
        id: &LoanApplicationId,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<LoanApplication, WorkflowError> {
        let approvable = Approvable::Loan(id.clone());
        let slot = self.locks.slot(&id.lock_key());
        let _guard = hold(&slot);

        let mut application = self.get(id)?;
        let actor = self.approvals.user(actor)?;
        if actor.id != application.applicant_id && !actor.is_admin() {
            return Err(WorkflowError::not_authorized(&actor.id, "submit this application"));
        }

        let applicant = self.approvals.user(&application.applicant_id)?;
        let officer = self.approvals.resolve_officer(
            ApprovalStage::SupportReview,
            &applicant,
            &application.supporting_officer_id,
        )?;

        application.submit(at)?;
        application.audit.touch(&actor.id, at);
        let pending = self.approvals.stage_approval(
            &approvable,
            ApprovalStage::SupportReview,
            &officer,
            &applicant,
            at,
        )?;

        let mut changes = ChangeSet::default();
        changes.update_loan_application(application);
        changes.insert_approval(pending);
        let committed = self.repository.commit(changes)?;
        let application = written(
            committed.loan_applications.into_iter().next(),
            "loan application",
        )?;
        let pending = written(committed.approvals.into_iter().next(), "approval")?;
        info!(application = %application.id, status = application.status.label(), "loan application submitted");
        self.approvals
            .announce_stage(&pending, &officer, &applicant, application.status.label(), at);

        let context = ApplicationContext {
            reference: &approvable,
            status: application.status.label(),
            applicant_name: &applicant.name,
        };
        dispatch(
            self.outbox.as_ref(),
            [compose(
                &self.config,
                &applicant,
                &context,
                NotificationEvent::ApplicationSubmitted,
                at,
            )],
        );

        Ok(application)
    }

    pub fn submit_new(
        &self,
        submission: LoanSubmission,
        at: DateTime<Utc>,
    ) -> Result<LoanApplication, WorkflowError> {
        let applicant = submission.applicant_id.clone();
        let draft = self.draft(submission, at)?;
        self.submit(&draft.id, &applicant, at)
    }

    pub fn get(&self, id: &LoanApplicationId) -> Result<LoanApplication, WorkflowError> {
        self.repository
            .loan_application(id)?
            .ok_or_else(|| WorkflowError::not_found("loan application", id))
    }

    pub fn list(&self) -> Result<Vec<LoanApplication>, WorkflowError> {
        let mut applications = self.repository.loan_applications()?;
        applications.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(applications)
    }

    pub fn approvals(&self, id: &LoanApplicationId) -> Result<Vec<Approval>, WorkflowError> {
        self.get(id)?;
        self.approvals.for_application(&Approvable::Loan(id.clone()))
    }

    pub fn transactions(&self, id: &LoanApplicationId) -> Result<Vec<LoanTransaction>, WorkflowError> {
        self.get(id)?;
        let mut transactions = self.repository.transactions_for(id)?;
        transactions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(transactions)
    }

    /// Withdraws an application before any equipment leaves the store.
    pub fn cancel(
        &self,
        id: &LoanApplicationId,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<LoanApplication, WorkflowError> {
        let slot = self.locks.slot(&id.lock_key());
        let _guard = hold(&slot);

        let mut application = self.get(id)?;
        if &application.applicant_id != actor {
            return Err(WorkflowError::not_authorized(actor, "cancel this application"));
        }

        application.cancel()?;
        application.audit.touch(actor, at);
        let mut changes = ChangeSet::default();
        changes.update_loan_application(application);
        self.approvals
            .withdraw_pending(&Approvable::Loan(id.clone()), actor, at, &mut changes)?;
        let committed = self.repository.commit(changes)?;
        let application = written(
            committed.loan_applications.into_iter().next(),
            "loan application",
        )?;
        info!(application = %application.id, "loan application cancelled");
        Ok(application)
    }

    fn fulfilment_officer(&self, actor: &UserId, action: &'static str) -> Result<User, WorkflowError> {
        let actor = self.approvals.user(actor)?;
        if FULFILMENT_ROLES.iter().any(|role| actor.has_role(*role)) {
            Ok(actor)
        } else {
            Err(WorkflowError::not_authorized(&actor.id, action))
        }
    }

    /// Hands approved units to the borrower. All units are checked before any
    /// record is written.
    pub fn issue(
        &self,
        id: &LoanApplicationId,
        mut request: IssueRequest,
        at: DateTime<Utc>,
    ) -> Result<FulfilmentOutcome, WorkflowError> {
        for unit in &mut request.units {
            unit.asset_tag = unit.asset_tag.normalized();
        }
        if request.units.is_empty() {
            return Err(ValidationError::NoItems.into());
        }
        let mut seen = HashSet::new();
        for unit in &request.units {
            if !seen.insert(&unit.asset_tag) {
                return Err(ValidationError::DuplicateEquipment(unit.asset_tag.0.clone()).into());
            }
        }

        let loan_slot = self.locks.slot(&id.lock_key());
        let _loan_guard = hold(&loan_slot);
        let equipment_keys: Vec<String> = request
            .units
            .iter()
            .map(|unit| unit.asset_tag.lock_key())
            .collect();
        let equipment_slots = self.locks.slots(equipment_keys.iter().map(String::as_str));
        let _equipment_guards: Vec<_> = equipment_slots.iter().map(|slot| hold(slot)).collect();

        let actor = self.fulfilment_officer(&request.actor_id, "issue equipment")?;
        let mut application = self.get(id)?;
        let receiver = request
            .receiving_officer_id
            .clone()
            .unwrap_or_else(|| application.holder().clone());
        self.approvals.user(&receiver)?;
        let due_date = request.due_date.unwrap_or(application.loan_end_date);

        let mut units = Vec::with_capacity(request.units.len());
        for unit in &request.units {
            let mut equipment = self.equipment(&unit.asset_tag)?;
            let expected = application
                .item(unit.line)
                .ok_or(ValidationError::UnknownItem(unit.line))?
                .equipment_type;
            if equipment.equipment_type != expected {
                return Err(ValidationError::EquipmentTypeMismatch {
                    asset_tag: unit.asset_tag.0.clone(),
                    line: unit.line,
                    expected: expected.label(),
                    actual: equipment.equipment_type.label(),
                }
                .into());
            }
            application.record_issue(unit.line)?;
            equipment.check_out(&receiver)?;
            equipment.audit.touch(&actor.id, at);
            units.push((unit, equipment));
        }

        let existing = self.repository.transactions_for(id)?;
        let overdue_open = existing
            .iter()
            .any(|txn| txn.is_open() && txn.status == TransactionStatus::Overdue);
        application.refresh_fulfilment(overdue_open);
        application.audit.touch(&actor.id, at);

        let mut changes = ChangeSet::default();
        for (unit, equipment) in units {
            changes.update_equipment(equipment);
            changes.insert_transaction(LoanTransaction {
                id: next_transaction_id(),
                loan_application_id: id.clone(),
                line: unit.line,
                asset_tag: unit.asset_tag.clone(),
                issuing_officer_id: actor.id.clone(),
                receiving_officer_id: receiver.clone(),
                returning_officer_id: None,
                return_accepting_officer_id: None,
                issue_timestamp: at,
                due_date,
                return_timestamp: None,
                return_condition: None,
                accessories: unit.accessories.clone(),
                notes: request.notes.clone(),
                status: TransactionStatus::Issued,
                audit: AuditFields::new(&actor.id, at),
                version: 0,
            });
        }
        changes.update_loan_application(application);
        let committed = self.repository.commit(changes)?;
        let transactions = committed.transactions;
        let application = written(
            committed.loan_applications.into_iter().next(),
            "loan application",
        )?;
        info!(
            application = %application.id,
            units = transactions.len(),
            status = application.status.label(),
            officer = %actor.id,
            "equipment issued"
        );

        let notifications =
            self.borrower_notifications(&application, &transactions, at, |txn| {
                NotificationEvent::EquipmentIssued {
                    asset_tag: txn.asset_tag.clone(),
                    due_date: txn.due_date,
                }
            })?;
        dispatch(self.outbox.as_ref(), notifications);

        Ok(FulfilmentOutcome {
            application,
            transactions,
        })
    }

    /// Takes units back. Damaged or lost units are reported to BPM staff and
    /// administrators.
    pub fn record_return(
        &self,
        id: &LoanApplicationId,
        mut request: ReturnRequest,
        at: DateTime<Utc>,
    ) -> Result<FulfilmentOutcome, WorkflowError> {
        for unit in &mut request.units {
            unit.asset_tag = unit.asset_tag.normalized();
        }
        if request.units.is_empty() {
            return Err(ValidationError::NoItems.into());
        }
        let mut seen = HashSet::new();
        for unit in &request.units {
            if !seen.insert(&unit.asset_tag) {
                return Err(ValidationError::DuplicateEquipment(unit.asset_tag.0.clone()).into());
            }
        }

        let loan_slot = self.locks.slot(&id.lock_key());
        let _loan_guard = hold(&loan_slot);
        let equipment_keys: Vec<String> = request
            .units
            .iter()
            .map(|unit| unit.asset_tag.lock_key())
            .collect();
        let equipment_slots = self.locks.slots(equipment_keys.iter().map(String::as_str));
        let _equipment_guards: Vec<_> = equipment_slots.iter().map(|slot| hold(slot)).collect();

        let actor = self.fulfilment_officer(&request.actor_id, "receive returned equipment")?;
        let mut application = self.get(id)?;
        let returned_by = request
            .returning_officer_id
            .clone()
            .unwrap_or_else(|| application.holder().clone());

        let mut open: Vec<LoanTransaction> = self
            .repository
            .transactions_for(id)?
            .into_iter()
            .filter(LoanTransaction::is_open)
            .collect();

        let mut closed = Vec::with_capacity(request.units.len());
        for unit in &request.units {
            let position = open
                .iter()
                .position(|txn| txn.asset_tag == unit.asset_tag)
                .ok_or_else(|| WorkflowError::not_found("open loan transaction", &unit.asset_tag))?;
            let mut transaction = open.swap_remove(position);
            transaction.close(
                unit.condition,
                returned_by.clone(),
                &actor.id,
                unit.notes.clone(),
                at,
            )?;

            let mut equipment = self.equipment(&unit.asset_tag)?;
            equipment.check_in(unit.condition)?;
            equipment.audit.touch(&actor.id, at);
            application.record_return(transaction.line)?;
            closed.push((transaction, equipment));
        }

        let overdue_open = open
            .iter()
            .any(|txn| txn.status == TransactionStatus::Overdue);
        application.refresh_fulfilment(overdue_open);
        application.audit.touch(&actor.id, at);

        let mut changes = ChangeSet::default();
        for (transaction, equipment) in closed {
            changes.update_equipment(equipment);
            changes.update_transaction(transaction);
        }
        changes.update_loan_application(application);
        let committed = self.repository.commit(changes)?;
        let transactions = committed.transactions;
        let application = written(
            committed.loan_applications.into_iter().next(),
            "loan application",
        )?;
        info!(
            application = %application.id,
            units = transactions.len(),
            status = application.status.label(),
            officer = %actor.id,
            "equipment returned"
        );

        let mut notifications =
            self.borrower_notifications(&application, &transactions, at, |txn| {
                NotificationEvent::EquipmentReturned {
                    asset_tag: txn.asset_tag.clone(),
                    condition: txn.return_condition.unwrap_or(ReturnCondition::Good),
                }
            })?;
        notifications.extend(self.incident_notifications(&application, &transactions, at)?);
        dispatch(self.outbox.as_ref(), notifications);

        Ok(FulfilmentOutcome {
            application,
            transactions,
        })
    }

    /// Flags open transactions past their due date and reminds the borrower.
    pub fn sweep_overdue(
        &self,
        today: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<OverdueSweep, WorkflowError> {
        let mut candidates: Vec<LoanApplicationId> = self
            .repository
            .transactions()?
            .into_iter()
            .filter(|txn| txn.status == TransactionStatus::Issued && txn.days_overdue(today) > 0)
            .map(|txn| txn.loan_application_id)
            .collect();
        candidates.sort();
        candidates.dedup();

        let sweeper = UserId(SYSTEM_ACTOR.to_string());
        let mut sweep = OverdueSweep::default();
        for id in candidates {
            let slot = self.locks.slot(&id.lock_key());
            let _guard = hold(&slot);

            let mut changes = ChangeSet::default();
            for mut transaction in self.repository.transactions_for(&id)? {
                if transaction.mark_overdue(today) {
                    transaction.audit.touch(&sweeper, at);
                    changes.update_transaction(transaction);
                }
            }
            if changes.is_empty() {
                continue;
            }

            let mut application = self.get(&id)?;
            let before = application.status;
            application.refresh_fulfilment(true);
            let status_changed = application.status != before;
            if status_changed {
                application.audit.touch(&sweeper, at);
                changes.update_loan_application(application.clone());
            }
            let committed = self.repository.commit(changes)?;
            let flagged = committed.transactions;
            let application = if status_changed {
                written(
                    committed.loan_applications.into_iter().next(),
                    "loan application",
                )?
            } else {
                application
            };
            info!(
                application = %application.id,
                units = flagged.len(),
                status = application.status.label(),
                "loan flagged overdue"
            );

            let notifications =
                self.borrower_notifications(&application, &flagged, at, |txn| {
                    NotificationEvent::EquipmentOverdue {
                        asset_tag: txn.asset_tag.clone(),
                        due_date: txn.due_date,
                        days_overdue: txn.days_overdue(today),
                    }
                })?;
            dispatch(self.outbox.as_ref(), notifications);

            sweep.transactions_flagged += flagged.len();
            sweep.loans_flagged.push(application.id);
        }

        if sweep.transactions_flagged > 0 {
            warn!(
                transactions = sweep.transactions_flagged,
                loans = sweep.loans_flagged.len(),
                %today,
                "overdue equipment outstanding"
            );
        }
        Ok(sweep)
    }

    fn equipment(&self, tag: &AssetTag) -> Result<Equipment, WorkflowError> {
        self.repository
            .equipment(tag)?
            .ok_or_else(|| WorkflowError::not_found("equipment", tag))
    }

    /// Applicant plus the responsible officer when someone else holds the units.
    fn borrowers(&self, application: &LoanApplication) -> Result<Vec<User>, WorkflowError> {
        let mut borrowers = Vec::new();
        if let Some(applicant) = self.repository.user(&application.applicant_id)? {
            borrowers.push(applicant);
        }
        if let Some(responsible) = application
            .responsible_officer_id
            .as_ref()
            .filter(|officer| **officer != application.applicant_id)
        {
            if let Some(user) = self.repository.user(responsible)? {
                borrowers.push(user);
            }
        }
        Ok(borrowers)
    }

    fn borrower_notifications<F>(
        &self,
        application: &LoanApplication,
        transactions: &[LoanTransaction],
        at: DateTime<Utc>,
        event: F,
    ) -> Result<Vec<Notification>, WorkflowError>
    where
        F: Fn(&LoanTransaction) -> NotificationEvent,
    {
        let borrowers = self.borrowers(application)?;
        let applicant = borrowers
            .iter()
            .find(|user| user.id == application.applicant_id);
        let reference = Approvable::Loan(application.id.clone());
        let context = ApplicationContext {
            reference: &reference,
            status: application.status.label(),
            applicant_name: display_name(applicant),
        };

        let mut notifications = Vec::with_capacity(transactions.len() * borrowers.len());
        for transaction in transactions {
            for borrower in &borrowers {
                notifications.push(compose(
                    &self.config,
                    borrower,
                    &context,
                    event(transaction),
                    at,
                ));
            }
        }
        Ok(notifications)
    }

    fn incident_notifications(
        &self,
        application: &LoanApplication,
        transactions: &[LoanTransaction],
        at: DateTime<Utc>,
    ) -> Result<Vec<Notification>, WorkflowError> {
        let incidents: Vec<(&AssetTag, ReturnCondition)> = transactions
            .iter()
            .filter_map(|txn| {
                txn.return_condition
                    .filter(|condition| condition.is_incident())
                    .map(|condition| (&txn.asset_tag, condition))
            })
            .collect();
        if incidents.is_empty() {
            return Ok(Vec::new());
        }

        let applicant = self.repository.user(&application.applicant_id)?;
        let reference = Approvable::Loan(application.id.clone());
        let context = ApplicationContext {
            reference: &reference,
            status: application.status.label(),
            applicant_name: display_name(applicant.as_ref()),
        };
        let staff = staff_with_roles(self.repository.as_ref(), &[Role::BpmStaff, Role::Admin])?;

        let mut notifications = Vec::new();
        for (asset_tag, condition) in incidents {
            warn!(
                application = %application.id,
                asset_tag = %asset_tag,
                condition = condition.label(),
                "equipment incident reported on return"
            );
            for user in &staff {
                notifications.push(compose(
                    &self.config,
                    user,
                    &context,
                    NotificationEvent::EquipmentIncident {
                        asset_tag: asset_tag.clone(),
                        condition,
                    },
                    at,
                ));
            }
        }
        Ok(notifications)
    }
}
