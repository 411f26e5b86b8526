use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{Approvable, Approval, ApprovalId, ApprovalStage, ApprovalStatus, Verdict};
use crate::config::WorkflowConfig;
use crate::workflows::audit::AuditFields;
use crate::workflows::directory::{display_name, staff_with_roles, Role, User, UserId};
use crate::workflows::email::domain::EmailApplication;
use crate::workflows::error::{ValidationError, WorkflowError};
use crate::workflows::loans::domain::{ApprovedQuantity, LoanApplication};
use crate::workflows::locks::{hold, TransitionLocks};
use crate::workflows::notifications::{
    compose, dispatch, ApplicationContext, Notification, NotificationEvent, NotificationOutbox,
};
use crate::workflows::repository::{written, ChangeSet, Committed, WorkflowRepository};

static APPROVAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_approval_id() -> ApprovalId {
    let id = APPROVAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApprovalId(format!("apr-{id:06}"))
}

/// Officer decision on a pending approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub officer_id: UserId,
    pub verdict: Verdict,
    #[serde(default)]
    pub comments: Option<String>,
    /// Only honoured on the final stage of a loan application.
    #[serde(default)]
    pub approved_quantities: Vec<ApprovedQuantity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub approval: Approval,
    pub application_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_approval: Option<Approval>,
}

/// Records officer sign-offs and cascades them to the owning application.
pub struct ApprovalService<R, N> {
    repository: Arc<R>,
    outbox: Arc<N>,
    config: Arc<WorkflowConfig>,
    locks: Arc<TransitionLocks>,
}

impl<R, N> ApprovalService<R, N>
where
    R: WorkflowRepository + 'static,
    N: NotificationOutbox + 'static,
{
    pub(crate) fn new(
        repository: Arc<R>,
        outbox: Arc<N>,
        config: Arc<WorkflowConfig>,
        locks: Arc<TransitionLocks>,
    ) -> Self {
        Self {
            repository,
            outbox,
            config,
            locks,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub(crate) fn user(&self, id: &UserId) -> Result<User, WorkflowError> {
        self.repository
            .user(id)?
            .ok_or_else(|| WorkflowError::not_found("user", id))
    }

    /// Picks the officer who signs off `stage` for `applicant`.
    pub(crate) fn resolve_officer(
        &self,
        stage: ApprovalStage,
        applicant: &User,
        nominated: &UserId,
    ) -> Result<User, WorkflowError> {
        let Some(role) = stage.required_role() else {
            let officer = self.user(nominated)?;
            if officer.id == applicant.id {
                return Err(ValidationError::SelfSupport.into());
            }
            let minimum = self.config.minimum_supporting_grade;
            if !officer.grade_at_least(minimum) {
                return Err(ValidationError::SupportingOfficerGrade {
                    officer: officer.id.0,
                    minimum,
                }
                .into());
            }
            return Ok(officer);
        };

        let candidates: Vec<User> = staff_with_roles(self.repository.as_ref(), &[role])?
            .into_iter()
            .filter(|user| user.id != applicant.id)
            .collect();

        candidates
            .iter()
            .find(|user| user.shares_department_with(applicant))
            .or_else(|| candidates.first())
            .cloned()
            .ok_or(WorkflowError::NoOfficerAvailable {
                stage: stage.label(),
            })
    }

    /// Builds the single pending approval for `stage`. The caller commits it
    /// and then calls [`Self::announce_stage`].
    pub(crate) fn stage_approval(
        &self,
        approvable: &Approvable,
        stage: ApprovalStage,
        officer: &User,
        applicant: &User,
        at: DateTime<Utc>,
    ) -> Result<Approval, WorkflowError> {
        let already_pending = self
            .repository
            .approvals_for(approvable)?
            .iter()
            .any(|approval| approval.stage == stage && approval.is_pending());
        if already_pending {
            return Err(WorkflowError::DuplicatePendingApproval {
                approvable: approvable.to_string(),
                stage: stage.label(),
            });
        }

        Ok(Approval::pending(
            next_approval_id(),
            approvable.clone(),
            stage,
            officer.id.clone(),
            AuditFields::new(&applicant.id, at),
        ))
    }

    /// Asks the officer of a committed pending approval to act.
    pub(crate) fn announce_stage(
        &self,
        approval: &Approval,
        officer: &User,
        applicant: &User,
        application_status: &'static str,
        at: DateTime<Utc>,
    ) {
        info!(
            approval = %approval.id,
            application = %approval.approvable,
            stage = approval.stage.label(),
            officer = %officer.id,
            "approval stage opened"
        );

        let context = ApplicationContext {
            reference: &approval.approvable,
            status: application_status,
            applicant_name: &applicant.name,
        };
        dispatch(
            self.outbox.as_ref(),
            [compose(
                &self.config,
                officer,
                &context,
                NotificationEvent::ApprovalRequested {
                    stage: approval.stage,
                },
                at,
            )],
        );
    }

    /// Stages the closing of any pending approvals of a withdrawn application.
    /// Nobody is notified.
    pub(crate) fn withdraw_pending(
        &self,
        approvable: &Approvable,
        by: &UserId,
        at: DateTime<Utc>,
        changes: &mut ChangeSet,
    ) -> Result<(), WorkflowError> {
        for mut approval in self
            .repository
            .approvals_for(approvable)?
            .into_iter()
            .filter(Approval::is_pending)
        {
            approval.withdraw("withdrawn by applicant", by, at);
            changes.update_approval(approval);
        }
        Ok(())
    }

    /// Applies an officer decision and cascades it to the application.
    pub fn decide(
        &self,
        approval_id: &ApprovalId,
        request: DecisionRequest,
        at: DateTime<Utc>,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let approvable = self.approval(approval_id)?.approvable;
        let slot = self.locks.slot(&approvable.lock_key());
        let _guard = hold(&slot);

        // Re-read under the lock; the first read only located the application.
        let mut approval = self.approval(approval_id)?;
        if !approval.is_pending() {
            return Err(WorkflowError::InvalidTransition {
                entity: "approval",
                id: approval.id.0.clone(),
                status: approval.status.label(),
                action: "record a decision",
            });
        }

        let officer = self.user(&request.officer_id)?;
        authorize(&officer, &approval)?;

        let mut subject = Subject::load(self.repository.as_ref(), &approvable)?;
        if subject.pending_stage() != Some(approval.stage) {
            return Err(WorkflowError::InvalidTransition {
                entity: subject.entity(),
                id: approvable.id().to_string(),
                status: subject.status_label(),
                action: "accept a decision for this stage",
            });
        }
        let applicant = self.repository.user(subject.applicant_id())?;

        let mut next_officer = None;
        let mut next_pending = None;
        match request.verdict {
            Verdict::Reject => subject.reject()?,
            Verdict::Approve => match approvable.kind().next_stage(approval.stage) {
                Some(next_stage) => {
                    if !request.approved_quantities.is_empty() {
                        return Err(ValidationError::UnexpectedQuantities.into());
                    }
                    let applicant = applicant
                        .as_ref()
                        .ok_or_else(|| WorkflowError::not_found("user", subject.applicant_id()))?;
                    let officer = self.resolve_officer(
                        next_stage,
                        applicant,
                        subject.supporting_officer_id(),
                    )?;
                    subject.advance_to(next_stage)?;
                    next_pending = Some(self.stage_approval(
                        &approvable,
                        next_stage,
                        &officer,
                        applicant,
                        at,
                    )?);
                    next_officer = Some(officer);
                }
                None => subject.approve(&request.approved_quantities)?,
            },
        }

        approval.record(request.verdict, request.comments, &officer.id, at)?;
        subject.touch(&officer.id, at);

        let mut changes = ChangeSet::default();
        changes.update_approval(approval);
        subject.stage(&mut changes);
        if let Some(pending) = next_pending {
            changes.insert_approval(pending);
        }
        let committed = self.repository.commit(changes)?;
        let subject = subject.committed(&committed)?;
        let mut approvals = committed.approvals.into_iter();
        let approval = written(approvals.next(), "approval")?;
        let next_approval = approvals.next();
        info!(
            approval = %approval.id,
            application = %approvable,
            stage = approval.stage.label(),
            decision = approval.status.label(),
            status = subject.status_label(),
            "approval decided"
        );

        if let (Some(pending), Some(next_officer), Some(applicant)) =
            (&next_approval, &next_officer, applicant.as_ref())
        {
            self.announce_stage(pending, next_officer, applicant, subject.status_label(), at);
        }

        let notifications = self.decision_notifications(
            &approvable,
            &approval,
            &subject,
            applicant.as_ref(),
            next_approval.is_none(),
            at,
        )?;
        dispatch(self.outbox.as_ref(), notifications);

        Ok(DecisionOutcome {
            approval,
            application_status: subject.status_label(),
            next_approval,
        })
    }

    fn decision_notifications(
        &self,
        approvable: &Approvable,
        approval: &Approval,
        subject: &Subject,
        applicant: Option<&User>,
        chain_finished: bool,
        at: DateTime<Utc>,
    ) -> Result<Vec<Notification>, WorkflowError> {
        let context = ApplicationContext {
            reference: approvable,
            status: subject.status_label(),
            applicant_name: display_name(applicant),
        };
        let mut notifications = Vec::new();

        if approval.status == ApprovalStatus::Rejected {
            if let Some(applicant) = applicant {
                notifications.push(compose(
                    &self.config,
                    applicant,
                    &context,
                    NotificationEvent::ApplicationRejected {
                        stage: approval.stage,
                        comments: approval.comments.clone(),
                    },
                    at,
                ));
            }
            return Ok(notifications);
        }

        if !chain_finished {
            return Ok(notifications);
        }

        if let Some(applicant) = applicant {
            notifications.push(compose(
                &self.config,
                applicant,
                &context,
                NotificationEvent::ApplicationApproved,
                at,
            ));
        }

        let (roles, event): (&[Role], NotificationEvent) = match subject {
            Subject::Email(_) => (
                &[Role::BpmStaff, Role::ItAdmin],
                NotificationEvent::ReadyForProvisioning,
            ),
            Subject::Loan(_) => (&[Role::BpmStaff], NotificationEvent::ReadyForIssuance),
        };
        for staff in staff_with_roles(self.repository.as_ref(), roles)? {
            notifications.push(compose(&self.config, &staff, &context, event.clone(), at));
        }

        Ok(notifications)
    }

    pub fn approval(&self, id: &ApprovalId) -> Result<Approval, WorkflowError> {
        self.repository
            .approval(id)?
            .ok_or_else(|| WorkflowError::not_found("approval", id))
    }

    /// Approvals still waiting on `officer`, oldest first.
    pub fn pending_for(&self, officer: &UserId) -> Result<Vec<Approval>, WorkflowError> {
        let mut pending: Vec<Approval> = self
            .repository
            .approvals()?
            .into_iter()
            .filter(|approval| approval.is_pending() && &approval.officer_id == officer)
            .collect();
        pending.sort_by(|a, b| a.audit.created_at.cmp(&b.audit.created_at));
        Ok(pending)
    }

    /// Decisions `officer` has recorded, most recent first.
    pub fn history_for(&self, officer: &UserId) -> Result<Vec<Approval>, WorkflowError> {
        let mut decided: Vec<Approval> = self
            .repository
            .approvals()?
            .into_iter()
            .filter(|approval| approval.decided_by.as_ref() == Some(officer))
            .collect();
        decided.sort_by(|a, b| b.decided_at.cmp(&a.decided_at));
        Ok(decided)
    }

    pub fn for_application(&self, approvable: &Approvable) -> Result<Vec<Approval>, WorkflowError> {
        let mut approvals = self.repository.approvals_for(approvable)?;
        approvals.sort_by(|a, b| a.audit.created_at.cmp(&b.audit.created_at));
        Ok(approvals)
    }
}

fn authorize(officer: &User, approval: &Approval) -> Result<(), WorkflowError> {
    let assigned = officer.id == approval.officer_id;
    let holds_stage_role = approval
        .stage
        .required_role()
        .is_some_and(|role| officer.has_role(role));

    if assigned || holds_stage_role || officer.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::not_authorized(
            &officer.id,
            "decide this approval",
        ))
    }
}

/// The application behind an approval, loaded for a transition.
enum Subject {
    Email(EmailApplication),
    Loan(LoanApplication),
}

impl Subject {
    fn load<R>(repository: &R, approvable: &Approvable) -> Result<Self, WorkflowError>
    where
        R: WorkflowRepository + ?Sized,
    {
        match approvable {
            Approvable::Email(id) => repository
                .email_application(id)?
                .map(Self::Email)
                .ok_or_else(|| WorkflowError::not_found("email application", id)),
            Approvable::Loan(id) => repository
                .loan_application(id)?
                .map(Self::Loan)
                .ok_or_else(|| WorkflowError::not_found("loan application", id)),
        }
    }

    fn entity(&self) -> &'static str {
        match self {
            Self::Email(_) => "email application",
            Self::Loan(_) => "loan application",
        }
    }

    fn applicant_id(&self) -> &UserId {
        match self {
            Self::Email(app) => &app.applicant_id,
            Self::Loan(app) => &app.applicant_id,
        }
    }

    fn supporting_officer_id(&self) -> &UserId {
        match self {
            Self::Email(app) => &app.supporting_officer_id,
            Self::Loan(app) => &app.supporting_officer_id,
        }
    }

    fn pending_stage(&self) -> Option<ApprovalStage> {
        match self {
            Self::Email(app) => app.status.pending_stage(),
            Self::Loan(app) => app.status.pending_stage(),
        }
    }

    fn status_label(&self) -> &'static str {
        match self {
            Self::Email(app) => app.status.label(),
            Self::Loan(app) => app.status.label(),
        }
    }

    fn advance_to(&mut self, next: ApprovalStage) -> Result<(), WorkflowError> {
        match self {
            Self::Email(app) => app.advance_to(next),
            Self::Loan(app) => app.advance_to(next),
        }
    }

    fn approve(&mut self, quantities: &[ApprovedQuantity]) -> Result<(), WorkflowError> {
        match self {
            Self::Email(_) if !quantities.is_empty() => {
                Err(ValidationError::UnexpectedQuantities.into())
            }
            Self::Email(app) => app.approve(),
            Self::Loan(app) => app.approve(quantities),
        }
    }

    fn reject(&mut self) -> Result<(), WorkflowError> {
        match self {
            Self::Email(app) => app.reject(),
            Self::Loan(app) => app.reject(),
        }
    }

    fn touch(&mut self, by: &UserId, at: DateTime<Utc>) {
        match self {
            Self::Email(app) => app.audit.touch(by, at),
            Self::Loan(app) => app.audit.touch(by, at),
        }
    }

    fn stage(&self, changes: &mut ChangeSet) {
        match self {
            Self::Email(app) => changes.update_email_application(app.clone()),
            Self::Loan(app) => changes.update_loan_application(app.clone()),
        }
    }

    /// The same application as written by `committed`.
    fn committed(self, committed: &Committed) -> Result<Self, WorkflowError> {
        Ok(match self {
            Self::Email(_) => Self::Email(written(
                committed.email_applications.first().cloned(),
                "email application",
            )?),
            Self::Loan(_) => Self::Loan(written(
                committed.loan_applications.first().cloned(),
                "loan application",
            )?),
        })
    }
}
