use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    validate_org_email, EmailApplication, EmailApplicationId, EmailApplicationSubmission,
};
use crate::config::WorkflowConfig;
use crate::workflows::approvals::{Approvable, Approval, ApprovalService, ApprovalStage};
use crate::workflows::directory::{display_name, staff_with_roles, Role, User, UserId};
use crate::workflows::error::{ValidationError, WorkflowError};
use crate::workflows::locks::{hold, TransitionLocks};
use crate::workflows::notifications::{
    compose, dispatch, ApplicationContext, NotificationEvent, NotificationOutbox,
};
use crate::workflows::repository::{written, ChangeSet, WorkflowRepository};

static EMAIL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_email_application_id() -> EmailApplicationId {
    let id = EMAIL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EmailApplicationId(format!("email-{id:06}"))
}

/// Identifies who is performing an action with no other payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRequest {
    pub actor_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningCompletion {
    pub actor_id: UserId,
    pub assigned_email: String,
    #[serde(default)]
    pub assigned_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningFailure {
    pub actor_id: UserId,
    pub reason: String,
}

const PROVISIONING_ROLES: [Role; 3] = [Role::BpmStaff, Role::ItAdmin, Role::Admin];

/// Email account / user ID applications from draft to provisioned account.
pub struct EmailApplicationService<R, N> {
    repository: Arc<R>,
    outbox: Arc<N>,
    config: Arc<WorkflowConfig>,
    locks: Arc<TransitionLocks>,
    approvals: Arc<ApprovalService<R, N>>,
}

impl<R, N> EmailApplicationService<R, N>
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

    fn validate(&self, submission: &EmailApplicationSubmission) -> Result<User, WorkflowError> {
        if submission.purpose.trim().is_empty() {
            return Err(ValidationError::MissingField("purpose").into());
        }
        if let Some(address) = submission
            .proposed_email
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
        {
            validate_org_email(address, &self.config.email_domain)?;
        }

        let applicant = self.approvals.user(&submission.applicant_id)?;
        self.approvals.resolve_officer(
            ApprovalStage::SupportReview,
            &applicant,
            &submission.supporting_officer_id,
        )?;
        Ok(applicant)
    }

    /// Stores a draft the applicant can still edit or withdraw.
    pub fn draft(
        &self,
        submission: EmailApplicationSubmission,
        at: DateTime<Utc>,
    ) -> Result<EmailApplication, WorkflowError> {
        self.validate(&submission)?;
        let application = EmailApplication::draft(next_email_application_id(), submission, at);
        let application = self.repository.insert_email_application(application)?;
        info!(application = %application.id, applicant = %application.applicant_id, "email application drafted");
        Ok(application)
    }

    /// Sends a draft to its supporting officer.
    pub fn submit(
        &self,
        id: &EmailApplicationId,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<EmailApplication, WorkflowError> {
        let approvable = Approvable::Email(id.clone());
        let slot = self.locks.slot(&approvable.lock_key());
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
        changes.update_email_application(application);
        changes.insert_approval(pending);
        let committed = self.repository.commit(changes)?;
        let application = written(
            committed.email_applications.into_iter().next(),
            "email application",
        )?;
        let pending = written(committed.approvals.into_iter().next(), "approval")?;
        info!(application = %application.id, status = application.status.label(), "email application submitted");
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

    /// Drafts and submits in one step.
    pub fn submit_new(
        &self,
        submission: EmailApplicationSubmission,
        at: DateTime<Utc>,
    ) -> Result<EmailApplication, WorkflowError> {
        let applicant = submission.applicant_id.clone();
        let draft = self.draft(submission, at)?;
        self.submit(&draft.id, &applicant, at)
    }

    pub fn get(&self, id: &EmailApplicationId) -> Result<EmailApplication, WorkflowError> {
        self.repository
            .email_application(id)?
            .ok_or_else(|| WorkflowError::not_found("email application", id))
    }

    pub fn list(&self) -> Result<Vec<EmailApplication>, WorkflowError> {
        let mut applications = self.repository.email_applications()?;
        applications.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(applications)
    }

    pub fn approvals(&self, id: &EmailApplicationId) -> Result<Vec<Approval>, WorkflowError> {
        self.get(id)?;
        self.approvals.for_application(&Approvable::Email(id.clone()))
    }

    /// Withdraws an application that has not been decided yet.
    pub fn cancel(
        &self,
        id: &EmailApplicationId,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<EmailApplication, WorkflowError> {
        let approvable = Approvable::Email(id.clone());
        let slot = self.locks.slot(&approvable.lock_key());
        let _guard = hold(&slot);

        let mut application = self.get(id)?;
        if &application.applicant_id != actor {
            return Err(WorkflowError::not_authorized(actor, "cancel this application"));
        }

        application.cancel()?;
        application.audit.touch(actor, at);
        let mut changes = ChangeSet::default();
        changes.update_email_application(application);
        self.approvals
            .withdraw_pending(&approvable, actor, at, &mut changes)?;
        let committed = self.repository.commit(changes)?;
        let application = written(
            committed.email_applications.into_iter().next(),
            "email application",
        )?;
        info!(application = %application.id, "email application cancelled");
        Ok(application)
    }

    fn provisioner(&self, actor: &UserId, action: &'static str) -> Result<User, WorkflowError> {
        let actor = self.approvals.user(actor)?;
        if PROVISIONING_ROLES.iter().any(|role| actor.has_role(*role)) {
            Ok(actor)
        } else {
            Err(WorkflowError::not_authorized(&actor.id, action))
        }
    }

    pub fn start_provisioning(
        &self,
        id: &EmailApplicationId,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<EmailApplication, WorkflowError> {
        let slot = self.locks.slot(&Approvable::Email(id.clone()).lock_key());
        let _guard = hold(&slot);

        let actor = self.provisioner(actor, "provision email accounts")?;
        let mut application = self.get(id)?;
        application.start_provisioning()?;
        application.audit.touch(&actor.id, at);
        let application = self.repository.update_email_application(application)?;
        info!(application = %application.id, officer = %actor.id, "email provisioning started");
        Ok(application)
    }

    pub fn complete_provisioning(
        &self,
        id: &EmailApplicationId,
        completion: ProvisioningCompletion,
        at: DateTime<Utc>,
    ) -> Result<EmailApplication, WorkflowError> {
        let approvable = Approvable::Email(id.clone());
        let slot = self.locks.slot(&approvable.lock_key());
        let _guard = hold(&slot);

        let actor = self.provisioner(&completion.actor_id, "provision email accounts")?;
        let assigned_email = completion.assigned_email.trim().to_ascii_lowercase();
        validate_org_email(&assigned_email, &self.config.email_domain)?;
        let assigned_user_id = completion
            .assigned_user_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let mut application = self.get(id)?;
        application.complete_provisioning(assigned_email.clone(), assigned_user_id.clone())?;
        application.audit.touch(&actor.id, at);
        let application = self.repository.update_email_application(application)?;
        info!(
            application = %application.id,
            assigned_email = %assigned_email,
            "email account provisioned"
        );

        if let Some(applicant) = self.repository.user(&application.applicant_id)? {
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
                    NotificationEvent::ProvisioningCompleted {
                        assigned_email,
                        assigned_user_id,
                    },
                    at,
                )],
            );
        }

        Ok(application)
    }

    pub fn fail_provisioning(
        &self,
        id: &EmailApplicationId,
        failure: ProvisioningFailure,
        at: DateTime<Utc>,
    ) -> Result<EmailApplication, WorkflowError> {
        let approvable = Approvable::Email(id.clone());
        let slot = self.locks.slot(&approvable.lock_key());
        let _guard = hold(&slot);

        let actor = self.provisioner(&failure.actor_id, "provision email accounts")?;
        let reason = failure.reason.trim().to_string();
        if reason.is_empty() {
            return Err(ValidationError::MissingField("reason").into());
        }

        let mut application = self.get(id)?;
        application.fail_provisioning(reason.clone())?;
        application.audit.touch(&actor.id, at);
        let application = self.repository.update_email_application(application)?;
        warn!(application = %application.id, reason = %reason, "email provisioning failed");

        let applicant = self.repository.user(&application.applicant_id)?;
        let context = ApplicationContext {
            reference: &approvable,
            status: application.status.label(),
            applicant_name: display_name(applicant.as_ref()),
        };
        let notifications: Vec<_> =
            staff_with_roles(self.repository.as_ref(), &[Role::Admin, Role::ItAdmin])?
                .iter()
                .map(|staff| {
                    compose(
                        &self.config,
                        staff,
                        &context,
                        NotificationEvent::ProvisioningFailed {
                            reason: reason.clone(),
                        },
                        at,
                    )
                })
                .collect();
        dispatch(self.outbox.as_ref(), notifications);

        Ok(application)
    }
}
