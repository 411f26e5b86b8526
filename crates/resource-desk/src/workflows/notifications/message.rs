use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::WorkflowConfig;
use crate::workflows::approvals::domain::{Approvable, ApprovalStage};
use crate::workflows::directory::{User, UserId};
use crate::workflows::equipment::domain::{AssetTag, ReturnCondition};

/// Everything a notification can be about.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    ApplicationSubmitted,
    ApprovalRequested {
        stage: ApprovalStage,
    },
    ApplicationApproved,
    ApplicationRejected {
        stage: ApprovalStage,
        comments: Option<String>,
    },
    ProvisioningCompleted {
        assigned_email: String,
        assigned_user_id: Option<String>,
    },
    ProvisioningFailed {
        reason: String,
    },
    ReadyForIssuance,
    ReadyForProvisioning,
    EquipmentIssued {
        asset_tag: AssetTag,
        due_date: NaiveDate,
    },
    EquipmentReturned {
        asset_tag: AssetTag,
        condition: ReturnCondition,
    },
    EquipmentOverdue {
        asset_tag: AssetTag,
        due_date: NaiveDate,
        days_overdue: i64,
    },
    EquipmentIncident {
        asset_tag: AssetTag,
        condition: ReturnCondition,
    },
}

impl NotificationEvent {
    pub const fn key(&self) -> &'static str {
        match self {
            Self::ApplicationSubmitted => "application_submitted",
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::ApplicationApproved => "application_approved",
            Self::ApplicationRejected { .. } => "application_rejected",
            Self::ProvisioningCompleted { .. } => "provisioning_completed",
            Self::ProvisioningFailed { .. } => "provisioning_failed",
            Self::ReadyForIssuance => "ready_for_issuance",
            Self::ReadyForProvisioning => "ready_for_provisioning",
            Self::EquipmentIssued { .. } => "equipment_issued",
            Self::EquipmentReturned { .. } => "equipment_returned",
            Self::EquipmentOverdue { .. } => "equipment_overdue",
            Self::EquipmentIncident { .. } => "equipment_incident",
        }
    }
}

/// Application the event concerns, as seen at the time of the event.
#[derive(Debug, Clone)]
pub struct ApplicationContext<'a> {
    pub reference: &'a Approvable,
    pub status: &'static str,
    pub applicant_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailAction {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub subject: String,
    pub greeting: String,
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<MailAction>,
}

impl MailMessage {
    /// Plain-text rendering for transports without HTML support.
    pub fn render_text(&self) -> String {
        let mut body = format!("{}\n\n", self.greeting);
        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }
        if let Some(action) = &self.action {
            body.push_str(&format!("\n{}: {}\n", action.label, action.url));
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: UserId,
    pub recipient_email: String,
    pub event: &'static str,
    pub mail: MailMessage,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Renders one event for one recipient.
pub fn compose(
    config: &WorkflowConfig,
    recipient: &User,
    context: &ApplicationContext<'_>,
    event: NotificationEvent,
    at: DateTime<Utc>,
) -> Notification {
    let reference = context.reference;
    let kind = reference.kind().label();
    let url = config.link(&reference.link_path());

    let (subject, lines, action_label, mut extra) = match &event {
        NotificationEvent::ApplicationSubmitted => (
            format!("Your {kind} {} has been received", reference.id()),
            vec![
                format!("Your {kind} has been submitted for approval."),
                "You will be notified as each officer reviews it.".to_string(),
            ],
            "View application",
            json!({}),
        ),
        NotificationEvent::ApprovalRequested { stage } => (
            format!("Action required: {kind} {}", reference.id()),
            vec![
                format!(
                    "A {kind} from {} is awaiting your {}.",
                    context.applicant_name,
                    stage.label()
                ),
                "Please approve or reject it from the approval dashboard.".to_string(),
            ],
            "Review application",
            json!({ "stage": stage }),
        ),
        NotificationEvent::ApplicationApproved => (
            format!("Your {kind} {} has been approved", reference.id()),
            vec![format!("Your {kind} has passed every approval stage.")],
            "View application",
            json!({}),
        ),
        NotificationEvent::ApplicationRejected { stage, comments } => {
            let mut lines = vec![format!(
                "Your {kind} was not approved at {}.",
                stage.label()
            )];
            if let Some(comments) = comments {
                lines.push(format!("Officer comments: {comments}"));
            }
            (
                format!("Your {kind} {} was rejected", reference.id()),
                lines,
                "View application",
                json!({ "stage": stage, "comments": comments }),
            )
        }
        NotificationEvent::ProvisioningCompleted {
            assigned_email,
            assigned_user_id,
        } => {
            let mut lines = vec![format!("Your email account {assigned_email} is ready.")];
            if let Some(user_id) = assigned_user_id {
                lines.push(format!("Your user ID is {user_id}."));
            }
            (
                "Your email account is ready".to_string(),
                lines,
                "View account details",
                json!({
                    "final_assigned_email": assigned_email,
                    "final_assigned_user_id": assigned_user_id,
                }),
            )
        }
        NotificationEvent::ProvisioningFailed { reason } => (
            format!("Provisioning failed for {}", reference.id()),
            vec![
                format!(
                    "Provisioning the account requested by {} failed.",
                    context.applicant_name
                ),
                format!("Reason: {reason}"),
            ],
            "Retry provisioning",
            json!({ "reason": reason }),
        ),
        NotificationEvent::ReadyForIssuance => (
            format!("Equipment ready to issue for {}", reference.id()),
            vec![format!(
                "The loan requested by {} is approved and awaiting issuance.",
                context.applicant_name
            )],
            "Issue equipment",
            json!({}),
        ),
        NotificationEvent::ReadyForProvisioning => (
            format!("Account ready to provision for {}", reference.id()),
            vec![format!(
                "The email application from {} is approved and awaiting provisioning.",
                context.applicant_name
            )],
            "Provision account",
            json!({}),
        ),
        NotificationEvent::EquipmentIssued {
            asset_tag,
            due_date,
        } => (
            format!("Equipment {asset_tag} issued"),
            vec![
                format!("Equipment {asset_tag} has been issued under {}.", reference.id()),
                format!("Please return it by {due_date}."),
            ],
            "View loan",
            json!({ "asset_tag": asset_tag, "due_date": due_date }),
        ),
        NotificationEvent::EquipmentReturned {
            asset_tag,
            condition,
        } => (
            format!("Equipment {asset_tag} returned"),
            vec![format!(
                "Return of {asset_tag} recorded in {} condition.",
                condition.label()
            )],
            "View loan",
            json!({ "asset_tag": asset_tag, "condition": condition }),
        ),
        NotificationEvent::EquipmentOverdue {
            asset_tag,
            due_date,
            days_overdue,
        } => (
            format!("Overdue: equipment {asset_tag}"),
            vec![
                format!("Equipment {asset_tag} was due back on {due_date}."),
                format!("It is {days_overdue} day(s) overdue. Please return it immediately."),
            ],
            "View loan",
            json!({
                "asset_tag": asset_tag,
                "due_date": due_date,
                "days_overdue": days_overdue,
            }),
        ),
        NotificationEvent::EquipmentIncident {
            asset_tag,
            condition,
        } => (
            format!("Equipment {asset_tag} reported {}", condition.label()),
            vec![format!(
                "Equipment {asset_tag} on loan to {} was returned as {}.",
                context.applicant_name,
                condition.label()
            )],
            "View loan",
            json!({ "asset_tag": asset_tag, "condition": condition }),
        ),
    };

    let message = lines.first().cloned().unwrap_or_default();
    let mut data = json!({
        "application_id": reference.id(),
        "application_type": reference.kind(),
        "status": context.status,
        "message": message,
        "url": url,
        "event": event.key(),
    });
    if let (Some(data), Some(extra)) = (data.as_object_mut(), extra.as_object_mut()) {
        data.append(extra);
    }

    Notification {
        recipient: recipient.id.clone(),
        recipient_email: recipient.email.clone(),
        event: event.key(),
        mail: MailMessage {
            subject,
            greeting: format!("Dear {},", recipient.name),
            lines,
            action: Some(MailAction {
                label: action_label.to_string(),
                url,
            }),
        },
        data,
        created_at: at,
    }
}
