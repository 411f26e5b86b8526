use std::sync::Arc;

use super::common::*;
use crate::workflows::approvals::{
    Approvable, ApprovalStage, ApprovalStatus, DecisionRequest, Verdict,
};
use crate::workflows::email::EmailApplicationStatus;
use crate::workflows::error::{ValidationError, WorkflowError};
use crate::workflows::loans::ApprovedQuantity;
use crate::workflows::memory::MemoryOutbox;
use crate::workflows::repository::UserDirectory;

fn decision(officer: &str, verdict: Verdict) -> DecisionRequest {
    DecisionRequest {
        officer_id: id(officer),
        verdict,
        comments: None,
        approved_quantities: Vec::new(),
    }
}

#[test]
fn support_approval_opens_the_next_stage_for_the_role_holder() {
    let (desk, _store, outbox) = build_desk();
    let application = desk
        .email()
        .submit_new(email_submission(), at(3))
        .expect("submit");

    let pending = desk.approvals().pending_for(&id(SUPPORT)).expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].stage, ApprovalStage::SupportReview);

    let outcome = desk
        .approvals()
        .decide(&pending[0].id, decision(SUPPORT, Verdict::Approve), at(4))
        .expect("support approves");
    assert_eq!(outcome.approval.status, ApprovalStatus::Approved);
    assert_eq!(outcome.application_status, "pending_admin");
    let next = outcome.next_approval.expect("IT admin stage opened");
    assert_eq!(next.stage, ApprovalStage::ItAdminReview);
    assert_eq!(next.officer_id, id(IT_ADMIN));

    let approvals = desk.email().approvals(&application.id).expect("approvals");
    assert_eq!(approvals.len(), 2);
    assert_eq!(
        approvals.iter().filter(|approval| approval.is_pending()).count(),
        1
    );
    assert!(events_for(&outbox, IT_ADMIN).contains(&"approval_requested"));
    assert!(!events_for(&outbox, APPLICANT).contains(&"application_approved"));
}

#[test]
fn rejection_halts_the_chain_and_tells_the_applicant() {
    let (desk, _store, outbox) = build_desk();
    let application = desk
        .email()
        .submit_new(email_submission(), at(3))
        .expect("submit");
    let pending = desk.approvals().pending_for(&id(SUPPORT)).expect("pending");

    let outcome = desk
        .approvals()
        .decide(
            &pending[0].id,
            DecisionRequest {
                comments: Some("Use the shared mailbox instead".to_string()),
                ..decision(SUPPORT, Verdict::Reject)
            },
            at(4),
        )
        .expect("support rejects");

    assert_eq!(outcome.application_status, "rejected");
    assert!(outcome.next_approval.is_none());
    assert_eq!(
        desk.email().get(&application.id).expect("stored").status,
        EmailApplicationStatus::Rejected
    );
    assert_eq!(desk.email().approvals(&application.id).expect("approvals").len(), 1);

    let rejected: Vec<_> = outbox
        .delivered()
        .into_iter()
        .filter(|notification| notification.event == "application_rejected")
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].recipient, id(APPLICANT));
    assert_eq!(
        rejected[0].data["comments"],
        "Use the shared mailbox instead"
    );
}

#[test]
fn settled_approvals_refuse_a_second_decision() {
    let (desk, _store, _outbox) = build_desk();
    desk.email()
        .submit_new(email_submission(), at(3))
        .expect("submit");
    let pending = desk.approvals().pending_for(&id(SUPPORT)).expect("pending");
    desk.approvals()
        .decide(&pending[0].id, decision(SUPPORT, Verdict::Reject), at(4))
        .expect("first decision");

    match desk
        .approvals()
        .decide(&pending[0].id, decision(SUPPORT, Verdict::Approve), at(5))
    {
        Err(WorkflowError::InvalidTransition { entity, status, .. }) => {
            assert_eq!(entity, "approval");
            assert_eq!(status, "rejected");
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn only_assigned_officers_role_holders_or_admins_decide() {
    let (desk, _store, _outbox) = build_desk();
    desk.email()
        .submit_new(email_submission(), at(3))
        .expect("submit");
    let pending = desk.approvals().pending_for(&id(SUPPORT)).expect("pending");

    assert!(matches!(
        desk.approvals()
            .decide(&pending[0].id, decision(JUNIOR, Verdict::Approve), at(4)),
        Err(WorkflowError::NotAuthorized { .. })
    ));

    let outcome = desk
        .approvals()
        .decide(&pending[0].id, decision(ADMIN, Verdict::Approve), at(4))
        .expect("admin may act on any stage");
    assert_eq!(outcome.approval.decided_by, Some(id(ADMIN)));
    assert_eq!(outcome.approval.officer_id, id(SUPPORT));

    let history = desk.approvals().history_for(&id(ADMIN)).expect("admin history");
    assert_eq!(history.len(), 1);
    assert!(desk
        .approvals()
        .history_for(&id(SUPPORT))
        .expect("support history")
        .is_empty());
}

#[test]
fn concurrent_decisions_on_one_approval_settle_exactly_once() {
    let (desk, _store, outbox) = build_desk();
    desk.email()
        .submit_new(email_submission(), at(3))
        .expect("submit");
    let approval_id = desk.approvals().pending_for(&id(SUPPORT)).expect("pending")[0]
        .id
        .clone();

    let desk = &desk;
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = [Verdict::Approve, Verdict::Reject]
            .into_iter()
            .map(|verdict| {
                let approval_id = approval_id.clone();
                scope.spawn(move || {
                    desk.approvals()
                        .decide(&approval_id, decision(SUPPORT, verdict), at(4))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .collect()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, WorkflowError::InvalidTransition { .. })));

    let requested = events_for(&outbox, IT_ADMIN)
        .into_iter()
        .filter(|event| *event == "approval_requested")
        .count();
    assert!(requested <= 1, "the next stage opens at most once");
}

#[test]
fn missing_role_holder_leaves_the_application_at_its_current_stage() {
    let users = staff()
        .into_iter()
        .filter(|user| user.id.0 != HOD)
        .collect();
    let (desk, store) = desk_with_outbox(users, Arc::new(MemoryOutbox::default()));
    stock(&desk);
    let loan = desk
        .loans()
        .submit_new(loan_submission(), at(2))
        .expect("submit");
    let pending = desk.approvals().pending_for(&id(SUPPORT)).expect("pending");

    match desk
        .approvals()
        .decide(&pending[0].id, decision(SUPPORT, Verdict::Approve), at(3))
    {
        Err(WorkflowError::NoOfficerAvailable { stage }) => assert_eq!(stage, "HOD review"),
        other => panic!("expected no officer, got {other:?}"),
    }
    assert_eq!(desk.loans().get(&loan.id).expect("stored").status.label(), "pending_support");
    assert!(desk.approvals().approval(&pending[0].id).expect("approval").is_pending());
    assert!(store.user(&id(HOD)).expect("lookup").is_none());
}

#[test]
fn quantities_are_only_accepted_at_the_final_loan_stage() {
    let (desk, _store, _outbox) = build_desk();
    desk.loans()
        .submit_new(loan_submission(), at(2))
        .expect("submit");
    let pending = desk.approvals().pending_for(&id(SUPPORT)).expect("pending");

    let err = desk
        .approvals()
        .decide(
            &pending[0].id,
            DecisionRequest {
                approved_quantities: vec![ApprovedQuantity { line: 1, quantity: 1 }],
                ..decision(SUPPORT, Verdict::Approve)
            },
            at(3),
        )
        .expect_err("quantities refused at support review");
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::UnexpectedQuantities)
    ));
}

#[test]
fn history_lists_decisions_recorded_by_the_officer() {
    let (desk, _store, _outbox) = build_desk();
    let application = desk
        .email()
        .submit_new(email_submission(), at(3))
        .expect("submit");
    let pending = desk.approvals().pending_for(&id(SUPPORT)).expect("pending");
    desk.approvals()
        .decide(&pending[0].id, decision(SUPPORT, Verdict::Approve), at(4))
        .expect("approve");

    let history = desk.approvals().history_for(&id(SUPPORT)).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].approvable, Approvable::Email(application.id));
    assert!(desk.approvals().pending_for(&id(SUPPORT)).expect("pending").is_empty());
}
