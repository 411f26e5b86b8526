use super::common::*;
use crate::workflows::approvals::{DecisionRequest, Verdict};
use crate::workflows::equipment::{AvailabilityStatus, ConditionStatus, ReturnCondition};
use crate::workflows::error::{ValidationError, WorkflowError};
use crate::workflows::loans::{
    ApprovedQuantity, IssueRequest, IssueUnit, LoanApplication, LoanStatus, LoanSubmission,
    ReturnRequest, ReturnUnit, TransactionStatus,
};
use crate::workflows::memory::MemoryOutbox;

fn approved_loan(desk: &Desk<MemoryOutbox>, quantities: Vec<ApprovedQuantity>) -> LoanApplication {
    let loan = desk
        .loans()
        .submit_new(loan_submission(), at(1))
        .expect("submit");
    for (officer, approved_quantities) in [(SUPPORT, Vec::new()), (HOD, quantities)] {
        let pending = desk.approvals().pending_for(&id(officer)).expect("pending");
        desk.approvals()
            .decide(
                &pending[0].id,
                DecisionRequest {
                    officer_id: id(officer),
                    verdict: Verdict::Approve,
                    comments: None,
                    approved_quantities,
                },
                at(2),
            )
            .expect("approve");
    }
    desk.loans().get(&loan.id).expect("stored")
}

fn unit(line: u32, asset_tag: &str) -> IssueUnit {
    IssueUnit {
        line,
        asset_tag: tag(asset_tag),
        accessories: vec!["Charger".to_string()],
    }
}

fn issue_request(units: Vec<IssueUnit>) -> IssueRequest {
    IssueRequest {
        actor_id: id(BPM),
        receiving_officer_id: None,
        due_date: None,
        notes: None,
        units,
    }
}

fn returned(asset_tag: &str, condition: ReturnCondition) -> ReturnUnit {
    ReturnUnit {
        asset_tag: tag(asset_tag),
        condition,
        notes: None,
    }
}

fn return_request(units: Vec<ReturnUnit>) -> ReturnRequest {
    ReturnRequest {
        actor_id: id(BPM),
        returning_officer_id: None,
        units,
    }
}

#[test]
fn final_approval_sets_quantities_and_notifies_bpm() {
    let (desk, _store, outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, vec![ApprovedQuantity { line: 1, quantity: 1 }]);

    assert_eq!(loan.status, LoanStatus::Approved);
    assert_eq!(loan.item(1).expect("line 1").quantity_approved, 1);
    assert_eq!(loan.item(2).expect("line 2").quantity_approved, 1);
    assert!(events_for(&outbox, BPM).contains(&"ready_for_issuance"));
    assert!(events_for(&outbox, APPLICANT).contains(&"application_approved"));
    assert!(events_for(&outbox, HOD).contains(&"approval_requested"));
}

#[test]
fn issue_and_return_move_the_loan_and_the_units_together() {
    let (desk, _store, outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, Vec::new());

    let first = desk
        .loans()
        .issue(&loan.id, issue_request(vec![unit(1, "ICT-LPT-001")]), at(3))
        .expect("issue first laptop");
    assert_eq!(first.application.status, LoanStatus::PartiallyIssued);
    assert_eq!(first.transactions.len(), 1);
    assert_eq!(first.transactions[0].due_date, date(7));
    assert_eq!(first.transactions[0].receiving_officer_id, id(APPLICANT));

    let laptop = desk.inventory().get(&tag("ICT-LPT-001")).expect("laptop");
    assert_eq!(laptop.availability_status, AvailabilityStatus::OnLoan);
    assert_eq!(laptop.assigned_to, Some(id(APPLICANT)));

    let rest = desk
        .loans()
        .issue(
            &loan.id,
            issue_request(vec![unit(1, "ICT-LPT-002"), unit(2, "ICT-PRJ-001")]),
            at(3),
        )
        .expect("issue the rest");
    assert_eq!(rest.application.status, LoanStatus::Issued);
    assert_eq!(
        events_for(&outbox, APPLICANT)
            .into_iter()
            .filter(|event| *event == "equipment_issued")
            .count(),
        3
    );

    let back = desk
        .loans()
        .record_return(
            &loan.id,
            return_request(vec![
                returned("ICT-LPT-001", ReturnCondition::Good),
                returned("ICT-LPT-002", ReturnCondition::Good),
                returned("ICT-PRJ-001", ReturnCondition::Good),
            ]),
            at(6),
        )
        .expect("return everything");
    assert_eq!(back.application.status, LoanStatus::Returned);
    assert!(back
        .transactions
        .iter()
        .all(|txn| txn.status == TransactionStatus::Returned
            && txn.return_accepting_officer_id == Some(id(BPM))
            && txn.returning_officer_id == Some(id(APPLICANT))));

    let available = desk
        .inventory()
        .list(Default::default())
        .expect("list")
        .into_iter()
        .filter(|unit| unit.availability_status == AvailabilityStatus::Available)
        .count();
    assert_eq!(available, 3);
    assert!(events_for(&outbox, BPM)
        .iter()
        .all(|event| *event != "equipment_incident"));
}

#[test]
fn issue_checks_every_unit_before_writing() {
    let (desk, _store, _outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, Vec::new());

    let err = desk
        .loans()
        .issue(
            &loan.id,
            issue_request(vec![unit(1, "ICT-LPT-001"), unit(1, "ICT-PRJ-001")]),
            at(3),
        )
        .expect_err("projector on a laptop line");
    match err {
        WorkflowError::Validation(ValidationError::EquipmentTypeMismatch {
            asset_tag,
            expected,
            actual,
            ..
        }) => {
            assert_eq!(asset_tag, "ICT-PRJ-001");
            assert_eq!(expected, "laptop");
            assert_eq!(actual, "projector");
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }

    let laptop = desk.inventory().get(&tag("ICT-LPT-001")).expect("laptop");
    assert_eq!(laptop.availability_status, AvailabilityStatus::Available);
    assert_eq!(desk.loans().get(&loan.id).expect("stored").status, LoanStatus::Approved);
    assert!(desk.loans().transactions(&loan.id).expect("txns").is_empty());
}

#[test]
fn issue_is_capped_by_the_approved_quantity() {
    let (desk, _store, _outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, vec![ApprovedQuantity { line: 1, quantity: 1 }]);

    let err = desk
        .loans()
        .issue(
            &loan.id,
            issue_request(vec![unit(1, "ICT-LPT-001"), unit(1, "ICT-LPT-002")]),
            at(3),
        )
        .expect_err("second laptop exceeds approval");
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::QuantityExceeded {
            line: 1,
            field: "quantity_issued",
            ..
        })
    ));
    assert_eq!(
        desk.inventory()
            .get(&tag("ICT-LPT-002"))
            .expect("laptop")
            .availability_status,
        AvailabilityStatus::Available
    );
}

#[test]
fn units_out_of_circulation_cannot_be_issued() {
    let (desk, _store, _outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, Vec::new());
    desk.inventory()
        .send_to_maintenance(&tag("ICT-LPT-001"), &id(BPM), at(2))
        .expect("maintenance");

    assert!(matches!(
        desk.loans()
            .issue(&loan.id, issue_request(vec![unit(1, "ICT-LPT-001")]), at(3)),
        Err(WorkflowError::InvalidTransition {
            entity: "equipment",
            ..
        })
    ));
}

#[test]
fn issue_and_duplicates_are_refused_for_unapproved_or_repeated_units() {
    let (desk, _store, _outbox) = build_desk();
    stock(&desk);
    let pending = desk
        .loans()
        .submit_new(loan_submission(), at(1))
        .expect("submit");

    assert!(matches!(
        desk.loans()
            .issue(&pending.id, issue_request(vec![unit(1, "ICT-LPT-001")]), at(3)),
        Err(WorkflowError::InvalidTransition { .. })
    ));
    assert!(matches!(
        desk.loans().issue(
            &pending.id,
            issue_request(vec![unit(1, "ICT-LPT-001"), unit(1, "ICT-LPT-001")]),
            at(3)
        ),
        Err(WorkflowError::Validation(ValidationError::DuplicateEquipment(_)))
    ));
    assert!(matches!(
        desk.loans().issue(
            &pending.id,
            IssueRequest {
                actor_id: id(APPLICANT),
                ..issue_request(vec![unit(1, "ICT-LPT-001")])
            },
            at(3)
        ),
        Err(WorkflowError::NotAuthorized { .. })
    ));
}

#[test]
fn damaged_and_lost_returns_raise_incidents() {
    let (desk, _store, outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, Vec::new());
    desk.loans()
        .issue(
            &loan.id,
            issue_request(vec![
                unit(1, "ICT-LPT-001"),
                unit(1, "ICT-LPT-002"),
                unit(2, "ICT-PRJ-001"),
            ]),
            at(3),
        )
        .expect("issue");

    let outcome = desk
        .loans()
        .record_return(
            &loan.id,
            return_request(vec![
                returned("ICT-LPT-001", ReturnCondition::Damaged),
                returned("ICT-PRJ-001", ReturnCondition::Lost),
            ]),
            at(6),
        )
        .expect("partial return");
    assert_eq!(outcome.application.status, LoanStatus::Issued);

    let damaged = desk.inventory().get(&tag("ICT-LPT-001")).expect("laptop");
    assert_eq!(damaged.availability_status, AvailabilityStatus::Damaged);
    assert_eq!(damaged.condition_status, ConditionStatus::Damaged);
    assert!(damaged.assigned_to.is_none());
    assert_eq!(
        desk.inventory()
            .get(&tag("ICT-PRJ-001"))
            .expect("projector")
            .availability_status,
        AvailabilityStatus::Lost
    );

    for officer in [BPM, ADMIN] {
        let incidents = events_for(&outbox, officer)
            .into_iter()
            .filter(|event| *event == "equipment_incident")
            .count();
        assert_eq!(incidents, 2, "{officer} hears about both incidents");
    }

    assert!(matches!(
        desk.loans().record_return(
            &loan.id,
            return_request(vec![returned("ICT-LPT-001", ReturnCondition::Good)]),
            at(7)
        ),
        Err(WorkflowError::NotFound { .. })
    ));
}

#[test]
fn overdue_sweep_flags_open_units_once() {
    let (desk, _store, outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, vec![ApprovedQuantity { line: 1, quantity: 1 }]);
    desk.loans()
        .issue(&loan.id, issue_request(vec![unit(1, "ICT-LPT-001")]), at(3))
        .expect("issue");

    let early = desk.loans().sweep_overdue(date(7), at(7)).expect("sweep");
    assert_eq!(early.transactions_flagged, 0);

    let sweep = desk.loans().sweep_overdue(date(10), at(10)).expect("sweep");
    assert_eq!(sweep.transactions_flagged, 1);
    assert_eq!(sweep.loans_flagged, vec![loan.id.clone()]);
    assert_eq!(desk.loans().get(&loan.id).expect("stored").status, LoanStatus::Overdue);

    let overdue = outbox
        .delivered()
        .into_iter()
        .find(|notification| notification.event == "equipment_overdue")
        .expect("overdue reminder");
    assert_eq!(overdue.recipient, id(APPLICANT));
    assert_eq!(overdue.data["days_overdue"], 3);

    let again = desk.loans().sweep_overdue(date(11), at(11)).expect("sweep");
    assert_eq!(again.transactions_flagged, 0);

    let txns = desk.loans().transactions(&loan.id).expect("txns");
    assert_eq!(txns[0].status, TransactionStatus::Overdue);
    assert_eq!(txns[0].audit.updated_by, id(crate::workflows::loans::SYSTEM_ACTOR));

    let back = desk
        .loans()
        .record_return(
            &loan.id,
            return_request(vec![returned("ICT-LPT-001", ReturnCondition::Good)]),
            at(12),
        )
        .expect("late return");
    assert_eq!(back.application.status, LoanStatus::PartiallyIssued);
}

#[test]
fn loan_requests_are_validated_before_drafting() {
    let (desk, _store, _outbox) = build_desk();

    let backwards = desk.loans().draft(
        LoanSubmission {
            loan_start_date: date(10),
            loan_end_date: date(9),
            ..loan_submission()
        },
        at(1),
    );
    assert!(matches!(
        backwards,
        Err(WorkflowError::Validation(ValidationError::InvalidLoanPeriod { .. }))
    ));

    let too_long = desk.loans().draft(
        LoanSubmission {
            loan_start_date: date(1),
            loan_end_date: date(31),
            ..loan_submission()
        },
        at(1),
    );
    assert!(matches!(
        too_long,
        Err(WorkflowError::Validation(ValidationError::LoanPeriodTooLong {
            days: 31,
            max: 30
        }))
    ));

    let empty = desk.loans().draft(
        LoanSubmission {
            items: Vec::new(),
            ..loan_submission()
        },
        at(1),
    );
    assert!(matches!(
        empty,
        Err(WorkflowError::Validation(ValidationError::NoItems))
    ));

    let mut zero = loan_submission();
    zero.items[1].quantity = 0;
    assert!(matches!(
        desk.loans().draft(zero, at(1)),
        Err(WorkflowError::Validation(ValidationError::ZeroQuantity { line: 2 }))
    ));

    let thirty_days = desk.loans().draft(
        LoanSubmission {
            loan_start_date: date(1),
            loan_end_date: date(30),
            ..loan_submission()
        },
        at(1),
    );
    assert!(thirty_days.is_ok());
}

#[test]
fn responsible_officer_receives_units_and_notices() {
    let (desk, _store, outbox) = build_desk();
    stock(&desk);
    let loan = desk
        .loans()
        .submit_new(
            LoanSubmission {
                responsible_officer_id: Some(id(JUNIOR)),
                ..loan_submission()
            },
            at(1),
        )
        .expect("submit");
    for officer in [SUPPORT, HOD] {
        let pending = desk.approvals().pending_for(&id(officer)).expect("pending");
        desk.approvals()
            .decide(
                &pending[0].id,
                DecisionRequest {
                    officer_id: id(officer),
                    verdict: Verdict::Approve,
                    comments: None,
                    approved_quantities: Vec::new(),
                },
                at(2),
            )
            .expect("approve");
    }

    let outcome = desk
        .loans()
        .issue(&loan.id, issue_request(vec![unit(2, "ICT-PRJ-001")]), at(3))
        .expect("issue");
    assert_eq!(outcome.transactions[0].receiving_officer_id, id(JUNIOR));
    assert!(events_for(&outbox, JUNIOR).contains(&"equipment_issued"));
    assert!(events_for(&outbox, APPLICANT).contains(&"equipment_issued"));
}

#[test]
fn approved_loans_can_be_cancelled_before_issue() {
    let (desk, _store, _outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, Vec::new());
    let cancelled = desk
        .loans()
        .cancel(&loan.id, &id(APPLICANT), at(3))
        .expect("cancel");
    assert_eq!(cancelled.status, LoanStatus::Cancelled);
    assert!(matches!(
        desk.loans()
            .issue(&loan.id, issue_request(vec![unit(1, "ICT-LPT-001")]), at(3)),
        Err(WorkflowError::InvalidTransition { .. })
    ));
}

#[test]
fn asset_tags_match_regardless_of_case() {
    let (desk, _store, _outbox) = build_desk();
    stock(&desk);
    let loan = approved_loan(&desk, Vec::new());

    let issued = desk
        .loans()
        .issue(&loan.id, issue_request(vec![unit(1, " ict-lpt-001")]), at(3))
        .expect("lower-case tag issues");
    assert_eq!(issued.transactions[0].asset_tag, tag("ICT-LPT-001"));
    assert_eq!(
        desk.inventory()
            .get(&tag("ict-lpt-001"))
            .expect("lookup")
            .availability_status,
        AvailabilityStatus::OnLoan
    );

    let back = desk
        .loans()
        .record_return(
            &loan.id,
            return_request(vec![returned("Ict-Lpt-001", ReturnCondition::Good)]),
            at(4),
        )
        .expect("mixed-case tag returns");
    assert_eq!(back.transactions[0].status, TransactionStatus::Returned);
}
