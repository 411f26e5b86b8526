use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::common::*;
use crate::config::WorkflowConfig;
use crate::workflows::approvals::{
    Approvable, Approval, ApprovalId, ApprovalStatus, DecisionRequest, Verdict,
};
use crate::workflows::directory::{User, UserId};
use crate::workflows::email::{EmailApplication, EmailApplicationId};
use crate::workflows::equipment::{
    AssetTag, AvailabilityStatus, Equipment, EquipmentRegistration, EquipmentType,
    RegisterEquipmentRequest,
};
use crate::workflows::error::WorkflowError;
use crate::workflows::loans::{
    IssueRequest, IssueUnit, LoanApplication, LoanApplicationId, LoanStatus, LoanTransaction,
    TransactionId,
};
use crate::workflows::memory::{MemoryOutbox, MemoryStore};
use crate::workflows::repository::{
    ApprovalRepository, ChangeSet, Committed, EmailApplicationRepository, EquipmentRepository,
    LoanRepository, RepositoryError, RowWrite, UnitOfWork, UserDirectory,
};
use crate::workflows::ResourceDesk;

/// Memory store where, once armed, another writer updates the loan row staged
/// in the next commit just before that commit runs.
struct ContendedStore {
    inner: MemoryStore,
    armed: AtomicBool,
}

impl ContendedStore {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl UnitOfWork for ContendedStore {
    fn commit(&self, changes: ChangeSet) -> Result<Committed, RepositoryError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let loan = changes
                .clone()
                .into_writes()
                .into_iter()
                .find_map(|write| match write {
                    RowWrite::UpdateLoanApplication(row) => Some(row.id),
                    _ => None,
                });
            if let Some(id) = loan {
                let current = self.inner.loan_application(&id)?.ok_or(RepositoryError::NotFound)?;
                self.inner.update_loan_application(current)?;
            }
        }
        self.inner.commit(changes)
    }
}

impl UserDirectory for ContendedStore {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.user(id)
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        self.inner.users()
    }
}

impl ApprovalRepository for ContendedStore {
    fn insert_approval(&self, approval: Approval) -> Result<Approval, RepositoryError> {
        self.inner.insert_approval(approval)
    }

    fn update_approval(&self, approval: Approval) -> Result<Approval, RepositoryError> {
        self.inner.update_approval(approval)
    }

    fn approval(&self, id: &ApprovalId) -> Result<Option<Approval>, RepositoryError> {
        self.inner.approval(id)
    }

    fn approvals_for(&self, approvable: &Approvable) -> Result<Vec<Approval>, RepositoryError> {
        self.inner.approvals_for(approvable)
    }

    fn approvals(&self) -> Result<Vec<Approval>, RepositoryError> {
        self.inner.approvals()
    }
}

impl EmailApplicationRepository for ContendedStore {
    fn insert_email_application(
        &self,
        application: EmailApplication,
    ) -> Result<EmailApplication, RepositoryError> {
        self.inner.insert_email_application(application)
    }

    fn update_email_application(
        &self,
        application: EmailApplication,
    ) -> Result<EmailApplication, RepositoryError> {
        self.inner.update_email_application(application)
    }

    fn email_application(
        &self,
        id: &EmailApplicationId,
    ) -> Result<Option<EmailApplication>, RepositoryError> {
        self.inner.email_application(id)
    }

    fn email_applications(&self) -> Result<Vec<EmailApplication>, RepositoryError> {
        self.inner.email_applications()
    }
}

impl LoanRepository for ContendedStore {
    fn insert_loan_application(
        &self,
        application: LoanApplication,
    ) -> Result<LoanApplication, RepositoryError> {
        self.inner.insert_loan_application(application)
    }

    fn update_loan_application(
        &self,
        application: LoanApplication,
    ) -> Result<LoanApplication, RepositoryError> {
        self.inner.update_loan_application(application)
    }

    fn loan_application(
        &self,
        id: &LoanApplicationId,
    ) -> Result<Option<LoanApplication>, RepositoryError> {
        self.inner.loan_application(id)
    }

    fn loan_applications(&self) -> Result<Vec<LoanApplication>, RepositoryError> {
        self.inner.loan_applications()
    }

    fn insert_transaction(
        &self,
        transaction: LoanTransaction,
    ) -> Result<LoanTransaction, RepositoryError> {
        self.inner.insert_transaction(transaction)
    }

    fn update_transaction(
        &self,
        transaction: LoanTransaction,
    ) -> Result<LoanTransaction, RepositoryError> {
        self.inner.update_transaction(transaction)
    }

    fn transaction(&self, id: &TransactionId) -> Result<Option<LoanTransaction>, RepositoryError> {
        self.inner.transaction(id)
    }

    fn transactions_for(
        &self,
        loan: &LoanApplicationId,
    ) -> Result<Vec<LoanTransaction>, RepositoryError> {
        self.inner.transactions_for(loan)
    }

    fn transactions(&self) -> Result<Vec<LoanTransaction>, RepositoryError> {
        self.inner.transactions()
    }
}

impl EquipmentRepository for ContendedStore {
    fn insert_equipment(&self, equipment: Equipment) -> Result<Equipment, RepositoryError> {
        self.inner.insert_equipment(equipment)
    }

    fn update_equipment(&self, equipment: Equipment) -> Result<Equipment, RepositoryError> {
        self.inner.update_equipment(equipment)
    }

    fn equipment(&self, tag: &AssetTag) -> Result<Option<Equipment>, RepositoryError> {
        self.inner.equipment(tag)
    }

    fn equipment_list(&self) -> Result<Vec<Equipment>, RepositoryError> {
        self.inner.equipment_list()
    }
}

type ContendedDesk = ResourceDesk<ContendedStore, MemoryOutbox>;

fn contended_desk() -> (ContendedDesk, Arc<ContendedStore>, Arc<MemoryOutbox>) {
    let store = Arc::new(ContendedStore {
        inner: MemoryStore::with_users(staff()),
        armed: AtomicBool::new(false),
    });
    let outbox = Arc::new(MemoryOutbox::default());
    let desk = ResourceDesk::new(
        Arc::clone(&store),
        Arc::clone(&outbox),
        WorkflowConfig::default(),
    );
    (desk, store, outbox)
}

fn approve(desk: &ContendedDesk, officer: &str) -> Result<(), WorkflowError> {
    let pending = desk.approvals().pending_for(&id(officer))?;
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
        .map(|_| ())
}

fn is_stale(result: Result<impl std::fmt::Debug, WorkflowError>) -> bool {
    matches!(
        result,
        Err(WorkflowError::Repository(RepositoryError::Stale { .. }))
    )
}

#[test]
fn a_lost_decision_race_writes_nothing() {
    let (desk, store, outbox) = contended_desk();
    let loan = desk
        .loans()
        .submit_new(loan_submission(), at(1))
        .expect("submit");
    let delivered = outbox.delivered().len();

    store.arm();
    assert!(is_stale(approve(&desk, SUPPORT)));

    let approvals = desk.loans().approvals(&loan.id).expect("approvals");
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].status, ApprovalStatus::Pending);
    assert_eq!(approvals[0].decided_by, None);
    assert_eq!(
        desk.loans().get(&loan.id).expect("loan").status,
        LoanStatus::PendingSupport
    );
    assert_eq!(outbox.delivered().len(), delivered);

    approve(&desk, SUPPORT).expect("retry succeeds");
    assert_eq!(
        desk.loans().get(&loan.id).expect("loan").status,
        LoanStatus::PendingHod
    );
    assert_eq!(desk.loans().approvals(&loan.id).expect("approvals").len(), 2);
}

#[test]
fn a_lost_issue_race_leaves_units_in_the_store() {
    let (desk, store, _outbox) = contended_desk();
    for (asset_tag, equipment_type) in [
        ("ICT-LPT-001", EquipmentType::Laptop),
        ("ICT-PRJ-001", EquipmentType::Projector),
    ] {
        desk.inventory()
            .register(
                RegisterEquipmentRequest {
                    actor_id: id(BPM),
                    registration: EquipmentRegistration {
                        asset_tag: tag(asset_tag),
                        equipment_type,
                        brand: None,
                        model: None,
                        serial_number: None,
                        location: None,
                        department: None,
                    },
                },
                at(1),
            )
            .expect("register");
    }
    let loan = desk
        .loans()
        .submit_new(loan_submission(), at(1))
        .expect("submit");
    approve(&desk, SUPPORT).expect("support");
    approve(&desk, HOD).expect("hod");

    let request = IssueRequest {
        actor_id: id(BPM),
        receiving_officer_id: None,
        due_date: None,
        notes: None,
        units: vec![
            IssueUnit {
                line: 1,
                asset_tag: tag("ICT-LPT-001"),
                accessories: Vec::new(),
            },
            IssueUnit {
                line: 2,
                asset_tag: tag("ICT-PRJ-001"),
                accessories: Vec::new(),
            },
        ],
    };

    store.arm();
    assert!(is_stale(desk.loans().issue(&loan.id, request.clone(), at(3))));

    for asset_tag in ["ICT-LPT-001", "ICT-PRJ-001"] {
        let unit = desk.inventory().get(&tag(asset_tag)).expect("unit");
        assert_eq!(unit.availability_status, AvailabilityStatus::Available);
        assert_eq!(unit.assigned_to, None);
    }
    assert!(desk.loans().transactions(&loan.id).expect("txns").is_empty());
    let stored = desk.loans().get(&loan.id).expect("loan");
    assert_eq!(stored.status, LoanStatus::Approved);
    assert!(stored.items.iter().all(|item| item.quantity_issued == 0));

    let issued = desk
        .loans()
        .issue(&loan.id, request, at(3))
        .expect("retry succeeds");
    assert_eq!(issued.transactions.len(), 2);
    assert_eq!(issued.application.status, LoanStatus::PartiallyIssued);
}
