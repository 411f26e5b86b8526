use super::approvals::domain::{Approvable, Approval, ApprovalId};
use super::directory::{User, UserId};
use super::email::domain::{EmailApplication, EmailApplicationId};
use super::equipment::domain::{AssetTag, Equipment};
use super::loans::domain::{LoanApplication, LoanApplicationId, LoanTransaction, TransactionId};

/// Error enumeration for repository failures.
///
/// Every `update_*` is a conditional write: it succeeds only when the stored row
/// still carries the version the caller read, and returns the row with the
/// version bumped.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("{entity} {id} was modified concurrently")]
    Stale { entity: &'static str, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read access to staff records.
pub trait UserDirectory: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn users(&self) -> Result<Vec<User>, RepositoryError>;
}

pub trait ApprovalRepository: Send + Sync {
    fn insert_approval(&self, approval: Approval) -> Result<Approval, RepositoryError>;
    fn update_approval(&self, approval: Approval) -> Result<Approval, RepositoryError>;
    fn approval(&self, id: &ApprovalId) -> Result<Option<Approval>, RepositoryError>;
    fn approvals_for(&self, approvable: &Approvable) -> Result<Vec<Approval>, RepositoryError>;
    fn approvals(&self) -> Result<Vec<Approval>, RepositoryError>;
}

pub trait EmailApplicationRepository: Send + Sync {
    fn insert_email_application(
        &self,
        application: EmailApplication,
    ) -> Result<EmailApplication, RepositoryError>;
    fn update_email_application(
        &self,
        application: EmailApplication,
    ) -> Result<EmailApplication, RepositoryError>;
    fn email_application(
        &self,
        id: &EmailApplicationId,
    ) -> Result<Option<EmailApplication>, RepositoryError>;
    fn email_applications(&self) -> Result<Vec<EmailApplication>, RepositoryError>;
}

pub trait LoanRepository: Send + Sync {
    fn insert_loan_application(
        &self,
        application: LoanApplication,
    ) -> Result<LoanApplication, RepositoryError>;
    fn update_loan_application(
        &self,
        application: LoanApplication,
    ) -> Result<LoanApplication, RepositoryError>;
    fn loan_application(
        &self,
        id: &LoanApplicationId,
    ) -> Result<Option<LoanApplication>, RepositoryError>;
    fn loan_applications(&self) -> Result<Vec<LoanApplication>, RepositoryError>;

    fn insert_transaction(
        &self,
        transaction: LoanTransaction,
    ) -> Result<LoanTransaction, RepositoryError>;
    fn update_transaction(
        &self,
        transaction: LoanTransaction,
    ) -> Result<LoanTransaction, RepositoryError>;
    fn transaction(&self, id: &TransactionId) -> Result<Option<LoanTransaction>, RepositoryError>;
    fn transactions_for(
        &self,
        loan: &LoanApplicationId,
    ) -> Result<Vec<LoanTransaction>, RepositoryError>;
    fn transactions(&self) -> Result<Vec<LoanTransaction>, RepositoryError>;
}

pub trait EquipmentRepository: Send + Sync {
    fn insert_equipment(&self, equipment: Equipment) -> Result<Equipment, RepositoryError>;
    fn update_equipment(&self, equipment: Equipment) -> Result<Equipment, RepositoryError>;
    fn equipment(&self, tag: &AssetTag) -> Result<Option<Equipment>, RepositoryError>;
    fn equipment_list(&self) -> Result<Vec<Equipment>, RepositoryError>;
}

/// One row write inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowWrite {
    InsertApproval(Approval),
    UpdateApproval(Approval),
    UpdateEmailApplication(EmailApplication),
    UpdateLoanApplication(LoanApplication),
    InsertTransaction(LoanTransaction),
    UpdateTransaction(LoanTransaction),
    UpdateEquipment(Equipment),
}

/// Writes that make up one workflow transition, in the order they were staged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    writes: Vec<RowWrite>,
}

impl ChangeSet {
    pub fn insert_approval(&mut self, approval: Approval) {
        self.writes.push(RowWrite::InsertApproval(approval));
    }

    pub fn update_approval(&mut self, approval: Approval) {
        self.writes.push(RowWrite::UpdateApproval(approval));
    }

    pub fn update_email_application(&mut self, application: EmailApplication) {
        self.writes.push(RowWrite::UpdateEmailApplication(application));
    }

    pub fn update_loan_application(&mut self, application: LoanApplication) {
        self.writes.push(RowWrite::UpdateLoanApplication(application));
    }

    pub fn insert_transaction(&mut self, transaction: LoanTransaction) {
        self.writes.push(RowWrite::InsertTransaction(transaction));
    }

    pub fn update_transaction(&mut self, transaction: LoanTransaction) {
        self.writes.push(RowWrite::UpdateTransaction(transaction));
    }

    pub fn update_equipment(&mut self, equipment: Equipment) {
        self.writes.push(RowWrite::UpdateEquipment(equipment));
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<RowWrite> {
        self.writes
    }
}

/// Rows written by a commit, versions bumped, grouped by table in write order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Committed {
    pub approvals: Vec<Approval>,
    pub email_applications: Vec<EmailApplication>,
    pub loan_applications: Vec<LoanApplication>,
    pub transactions: Vec<LoanTransaction>,
    pub equipment: Vec<Equipment>,
}

impl Committed {
    pub fn push(&mut self, row: RowWrite) {
        match row {
            RowWrite::InsertApproval(row) | RowWrite::UpdateApproval(row) => {
                self.approvals.push(row)
            }
            RowWrite::UpdateEmailApplication(row) => self.email_applications.push(row),
            RowWrite::UpdateLoanApplication(row) => self.loan_applications.push(row),
            RowWrite::InsertTransaction(row) | RowWrite::UpdateTransaction(row) => {
                self.transactions.push(row)
            }
            RowWrite::UpdateEquipment(row) => self.equipment.push(row),
        }
    }
}

/// Unwraps a row the caller staged itself; a backend that drops it is broken.
pub(crate) fn written<T>(row: Option<T>, entity: &'static str) -> Result<T, RepositoryError> {
    row.ok_or_else(|| RepositoryError::Unavailable(format!("commit did not return the {entity}")))
}

/// Applies a [`ChangeSet`] as a single transaction.
pub trait UnitOfWork: Send + Sync {
    /// Writes every row or none. Inserts fail with `Conflict` on an existing
    /// key and updates with `Stale` on a version mismatch, leaving storage
    /// untouched.
    fn commit(&self, changes: ChangeSet) -> Result<Committed, RepositoryError>;
}

/// Everything the workflow services need from storage.
pub trait WorkflowRepository:
    UserDirectory
    + ApprovalRepository
    + EmailApplicationRepository
    + LoanRepository
    + EquipmentRepository
    + UnitOfWork
{
}

impl<T> WorkflowRepository for T where
    T: UserDirectory
        + ApprovalRepository
        + EmailApplicationRepository
        + LoanRepository
        + EquipmentRepository
        + UnitOfWork
{
}
