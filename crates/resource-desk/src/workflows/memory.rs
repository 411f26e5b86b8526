//! In-process repository and outbox used by the API binary, the demo and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::approvals::{Approvable, Approval, ApprovalId};
use super::directory::{User, UserId};
use super::email::{EmailApplication, EmailApplicationId};
use super::equipment::{AssetTag, Equipment};
use super::loans::{LoanApplication, LoanApplicationId, LoanTransaction, TransactionId};
use super::notifications::{Notification, NotificationOutbox, OutboxError};
use super::repository::{
    ApprovalRepository, ChangeSet, Committed, EmailApplicationRepository, EquipmentRepository,
    LoanRepository, RepositoryError, RowWrite, UnitOfWork, UserDirectory,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    approvals: BTreeMap<ApprovalId, Approval>,
    email_applications: BTreeMap<EmailApplicationId, EmailApplication>,
    loan_applications: BTreeMap<LoanApplicationId, LoanApplication>,
    transactions: BTreeMap<TransactionId, LoanTransaction>,
    equipment: BTreeMap<AssetTag, Equipment>,
}

/// Every repository behind one mutex. Updates are compare-and-set on `version`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn with_users<I>(users: I) -> Self
    where
        I: IntoIterator<Item = User>,
    {
        let store = Self::default();
        if let Ok(mut tables) = store.tables.lock() {
            tables
                .users
                .extend(users.into_iter().map(|user| (user.id.clone(), user)));
        }
        store
    }

    pub fn upsert_user(&self, user: User) -> Result<(), RepositoryError> {
        self.tables()?.users.insert(user.id.clone(), user);
        Ok(())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store mutex poisoned".to_string()))
    }
}

trait Versioned: Clone {
    const ENTITY: &'static str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn key(&self) -> String;
}

macro_rules! versioned {
    ($ty:ty, $entity:literal, |$row:ident| $key:expr) => {
        impl Versioned for $ty {
            const ENTITY: &'static str = $entity;

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }

            fn key(&self) -> String {
                let $row = self;
                $key
            }
        }
    };
}

versioned!(Approval, "approval", |row| row.id.0.clone());
versioned!(EmailApplication, "email application", |row| row.id.0.clone());
versioned!(LoanApplication, "loan application", |row| row.id.0.clone());
versioned!(LoanTransaction, "loan transaction", |row| row.id.0.clone());
versioned!(Equipment, "equipment", |row| row.asset_tag.0.clone());

fn insert_row<K, T>(table: &mut BTreeMap<K, T>, key: K, mut row: T) -> Result<T, RepositoryError>
where
    K: Ord,
    T: Versioned,
{
    if table.contains_key(&key) {
        return Err(RepositoryError::Conflict);
    }
    row.set_version(1);
    table.insert(key, row.clone());
    Ok(row)
}

fn update_row<K, T>(table: &mut BTreeMap<K, T>, key: &K, mut row: T) -> Result<T, RepositoryError>
where
    K: Ord,
    T: Versioned,
{
    let stored = table.get_mut(key).ok_or(RepositoryError::NotFound)?;
    if stored.version() != row.version() {
        return Err(RepositoryError::Stale {
            entity: T::ENTITY,
            id: row.key(),
        });
    }
    row.set_version(row.version() + 1);
    *stored = row.clone();
    Ok(row)
}

impl UserDirectory for MemoryStore {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables()?.users.get(id).cloned())
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self.tables()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }
}

impl ApprovalRepository for MemoryStore {
    fn insert_approval(&self, approval: Approval) -> Result<Approval, RepositoryError> {
        let key = approval.id.clone();
        insert_row(&mut self.tables()?.approvals, key, approval)
    }

    fn update_approval(&self, approval: Approval) -> Result<Approval, RepositoryError> {
        let key = approval.id.clone();
        update_row(&mut self.tables()?.approvals, &key, approval)
    }

    fn approval(&self, id: &ApprovalId) -> Result<Option<Approval>, RepositoryError> {
        Ok(self.tables()?.approvals.get(id).cloned())
    }

    fn approvals_for(&self, approvable: &Approvable) -> Result<Vec<Approval>, RepositoryError> {
        Ok(self
            .tables()?
            .approvals
            .values()
            .filter(|approval| &approval.approvable == approvable)
            .cloned()
            .collect())
    }

    fn approvals(&self) -> Result<Vec<Approval>, RepositoryError> {
        Ok(self.tables()?.approvals.values().cloned().collect())
    }
}

impl EmailApplicationRepository for MemoryStore {
    fn insert_email_application(
        &self,
        application: EmailApplication,
    ) -> Result<EmailApplication, RepositoryError> {
        let key = application.id.clone();
        insert_row(&mut self.tables()?.email_applications, key, application)
    }

    fn update_email_application(
        &self,
        application: EmailApplication,
    ) -> Result<EmailApplication, RepositoryError> {
        let key = application.id.clone();
        update_row(&mut self.tables()?.email_applications, &key, application)
    }

    fn email_application(
        &self,
        id: &EmailApplicationId,
    ) -> Result<Option<EmailApplication>, RepositoryError> {
        Ok(self.tables()?.email_applications.get(id).cloned())
    }

    fn email_applications(&self) -> Result<Vec<EmailApplication>, RepositoryError> {
        Ok(self.tables()?.email_applications.values().cloned().collect())
    }
}

impl LoanRepository for MemoryStore {
    fn insert_loan_application(
        &self,
        application: LoanApplication,
    ) -> Result<LoanApplication, RepositoryError> {
        let key = application.id.clone();
        insert_row(&mut self.tables()?.loan_applications, key, application)
    }

    fn update_loan_application(
        &self,
        application: LoanApplication,
    ) -> Result<LoanApplication, RepositoryError> {
        let key = application.id.clone();
        update_row(&mut self.tables()?.loan_applications, &key, application)
    }

    fn loan_application(
        &self,
        id: &LoanApplicationId,
    ) -> Result<Option<LoanApplication>, RepositoryError> {
        Ok(self.tables()?.loan_applications.get(id).cloned())
    }

    fn loan_applications(&self) -> Result<Vec<LoanApplication>, RepositoryError> {
        Ok(self.tables()?.loan_applications.values().cloned().collect())
    }

    fn insert_transaction(
        &self,
        transaction: LoanTransaction,
    ) -> Result<LoanTransaction, RepositoryError> {
        let key = transaction.id.clone();
        insert_row(&mut self.tables()?.transactions, key, transaction)
    }

    fn update_transaction(
        &self,
        transaction: LoanTransaction,
    ) -> Result<LoanTransaction, RepositoryError> {
        let key = transaction.id.clone();
        update_row(&mut self.tables()?.transactions, &key, transaction)
    }

    fn transaction(&self, id: &TransactionId) -> Result<Option<LoanTransaction>, RepositoryError> {
        Ok(self.tables()?.transactions.get(id).cloned())
    }

    fn transactions_for(
        &self,
        loan: &LoanApplicationId,
    ) -> Result<Vec<LoanTransaction>, RepositoryError> {
        Ok(self
            .tables()?
            .transactions
            .values()
            .filter(|txn| &txn.loan_application_id == loan)
            .cloned()
            .collect())
    }

    fn transactions(&self) -> Result<Vec<LoanTransaction>, RepositoryError> {
        Ok(self.tables()?.transactions.values().cloned().collect())
    }
}

impl EquipmentRepository for MemoryStore {
    fn insert_equipment(&self, equipment: Equipment) -> Result<Equipment, RepositoryError> {
        let key = equipment.asset_tag.clone();
        insert_row(&mut self.tables()?.equipment, key, equipment)
    }

    fn update_equipment(&self, equipment: Equipment) -> Result<Equipment, RepositoryError> {
        let key = equipment.asset_tag.clone();
        update_row(&mut self.tables()?.equipment, &key, equipment)
    }

    fn equipment(&self, tag: &AssetTag) -> Result<Option<Equipment>, RepositoryError> {
        Ok(self.tables()?.equipment.get(tag).cloned())
    }

    fn equipment_list(&self) -> Result<Vec<Equipment>, RepositoryError> {
        Ok(self.tables()?.equipment.values().cloned().collect())
    }
}

impl UnitOfWork for MemoryStore {
    fn commit(&self, changes: ChangeSet) -> Result<Committed, RepositoryError> {
        let mut tables = self.tables()?;
        let mut staged = tables.clone();
        let mut committed = Committed::default();

        for write in changes.into_writes() {
            let row = match write {
                RowWrite::InsertApproval(row) => {
                    let key = row.id.clone();
                    RowWrite::InsertApproval(insert_row(&mut staged.approvals, key, row)?)
                }
                RowWrite::UpdateApproval(row) => {
                    let key = row.id.clone();
                    RowWrite::UpdateApproval(update_row(&mut staged.approvals, &key, row)?)
                }
                RowWrite::UpdateEmailApplication(row) => {
                    let key = row.id.clone();
                    RowWrite::UpdateEmailApplication(update_row(
                        &mut staged.email_applications,
                        &key,
                        row,
                    )?)
                }
                RowWrite::UpdateLoanApplication(row) => {
                    let key = row.id.clone();
                    RowWrite::UpdateLoanApplication(update_row(
                        &mut staged.loan_applications,
                        &key,
                        row,
                    )?)
                }
                RowWrite::InsertTransaction(row) => {
                    let key = row.id.clone();
                    RowWrite::InsertTransaction(insert_row(&mut staged.transactions, key, row)?)
                }
                RowWrite::UpdateTransaction(row) => {
                    let key = row.id.clone();
                    RowWrite::UpdateTransaction(update_row(&mut staged.transactions, &key, row)?)
                }
                RowWrite::UpdateEquipment(row) => {
                    let key = row.asset_tag.clone();
                    RowWrite::UpdateEquipment(update_row(&mut staged.equipment, &key, row)?)
                }
            };
            committed.push(row);
        }

        *tables = staged;
        Ok(committed)
    }
}

/// A delivered notification as shown in the in-app inbox.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboxEntry {
    pub id: u64,
    #[serde(flatten)]
    pub notification: Notification,
    pub read_at: Option<DateTime<Utc>>,
}

/// Records every notification; doubles as the database channel.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    entries: Mutex<Vec<InboxEntry>>,
}

impl MemoryOutbox {
    fn entries(&self) -> MutexGuard<'_, Vec<InboxEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.entries()
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    /// Newest first.
    pub fn inbox(&self, user: &UserId) -> Vec<InboxEntry> {
        let mut entries: Vec<InboxEntry> = self
            .entries()
            .iter()
            .filter(|entry| &entry.notification.recipient == user)
            .cloned()
            .collect();
        entries.reverse();
        entries
    }

    pub fn unread_count(&self, user: &UserId) -> usize {
        self.entries()
            .iter()
            .filter(|entry| &entry.notification.recipient == user && entry.read_at.is_none())
            .count()
    }

    /// Marks one entry read. Returns `None` when the entry does not belong to `user`.
    pub fn mark_read(&self, user: &UserId, id: u64, at: DateTime<Utc>) -> Option<InboxEntry> {
        let mut entries = self.entries();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id && &entry.notification.recipient == user)?;
        entry.read_at.get_or_insert(at);
        Some(entry.clone())
    }
}

impl NotificationOutbox for MemoryOutbox {
    fn publish(&self, notification: Notification) -> Result<(), OutboxError> {
        let mut entries = self.entries();
        let id = entries.len() as u64 + 1;
        entries.push(InboxEntry {
            id,
            notification,
            read_at: None,
        });
        Ok(())
    }
}
