//! In-memory ledger store
//!
//! Dùng cho test của các engine. Unit of work ghi vào một overlay riêng;
//! `commit()` kiểm tra ràng buộc unique và compare-and-set rồi áp overlay vào
//! bảng chung trong một critical section. Drop không commit = bỏ overlay.

use crate::error::{PersistenceError, PersistenceResult};
use crate::locks::{LockKey, RowLockGuard, RowLocks};
use crate::store::{LedgerStore, UnitOfWork};
use async_trait::async_trait;
use banco_core::{
    Account, AccountStatus, AuditEntry, BankUser, CompanyClient, Loan, LoanStatus, PersonClient,
    Transfer, TransferStatus, UserStatus,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default, Clone)]
struct Tables {
    users: BTreeMap<i64, BankUser>,
    person_clients: BTreeMap<i64, PersonClient>,
    company_clients: BTreeMap<i64, CompanyClient>,
    accounts: BTreeMap<String, Account>,
    loans: BTreeMap<i64, Loan>,
    transfers: BTreeMap<i64, Transfer>,
    audit: BTreeMap<i64, AuditEntry>,
}

#[derive(Debug, Default)]
struct Sequences {
    user: AtomicI64,
    person_client: AtomicI64,
    company_client: AtomicI64,
    loan: AtomicI64,
    transfer: AtomicI64,
    audit: AtomicI64,
}

fn next(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Debug)]
struct Shared {
    tables: Mutex<Tables>,
    sequences: Sequences,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Overlay chỉ được áp sau khi mọi kiểm tra thành công, nên dữ liệu
        // không bao giờ ở trạng thái dở dang khi poisoned
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Ledger store giữ toàn bộ dữ liệu trong bộ nhớ
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
    locks: Arc<RowLocks>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(5_000))
    }
}

impl InMemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                sequences: Sequences::default(),
            }),
            locks: Arc::new(RowLocks::new(lock_timeout)),
        }
    }

    /// Số entry đã commit trong audit log
    pub fn audit_len(&self) -> usize {
        self.shared.tables().audit.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn begin(&self, locks: Vec<LockKey>) -> PersistenceResult<Box<dyn UnitOfWork>> {
        let guard = self.locks.acquire(locks).await?;
        Ok(Box::new(InMemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            staged: Tables::default(),
            transfer_checks: Vec::new(),
            new_users: Vec::new(),
            new_accounts: Vec::new(),
            new_person_clients: Vec::new(),
            new_company_clients: Vec::new(),
            committed: false,
            _guard: guard,
        }))
    }
}

/// Unit of work với overlay riêng
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    staged: Tables,
    /// (transfer id, status mong đợi) được kiểm tra lại lúc commit
    transfer_checks: Vec<(i64, TransferStatus)>,
    new_users: Vec<i64>,
    new_accounts: Vec<String>,
    new_person_clients: Vec<i64>,
    new_company_clients: Vec<i64>,
    committed: bool,
    _guard: RowLockGuard,
}

/// Dòng mới nhất: overlay trước, bảng chung sau
fn latest<K: Ord, V: Clone>(
    staged: &BTreeMap<K, V>,
    committed: &BTreeMap<K, V>,
    key: &K,
) -> Option<V> {
    staged.get(key).or_else(|| committed.get(key)).cloned()
}

/// Gộp overlay và bảng chung rồi lọc
fn merged<K: Ord + Clone, V: Clone>(
    staged: &BTreeMap<K, V>,
    committed: &BTreeMap<K, V>,
    keep: impl Fn(&V) -> bool,
) -> Vec<V> {
    let mut all = committed.clone();
    all.extend(staged.iter().map(|(k, v)| (k.clone(), v.clone())));
    all.into_values().filter(|v| keep(v)).collect()
}

impl InMemoryUnitOfWork {
    fn ensure_open(&self) -> PersistenceResult<()> {
        if self.committed {
            return Err(PersistenceError::Closed);
        }
        Ok(())
    }

    fn current_account(&self, number: &str) -> Option<Account> {
        let tables = self.shared.tables();
        latest(&self.staged.accounts, &tables.accounts, &number.to_string())
    }

    fn current_user(&self, id: i64) -> Option<BankUser> {
        let tables = self.shared.tables();
        latest(&self.staged.users, &tables.users, &id)
    }

    fn current_transfer(&self, id: i64) -> Option<Transfer> {
        let tables = self.shared.tables();
        latest(&self.staged.transfers, &tables.transfers, &id)
    }

    /// Kiểm tra ràng buộc lúc commit, trên bảng chung đang bị khóa
    fn verify(&self, tables: &Tables) -> PersistenceResult<()> {
        for (id, expected) in &self.transfer_checks {
            if let Some(current) = tables.transfers.get(id) {
                if current.status != *expected {
                    return Err(PersistenceError::Conflict {
                        entity: "Transfer".to_string(),
                        id: id.to_string(),
                    });
                }
            }
        }
        for number in &self.new_accounts {
            if tables.accounts.contains_key(number) {
                return Err(PersistenceError::already_exists("Account", number));
            }
        }
        for id in &self.new_users {
            if let Some(user) = self.staged.users.get(id) {
                if tables
                    .users
                    .values()
                    .any(|u| u.identification == user.identification)
                {
                    return Err(PersistenceError::already_exists("User", &user.identification));
                }
            }
        }
        for id in &self.new_person_clients {
            if let Some(client) = self.staged.person_clients.get(id) {
                if tables
                    .person_clients
                    .values()
                    .any(|c| c.identification == client.identification)
                {
                    return Err(PersistenceError::already_exists(
                        "PersonClient",
                        &client.identification,
                    ));
                }
            }
        }
        for id in &self.new_company_clients {
            if let Some(client) = self.staged.company_clients.get(id) {
                if tables.company_clients.values().any(|c| c.nit == client.nit) {
                    return Err(PersistenceError::already_exists("CompanyClient", &client.nit));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    // === Users ===

    async fn user(&mut self, id: i64) -> PersistenceResult<Option<BankUser>> {
        self.ensure_open()?;
        Ok(self.current_user(id))
    }

    async fn user_by_identification(
        &mut self,
        identification: &str,
    ) -> PersistenceResult<Option<BankUser>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.users, &tables.users, |u| {
            u.identification == identification
        })
        .into_iter()
        .next())
    }

    async fn insert_user(&mut self, user: &BankUser) -> PersistenceResult<i64> {
        if self.user_by_identification(&user.identification).await?.is_some() {
            return Err(PersistenceError::already_exists("User", &user.identification));
        }
        let id = next(&self.shared.sequences.user);
        let mut user = user.clone();
        user.id = id;
        self.staged.users.insert(id, user);
        self.new_users.push(id);
        Ok(id)
    }

    async fn update_user_status(&mut self, id: i64, status: UserStatus) -> PersistenceResult<()> {
        self.ensure_open()?;
        let mut user = self
            .current_user(id)
            .ok_or_else(|| PersistenceError::not_found("User", id))?;
        user.status = status;
        self.staged.users.insert(id, user);
        Ok(())
    }

    async fn users(&mut self) -> PersistenceResult<Vec<BankUser>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.users, &tables.users, |_| true))
    }

    // === Clients ===

    async fn insert_person_client(&mut self, client: &PersonClient) -> PersistenceResult<i64> {
        if self.person_client(&client.identification).await?.is_some() {
            return Err(PersistenceError::already_exists(
                "PersonClient",
                &client.identification,
            ));
        }
        let id = next(&self.shared.sequences.person_client);
        let mut client = client.clone();
        client.id = id;
        self.staged.person_clients.insert(id, client);
        self.new_person_clients.push(id);
        Ok(id)
    }

    async fn person_client(
        &mut self,
        identification: &str,
    ) -> PersistenceResult<Option<PersonClient>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.person_clients, &tables.person_clients, |c| {
            c.identification == identification
        })
        .into_iter()
        .next())
    }

    async fn person_clients(&mut self) -> PersistenceResult<Vec<PersonClient>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.person_clients, &tables.person_clients, |_| true))
    }

    async fn insert_company_client(&mut self, client: &CompanyClient) -> PersistenceResult<i64> {
        if self.company_client(&client.nit).await?.is_some() {
            return Err(PersistenceError::already_exists("CompanyClient", &client.nit));
        }
        let id = next(&self.shared.sequences.company_client);
        let mut client = client.clone();
        client.id = id;
        self.staged.company_clients.insert(id, client);
        self.new_company_clients.push(id);
        Ok(id)
    }

    async fn company_client(&mut self, nit: &str) -> PersistenceResult<Option<CompanyClient>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.company_clients, &tables.company_clients, |c| c.nit == nit)
            .into_iter()
            .next())
    }

    async fn company_clients(&mut self) -> PersistenceResult<Vec<CompanyClient>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.company_clients, &tables.company_clients, |_| true))
    }

    // === Accounts ===

    async fn account(&mut self, number: &str) -> PersistenceResult<Option<Account>> {
        self.ensure_open()?;
        Ok(self.current_account(number))
    }

    async fn insert_account(&mut self, account: &Account) -> PersistenceResult<()> {
        self.ensure_open()?;
        if self.current_account(&account.number).is_some() {
            return Err(PersistenceError::already_exists("Account", &account.number));
        }
        self.staged
            .accounts
            .insert(account.number.clone(), account.clone());
        self.new_accounts.push(account.number.clone());
        Ok(())
    }

    async fn update_account_balance(
        &mut self,
        number: &str,
        balance: Decimal,
    ) -> PersistenceResult<()> {
        self.ensure_open()?;
        let mut account = self
            .current_account(number)
            .ok_or_else(|| PersistenceError::not_found("Account", number))?;
        account.balance = balance;
        self.staged.accounts.insert(number.to_string(), account);
        Ok(())
    }

    async fn update_account_status(
        &mut self,
        number: &str,
        status: AccountStatus,
    ) -> PersistenceResult<()> {
        self.ensure_open()?;
        let mut account = self
            .current_account(number)
            .ok_or_else(|| PersistenceError::not_found("Account", number))?;
        account.status = status;
        self.staged.accounts.insert(number.to_string(), account);
        Ok(())
    }

    async fn accounts_by_owner(&mut self, owner_id: &str) -> PersistenceResult<Vec<Account>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.accounts, &tables.accounts, |a| {
            a.owner_id == owner_id
        }))
    }

    async fn accounts(&mut self) -> PersistenceResult<Vec<Account>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.accounts, &tables.accounts, |_| true))
    }

    // === Loans ===

    async fn loan(&mut self, id: i64) -> PersistenceResult<Option<Loan>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(latest(&self.staged.loans, &tables.loans, &id))
    }

    async fn insert_loan(&mut self, loan: &Loan) -> PersistenceResult<i64> {
        self.ensure_open()?;
        let id = next(&self.shared.sequences.loan);
        let mut loan = loan.clone();
        loan.id = id;
        self.staged.loans.insert(id, loan);
        Ok(id)
    }

    async fn update_loan(&mut self, loan: &Loan) -> PersistenceResult<()> {
        if self.loan(loan.id).await?.is_none() {
            return Err(PersistenceError::not_found("Loan", loan.id));
        }
        self.staged.loans.insert(loan.id, loan.clone());
        Ok(())
    }

    async fn loans_by_applicant(&mut self, applicant_id: &str) -> PersistenceResult<Vec<Loan>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        let mut loans = merged(&self.staged.loans, &tables.loans, |l| {
            l.applicant_id == applicant_id
        });
        loans.reverse();
        Ok(loans)
    }

    async fn loans_by_status(&mut self, status: LoanStatus) -> PersistenceResult<Vec<Loan>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.loans, &tables.loans, |l| l.status == status))
    }

    async fn loans(&mut self) -> PersistenceResult<Vec<Loan>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        let mut loans = merged(&self.staged.loans, &tables.loans, |_| true);
        loans.reverse();
        Ok(loans)
    }

    // === Transfers ===

    async fn transfer(&mut self, id: i64) -> PersistenceResult<Option<Transfer>> {
        self.ensure_open()?;
        Ok(self.current_transfer(id))
    }

    async fn insert_transfer(&mut self, transfer: &Transfer) -> PersistenceResult<i64> {
        self.ensure_open()?;
        let id = next(&self.shared.sequences.transfer);
        let mut transfer = transfer.clone();
        transfer.id = id;
        self.staged.transfers.insert(id, transfer);
        Ok(id)
    }

    async fn update_transfer(
        &mut self,
        transfer: &Transfer,
        expected: TransferStatus,
    ) -> PersistenceResult<bool> {
        self.ensure_open()?;
        match self.current_transfer(transfer.id) {
            Some(current) if current.status == expected => {
                self.staged.transfers.insert(transfer.id, transfer.clone());
                self.transfer_checks.push((transfer.id, expected));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transfers_by_status(
        &mut self,
        status: TransferStatus,
    ) -> PersistenceResult<Vec<Transfer>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.transfers, &tables.transfers, |t| {
            t.status == status
        }))
    }

    async fn transfers_by_account(&mut self, number: &str) -> PersistenceResult<Vec<Transfer>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        let mut transfers = merged(&self.staged.transfers, &tables.transfers, |t| {
            t.source_account == number || t.destination_account == number
        });
        transfers.reverse();
        Ok(transfers)
    }

    async fn transfers_by_creator(&mut self, creator_id: i64) -> PersistenceResult<Vec<Transfer>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        let mut transfers = merged(&self.staged.transfers, &tables.transfers, |t| {
            t.creator_id == creator_id
        });
        transfers.reverse();
        Ok(transfers)
    }

    // === Audit ===

    async fn append_audit(&mut self, entry: &AuditEntry) -> PersistenceResult<i64> {
        self.ensure_open()?;
        let id = next(&self.shared.sequences.audit);
        let mut entry = entry.clone();
        entry.id = id;
        self.staged.audit.insert(id, entry);
        Ok(id)
    }

    async fn audit_entries(
        &mut self,
        product_id: Option<&str>,
    ) -> PersistenceResult<Vec<AuditEntry>> {
        self.ensure_open()?;
        let tables = self.shared.tables();
        Ok(merged(&self.staged.audit, &tables.audit, |e| match product_id {
            Some(product_id) => e.affected_product_id.as_deref() == Some(product_id),
            None => true,
        }))
    }

    async fn commit(&mut self) -> PersistenceResult<()> {
        self.ensure_open()?;
        let staged = std::mem::take(&mut self.staged);
        {
            let mut tables = self.shared.tables();
            self.verify(&tables)?;
            tables.users.extend(staged.users);
            tables.person_clients.extend(staged.person_clients);
            tables.company_clients.extend(staged.company_clients);
            tables.accounts.extend(staged.accounts);
            tables.loans.extend(staged.loans);
            tables.transfers.extend(staged.transfers);
            tables.audit.extend(staged.audit);
        }
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banco_core::{AccountType, Currency};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(number: &str) -> Account {
        Account::open(
            number.to_string(),
            AccountType::Checking,
            "CC-1",
            Currency::Cop,
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards() {
        let store = InMemoryStore::default();
        {
            let mut uow = store.begin(vec![]).await.unwrap();
            uow.insert_account(&account("0000000001")).await.unwrap();
            assert!(uow.account("0000000001").await.unwrap().is_some());
        }

        let mut uow = store.begin(vec![]).await.unwrap();
        assert!(uow.account("0000000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_applies_and_closes() {
        let store = InMemoryStore::default();
        let mut uow = store
            .begin(vec![LockKey::Account("0000000001".to_string())])
            .await
            .unwrap();
        uow.insert_account(&account("0000000001")).await.unwrap();
        uow.update_account_balance("0000000001", dec!(50)).await.unwrap();
        uow.commit().await.unwrap();
        assert!(matches!(uow.commit().await, Err(PersistenceError::Closed)));
        drop(uow);

        let mut uow = store.begin(vec![]).await.unwrap();
        let stored = uow.account("0000000001").await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(50));
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected_at_commit() {
        let store = InMemoryStore::default();
        let mut first = store.begin(vec![]).await.unwrap();
        let mut second = store.begin(vec![]).await.unwrap();
        first.insert_account(&account("0000000007")).await.unwrap();
        second.insert_account(&account("0000000007")).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_transfer_compare_and_set() {
        let store = InMemoryStore::default();
        let mut uow = store.begin(vec![]).await.unwrap();
        let pending = Transfer::new(
            "0000000001",
            "0000000002",
            dec!(6000000),
            TransferStatus::PendingApproval,
            1,
            None,
            Utc::now(),
        )
        .unwrap();
        let id = uow.insert_transfer(&pending).await.unwrap();
        uow.commit().await.unwrap();
        drop(uow);

        let mut uow = store.begin(vec![LockKey::Transfer(id)]).await.unwrap();
        let mut transfer = uow.transfer(id).await.unwrap().unwrap();
        transfer.expire().unwrap();
        assert!(uow
            .update_transfer(&transfer, TransferStatus::PendingApproval)
            .await
            .unwrap());
        // Second write sees the staged terminal state
        assert!(!uow
            .update_transfer(&transfer, TransferStatus::PendingApproval)
            .await
            .unwrap());
        uow.commit().await.unwrap();
    }
}
