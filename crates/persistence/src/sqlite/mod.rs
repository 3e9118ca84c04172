//! SQLite persistence module
//!
//! [`SqliteStore`]: mỗi unit of work là một sqlx transaction cộng với các row
//! lock của nó.

pub mod repos;
pub mod schema;

pub use repos::{AccountRepo, AuditRepo, ClientRepo, LoanRepo, TransferRepo, UserRepo};
pub use schema::{create_schema, AccountRow, AuditRow, LoanRow, TransferRow, UserRow};

use crate::config::StoreConfig;
use crate::error::{PersistenceError, PersistenceResult};
use crate::locks::{LockKey, RowLockGuard, RowLocks};
use crate::store::{LedgerStore, UnitOfWork};
use async_trait::async_trait;
use banco_core::{
    Account, AccountStatus, AuditEntry, BankUser, CompanyClient, Loan, LoanStatus, PersonClient,
    Transfer, TransferStatus, UserStatus,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Ledger store trên SQLite
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    locks: Arc<RowLocks>,
}

impl SqliteStore {
    /// Mở pool theo cấu hình (tạo file nếu chưa có)
    pub async fn connect(config: &StoreConfig) -> PersistenceResult<Self> {
        if config.max_connections == 0 {
            return Err(PersistenceError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .busy_timeout(config.acquire_timeout);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout);
        if config.is_in_memory() {
            // Database in-memory sống cùng connection: không được đóng nó
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        info!(
            url = %config.database_url,
            max_connections = config.max_connections,
            "ledger store connected"
        );

        Ok(Self {
            pool,
            locks: Arc::new(RowLocks::new(config.lock_timeout)),
        })
    }

    /// Kết nối và tạo schema
    pub async fn open(config: &StoreConfig) -> PersistenceResult<Self> {
        let store = Self::connect(config).await?;
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn init_schema(&self) -> PersistenceResult<()> {
        let mut conn = self.pool.acquire().await?;
        create_schema(&mut conn).await
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn begin(&self, locks: Vec<LockKey>) -> PersistenceResult<Box<dyn UnitOfWork>> {
        // Row locks trước, connection sau: ai đang giữ connection thì không
        // bao giờ phải chờ row lock.
        let guard = self.locks.acquire(locks).await?;
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteUnitOfWork {
            tx: Some(tx),
            _guard: guard,
        }))
    }
}

/// Unit of work = một transaction SQLite
pub struct SqliteUnitOfWork {
    tx: Option<Transaction<'static, Sqlite>>,
    _guard: RowLockGuard,
}

impl SqliteUnitOfWork {
    fn conn(&mut self) -> PersistenceResult<&mut SqliteConnection> {
        self.tx
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or(PersistenceError::Closed)
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    // === Users ===

    async fn user(&mut self, id: i64) -> PersistenceResult<Option<BankUser>> {
        UserRepo::get(self.conn()?, id).await
    }

    async fn user_by_identification(
        &mut self,
        identification: &str,
    ) -> PersistenceResult<Option<BankUser>> {
        UserRepo::get_by_identification(self.conn()?, identification).await
    }

    async fn insert_user(&mut self, user: &BankUser) -> PersistenceResult<i64> {
        UserRepo::insert(self.conn()?, user).await
    }

    async fn update_user_status(&mut self, id: i64, status: UserStatus) -> PersistenceResult<()> {
        UserRepo::update_status(self.conn()?, id, status).await
    }

    async fn users(&mut self) -> PersistenceResult<Vec<BankUser>> {
        UserRepo::get_all(self.conn()?).await
    }

    // === Clients ===

    async fn insert_person_client(&mut self, client: &PersonClient) -> PersistenceResult<i64> {
        ClientRepo::insert_person(self.conn()?, client).await
    }

    async fn person_client(
        &mut self,
        identification: &str,
    ) -> PersistenceResult<Option<PersonClient>> {
        ClientRepo::get_person(self.conn()?, identification).await
    }

    async fn person_clients(&mut self) -> PersistenceResult<Vec<PersonClient>> {
        ClientRepo::get_all_persons(self.conn()?).await
    }

    async fn insert_company_client(&mut self, client: &CompanyClient) -> PersistenceResult<i64> {
        ClientRepo::insert_company(self.conn()?, client).await
    }

    async fn company_client(&mut self, nit: &str) -> PersistenceResult<Option<CompanyClient>> {
        ClientRepo::get_company(self.conn()?, nit).await
    }

    async fn company_clients(&mut self) -> PersistenceResult<Vec<CompanyClient>> {
        ClientRepo::get_all_companies(self.conn()?).await
    }

    // === Accounts ===

    async fn account(&mut self, number: &str) -> PersistenceResult<Option<Account>> {
        AccountRepo::get(self.conn()?, number).await
    }

    async fn insert_account(&mut self, account: &Account) -> PersistenceResult<()> {
        AccountRepo::insert(self.conn()?, account).await
    }

    async fn update_account_balance(
        &mut self,
        number: &str,
        balance: Decimal,
    ) -> PersistenceResult<()> {
        AccountRepo::update_balance(self.conn()?, number, balance).await
    }

    async fn update_account_status(
        &mut self,
        number: &str,
        status: AccountStatus,
    ) -> PersistenceResult<()> {
        AccountRepo::update_status(self.conn()?, number, status).await
    }

    async fn accounts_by_owner(&mut self, owner_id: &str) -> PersistenceResult<Vec<Account>> {
        AccountRepo::get_by_owner(self.conn()?, owner_id).await
    }

    async fn accounts(&mut self) -> PersistenceResult<Vec<Account>> {
        AccountRepo::get_all(self.conn()?).await
    }

    // === Loans ===

    async fn loan(&mut self, id: i64) -> PersistenceResult<Option<Loan>> {
        LoanRepo::get(self.conn()?, id).await
    }

    async fn insert_loan(&mut self, loan: &Loan) -> PersistenceResult<i64> {
        LoanRepo::insert(self.conn()?, loan).await
    }

    async fn update_loan(&mut self, loan: &Loan) -> PersistenceResult<()> {
        LoanRepo::update(self.conn()?, loan).await
    }

    async fn loans_by_applicant(&mut self, applicant_id: &str) -> PersistenceResult<Vec<Loan>> {
        LoanRepo::get_by_applicant(self.conn()?, applicant_id).await
    }

    async fn loans_by_status(&mut self, status: LoanStatus) -> PersistenceResult<Vec<Loan>> {
        LoanRepo::get_by_status(self.conn()?, status).await
    }

    async fn loans(&mut self) -> PersistenceResult<Vec<Loan>> {
        LoanRepo::get_all(self.conn()?).await
    }

    // === Transfers ===

    async fn transfer(&mut self, id: i64) -> PersistenceResult<Option<Transfer>> {
        TransferRepo::get(self.conn()?, id).await
    }

    async fn insert_transfer(&mut self, transfer: &Transfer) -> PersistenceResult<i64> {
        TransferRepo::insert(self.conn()?, transfer).await
    }

    async fn update_transfer(
        &mut self,
        transfer: &Transfer,
        expected: TransferStatus,
    ) -> PersistenceResult<bool> {
        TransferRepo::update_if_status(self.conn()?, transfer, expected).await
    }

    async fn transfers_by_status(
        &mut self,
        status: TransferStatus,
    ) -> PersistenceResult<Vec<Transfer>> {
        TransferRepo::get_by_status(self.conn()?, status).await
    }

    async fn transfers_by_account(&mut self, number: &str) -> PersistenceResult<Vec<Transfer>> {
        TransferRepo::get_by_account(self.conn()?, number).await
    }

    async fn transfers_by_creator(&mut self, creator_id: i64) -> PersistenceResult<Vec<Transfer>> {
        TransferRepo::get_by_creator(self.conn()?, creator_id).await
    }

    // === Audit ===

    async fn append_audit(&mut self, entry: &AuditEntry) -> PersistenceResult<i64> {
        AuditRepo::insert(self.conn()?, entry).await
    }

    async fn audit_entries(
        &mut self,
        product_id: Option<&str>,
    ) -> PersistenceResult<Vec<AuditEntry>> {
        match product_id {
            Some(product_id) => AuditRepo::get_by_product(self.conn()?, product_id).await,
            None => AuditRepo::get_all(self.conn()?).await,
        }
    }

    async fn commit(&mut self) -> PersistenceResult<()> {
        let tx = self.tx.take().ok_or(PersistenceError::Closed)?;
        tx.commit().await?;
        Ok(())
    }
}
