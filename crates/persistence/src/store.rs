//! Ledger store traits
//!
//! Engines chỉ làm việc qua [`LedgerStore`] và [`UnitOfWork`]; mỗi thao tác
//! nghiệp vụ mở một unit of work với danh sách các dòng cần khóa, đọc/ghi
//! qua nó rồi `commit()`. Drop mà không commit = rollback.

use crate::error::PersistenceResult;
use crate::locks::LockKey;
use async_trait::async_trait;
use banco_core::{
    Account, AccountStatus, AuditEntry, BankUser, CompanyClient, Loan, LoanStatus, PersonClient,
    Transfer, TransferStatus, UserStatus,
};
use rust_decimal::Decimal;

/// Nguồn dữ liệu duy nhất của hệ thống
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Mở unit of work, giữ các row lock `locks` cho tới khi kết thúc
    async fn begin(&self, locks: Vec<LockKey>) -> PersistenceResult<Box<dyn UnitOfWork>>;
}

/// Một đơn vị công việc nguyên tử: đọc, kiểm tra, ghi, audit.
#[async_trait]
pub trait UnitOfWork: Send {
    // === Users ===
    async fn user(&mut self, id: i64) -> PersistenceResult<Option<BankUser>>;
    async fn user_by_identification(
        &mut self,
        identification: &str,
    ) -> PersistenceResult<Option<BankUser>>;
    /// Trả về ID mới; `AlreadyExists` nếu trùng identification
    async fn insert_user(&mut self, user: &BankUser) -> PersistenceResult<i64>;
    async fn update_user_status(&mut self, id: i64, status: UserStatus) -> PersistenceResult<()>;
    async fn users(&mut self) -> PersistenceResult<Vec<BankUser>>;

    // === Clients ===
    async fn insert_person_client(&mut self, client: &PersonClient) -> PersistenceResult<i64>;
    async fn person_client(
        &mut self,
        identification: &str,
    ) -> PersistenceResult<Option<PersonClient>>;
    async fn person_clients(&mut self) -> PersistenceResult<Vec<PersonClient>>;
    async fn insert_company_client(&mut self, client: &CompanyClient) -> PersistenceResult<i64>;
    async fn company_client(&mut self, nit: &str) -> PersistenceResult<Option<CompanyClient>>;
    async fn company_clients(&mut self) -> PersistenceResult<Vec<CompanyClient>>;

    // === Accounts ===
    async fn account(&mut self, number: &str) -> PersistenceResult<Option<Account>>;
    /// `AlreadyExists` nếu trùng số tài khoản
    async fn insert_account(&mut self, account: &Account) -> PersistenceResult<()>;
    async fn update_account_balance(
        &mut self,
        number: &str,
        balance: Decimal,
    ) -> PersistenceResult<()>;
    async fn update_account_status(
        &mut self,
        number: &str,
        status: AccountStatus,
    ) -> PersistenceResult<()>;
    async fn accounts_by_owner(&mut self, owner_id: &str) -> PersistenceResult<Vec<Account>>;
    async fn accounts(&mut self) -> PersistenceResult<Vec<Account>>;

    // === Loans ===
    async fn loan(&mut self, id: i64) -> PersistenceResult<Option<Loan>>;
    async fn insert_loan(&mut self, loan: &Loan) -> PersistenceResult<i64>;
    async fn update_loan(&mut self, loan: &Loan) -> PersistenceResult<()>;
    async fn loans_by_applicant(&mut self, applicant_id: &str) -> PersistenceResult<Vec<Loan>>;
    async fn loans_by_status(&mut self, status: LoanStatus) -> PersistenceResult<Vec<Loan>>;
    async fn loans(&mut self) -> PersistenceResult<Vec<Loan>>;

    // === Transfers ===
    async fn transfer(&mut self, id: i64) -> PersistenceResult<Option<Transfer>>;
    async fn insert_transfer(&mut self, transfer: &Transfer) -> PersistenceResult<i64>;
    /// Compare-and-set: chỉ ghi khi status hiện tại bằng `expected`.
    /// `false` nghĩa là thao tác khác đã chuyển trạng thái dòng này.
    async fn update_transfer(
        &mut self,
        transfer: &Transfer,
        expected: TransferStatus,
    ) -> PersistenceResult<bool>;
    async fn transfers_by_status(
        &mut self,
        status: TransferStatus,
    ) -> PersistenceResult<Vec<Transfer>>;
    /// Chuyển khoản có `number` là nguồn hoặc đích
    async fn transfers_by_account(&mut self, number: &str) -> PersistenceResult<Vec<Transfer>>;
    async fn transfers_by_creator(&mut self, creator_id: i64) -> PersistenceResult<Vec<Transfer>>;

    // === Audit ===
    async fn append_audit(&mut self, entry: &AuditEntry) -> PersistenceResult<i64>;
    /// Toàn bộ audit log, hoặc chỉ các entry của `product_id`
    async fn audit_entries(
        &mut self,
        product_id: Option<&str>,
    ) -> PersistenceResult<Vec<AuditEntry>>;

    /// Commit tất cả thay đổi. Gọi lần hai trả về `Closed`.
    async fn commit(&mut self) -> PersistenceResult<()>;
}
