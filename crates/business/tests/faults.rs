//! Failure injection: audit writes that fail, owners that change mid-operation

use async_trait::async_trait;
use banco_business::{
    AccountService, BankError, ErrorKind, LoanApplication, LoanService, ManualClock,
    ServiceContext, TransferRequest, TransferService, UserRegistration, UserService,
};
use banco_core::{
    Account, AccountStatus, AccountType, Actor, AuditEntry, BankUser, CompanyClient, Currency,
    Loan, LoanStatus, LoanType, PersonClient, Transfer, TransferStatus, UserRole, UserStatus,
};
use banco_persistence::{
    InMemoryStore, LedgerStore, LockKey, PersistenceError, PersistenceResult, UnitOfWork,
};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// In-memory store with switchable faults
#[derive(Default)]
struct FaultyStore {
    inner: InMemoryStore,
    /// Every audit append fails while set
    fail_audit: Arc<AtomicBool>,
    /// Deactivate this user id right before the next account-locking unit of work
    deactivate_before_lock: AtomicI64,
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn begin(&self, locks: Vec<LockKey>) -> PersistenceResult<Box<dyn UnitOfWork>> {
        let touches_account = locks.iter().any(|k| matches!(k, LockKey::Account(_)));
        if touches_account {
            let user_id = self.deactivate_before_lock.swap(0, Ordering::SeqCst);
            if user_id != 0 {
                let mut uow = self.inner.begin(Vec::new()).await?;
                uow.update_user_status(user_id, UserStatus::Inactive).await?;
                uow.commit().await?;
            }
        }

        let inner = self.inner.begin(locks).await?;
        Ok(Box::new(FaultyUnit {
            inner,
            fail_audit: self.fail_audit.clone(),
        }))
    }
}

struct FaultyUnit {
    inner: Box<dyn UnitOfWork>,
    fail_audit: Arc<AtomicBool>,
}

#[async_trait]
impl UnitOfWork for FaultyUnit {
    async fn user(&mut self, id: i64) -> PersistenceResult<Option<BankUser>> {
        self.inner.user(id).await
    }
    async fn user_by_identification(
        &mut self,
        identification: &str,
    ) -> PersistenceResult<Option<BankUser>> {
        self.inner.user_by_identification(identification).await
    }
    async fn insert_user(&mut self, user: &BankUser) -> PersistenceResult<i64> {
        self.inner.insert_user(user).await
    }
    async fn update_user_status(&mut self, id: i64, status: UserStatus) -> PersistenceResult<()> {
        self.inner.update_user_status(id, status).await
    }
    async fn users(&mut self) -> PersistenceResult<Vec<BankUser>> {
        self.inner.users().await
    }

    async fn insert_person_client(&mut self, client: &PersonClient) -> PersistenceResult<i64> {
        self.inner.insert_person_client(client).await
    }
    async fn person_client(
        &mut self,
        identification: &str,
    ) -> PersistenceResult<Option<PersonClient>> {
        self.inner.person_client(identification).await
    }
    async fn person_clients(&mut self) -> PersistenceResult<Vec<PersonClient>> {
        self.inner.person_clients().await
    }
    async fn insert_company_client(&mut self, client: &CompanyClient) -> PersistenceResult<i64> {
        self.inner.insert_company_client(client).await
    }
    async fn company_client(&mut self, nit: &str) -> PersistenceResult<Option<CompanyClient>> {
        self.inner.company_client(nit).await
    }
    async fn company_clients(&mut self) -> PersistenceResult<Vec<CompanyClient>> {
        self.inner.company_clients().await
    }

    async fn account(&mut self, number: &str) -> PersistenceResult<Option<Account>> {
        self.inner.account(number).await
    }
    async fn insert_account(&mut self, account: &Account) -> PersistenceResult<()> {
        self.inner.insert_account(account).await
    }
    async fn update_account_balance(
        &mut self,
        number: &str,
        balance: Decimal,
    ) -> PersistenceResult<()> {
        self.inner.update_account_balance(number, balance).await
    }
    async fn update_account_status(
        &mut self,
        number: &str,
        status: AccountStatus,
    ) -> PersistenceResult<()> {
        self.inner.update_account_status(number, status).await
    }
    async fn accounts_by_owner(&mut self, owner_id: &str) -> PersistenceResult<Vec<Account>> {
        self.inner.accounts_by_owner(owner_id).await
    }
    async fn accounts(&mut self) -> PersistenceResult<Vec<Account>> {
        self.inner.accounts().await
    }

    async fn loan(&mut self, id: i64) -> PersistenceResult<Option<Loan>> {
        self.inner.loan(id).await
    }
    async fn insert_loan(&mut self, loan: &Loan) -> PersistenceResult<i64> {
        self.inner.insert_loan(loan).await
    }
    async fn update_loan(&mut self, loan: &Loan) -> PersistenceResult<()> {
        self.inner.update_loan(loan).await
    }
    async fn loans_by_applicant(&mut self, applicant_id: &str) -> PersistenceResult<Vec<Loan>> {
        self.inner.loans_by_applicant(applicant_id).await
    }
    async fn loans_by_status(&mut self, status: LoanStatus) -> PersistenceResult<Vec<Loan>> {
        self.inner.loans_by_status(status).await
    }
    async fn loans(&mut self) -> PersistenceResult<Vec<Loan>> {
        self.inner.loans().await
    }

    async fn transfer(&mut self, id: i64) -> PersistenceResult<Option<Transfer>> {
        self.inner.transfer(id).await
    }
    async fn insert_transfer(&mut self, transfer: &Transfer) -> PersistenceResult<i64> {
        self.inner.insert_transfer(transfer).await
    }
    async fn update_transfer(
        &mut self,
        transfer: &Transfer,
        expected: TransferStatus,
    ) -> PersistenceResult<bool> {
        self.inner.update_transfer(transfer, expected).await
    }
    async fn transfers_by_status(
        &mut self,
        status: TransferStatus,
    ) -> PersistenceResult<Vec<Transfer>> {
        self.inner.transfers_by_status(status).await
    }
    async fn transfers_by_account(&mut self, number: &str) -> PersistenceResult<Vec<Transfer>> {
        self.inner.transfers_by_account(number).await
    }
    async fn transfers_by_creator(&mut self, creator_id: i64) -> PersistenceResult<Vec<Transfer>> {
        self.inner.transfers_by_creator(creator_id).await
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> PersistenceResult<i64> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(PersistenceError::Configuration(
                "audit log unavailable".to_string(),
            ));
        }
        self.inner.append_audit(entry).await
    }
    async fn audit_entries(
        &mut self,
        product_id: Option<&str>,
    ) -> PersistenceResult<Vec<AuditEntry>> {
        self.inner.audit_entries(product_id).await
    }

    async fn commit(&mut self) -> PersistenceResult<()> {
        self.inner.commit().await
    }
}

struct Fixture {
    ctx: ServiceContext,
    store: Arc<FaultyStore>,
    clock: Arc<ManualClock>,
    teller: Actor,
    analyst: Actor,
    supervisor: Actor,
    employee: Actor,
}

async fn register(ctx: &ServiceContext, identification: &str, role: UserRole) -> BankUser {
    UserService::new(ctx)
        .register(
            Actor::System,
            UserRegistration {
                full_name: format!("User {}", identification),
                identification: identification.to_string(),
                email: format!("{}@banco.co", identification),
                phone: "3001234567".to_string(),
                birth_date: None,
                address: "Carrera 7 # 12-40".to_string(),
                role,
                password: "password1".to_string(),
                company_id: None,
            },
        )
        .await
        .unwrap()
}

fn actor(user: &BankUser) -> Actor {
    Actor::User {
        id: user.id,
        role: user.role,
    }
}

async fn fixture() -> Fixture {
    let store = Arc::new(FaultyStore::default());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap(),
    ));
    let ctx = ServiceContext::new(store.clone()).with_clock(clock.clone());

    let teller = actor(&register(&ctx, "T-100", UserRole::TellerEmployee).await);
    let analyst = actor(&register(&ctx, "A-200", UserRole::InternalAnalyst).await);
    let supervisor = actor(&register(&ctx, "S-300", UserRole::CompanySupervisor).await);
    let employee = actor(&register(&ctx, "E-400", UserRole::CompanyEmployee).await);
    register(&ctx, "NIT-9001", UserRole::ClientCompany).await;

    Fixture {
        ctx,
        store,
        clock,
        teller,
        analyst,
        supervisor,
        employee,
    }
}

impl Fixture {
    async fn account(&self, balance: Decimal) -> String {
        let accounts = AccountService::new(&self.ctx);
        let account = accounts
            .open(self.teller, "NIT-9001", AccountType::Corporate, Currency::Cop)
            .await
            .unwrap();
        if balance > Decimal::ZERO {
            accounts
                .adjust_balance(self.teller, &account.number, balance)
                .await
                .unwrap();
        }
        self.clock.advance(Duration::milliseconds(1));
        account.number
    }

    async fn balance(&self, number: &str) -> Decimal {
        AccountService::new(&self.ctx).get(number).await.unwrap().balance
    }

    fn break_audit(&self) {
        self.store.fail_audit.store(true, Ordering::SeqCst);
    }

    fn request(&self, source: &str, destination: &str, amount: Decimal) -> TransferRequest {
        TransferRequest {
            source_account: source.to_string(),
            destination_account: destination.to_string(),
            amount,
            is_corporate: true,
            memo: None,
        }
    }
}

#[tokio::test]
async fn test_failed_audit_aborts_direct_transfer() {
    let f = fixture().await;
    let b = f.account(dec!(10000000)).await;
    let c = f.account(dec!(500)).await;

    f.break_audit();
    let err = TransferService::new(&f.ctx)
        .create(f.employee, f.request(&b, &c, dec!(3000000)))
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::Store(_)));
    assert_eq!(err.kind(), ErrorKind::Internal);

    assert_eq!(f.balance(&b).await, dec!(10000000));
    assert_eq!(f.balance(&c).await, dec!(500));
    assert!(TransferService::new(&f.ctx)
        .by_account(&b)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_failed_audit_aborts_approval() {
    let f = fixture().await;
    let b = f.account(dec!(10000000)).await;
    let c = f.account(dec!(0)).await;
    let transfers = TransferService::new(&f.ctx);

    let held = transfers
        .create(f.employee, f.request(&b, &c, dec!(6000000)))
        .await
        .unwrap();
    assert_eq!(held.status, TransferStatus::PendingApproval);

    f.break_audit();
    let err = transfers.approve(f.supervisor, held.id).await.unwrap_err();
    assert!(matches!(err, BankError::Store(_)));

    assert_eq!(f.balance(&b).await, dec!(10000000));
    assert_eq!(f.balance(&c).await, dec!(0));
    let stored = transfers.get(held.id).await.unwrap();
    assert_eq!(stored.status, TransferStatus::PendingApproval);
    assert_eq!(stored.approver_id, None);
}

#[tokio::test]
async fn test_failed_audit_keeps_stale_transfer_pending() {
    let f = fixture().await;
    let b = f.account(dec!(10000000)).await;
    let c = f.account(dec!(0)).await;
    let transfers = TransferService::new(&f.ctx);

    let held = transfers
        .create(f.employee, f.request(&b, &c, dec!(6000000)))
        .await
        .unwrap();
    f.clock.advance(Duration::minutes(61));

    f.break_audit();
    let err = transfers.approve(f.supervisor, held.id).await.unwrap_err();
    assert!(matches!(err, BankError::Store(_)));
    let err = transfers.sweep_expired().await.unwrap_err();
    assert!(matches!(err, BankError::Store(_)));

    let stored = transfers.get(held.id).await.unwrap();
    assert_eq!(stored.status, TransferStatus::PendingApproval);
}

#[tokio::test]
async fn test_failed_audit_aborts_disbursement() {
    let f = fixture().await;
    let a = f.account(dec!(0)).await;
    let loans = LoanService::new(&f.ctx);

    let loan = loans
        .apply(
            f.teller,
            LoanApplication {
                applicant_id: "NIT-9001".to_string(),
                loan_type: LoanType::Corporate,
                requested_amount: dec!(1000000),
                term_months: 24,
                disbursement_account: None,
            },
        )
        .await
        .unwrap();
    loans
        .approve(f.analyst, loan.id, dec!(1000000), dec!(11.25))
        .await
        .unwrap();

    f.break_audit();
    let err = loans.disburse(f.analyst, loan.id, &a).await.unwrap_err();
    assert!(matches!(err, BankError::Store(_)));

    assert_eq!(f.balance(&a).await, dec!(0));
    let stored = loans.get(loan.id).await.unwrap();
    assert_eq!(stored.status, LoanStatus::Approved);
    assert_eq!(stored.disbursement_account, None);
}

#[tokio::test]
async fn test_open_account_sees_owner_deactivated_before_insert() {
    let f = fixture().await;
    let owner = UserService::new(&f.ctx)
        .by_identification("NIT-9001")
        .await
        .unwrap();

    f.store.deactivate_before_lock.store(owner.id, Ordering::SeqCst);
    let err = AccountService::new(&f.ctx)
        .open(f.teller, "NIT-9001", AccountType::Savings, Currency::Cop)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(AccountService::new(&f.ctx)
        .by_owner("NIT-9001")
        .await
        .unwrap()
        .is_empty());
}
