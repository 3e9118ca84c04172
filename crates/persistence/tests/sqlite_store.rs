//! Integration tests cho SqliteStore

use banco_core::{
    Account, AccountType, Actor, AuditDetail, AuditEntry, Currency, Loan, LoanStatus, LoanType,
    OperationType, Transfer, TransferStatus, UserRole,
};
use banco_persistence::{LedgerStore, LockKey, PersistenceError, SqliteStore, StoreConfig};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;

async fn memory_store() -> SqliteStore {
    SqliteStore::open(&StoreConfig::in_memory()).await.unwrap()
}

fn account(number: &str, owner: &str) -> Account {
    Account::open(
        number.to_string(),
        AccountType::Corporate,
        owner,
        Currency::Cop,
        Some(1),
        Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_account_roundtrip_and_rollback() {
    let store = memory_store().await;

    let mut uow = store.begin(vec![]).await.unwrap();
    uow.insert_account(&account("1000000001", "NIT-900")).await.unwrap();
    uow.update_account_balance("1000000001", dec!(10000000.00))
        .await
        .unwrap();
    uow.commit().await.unwrap();
    drop(uow);

    // Uncommitted change is discarded
    {
        let mut uow = store
            .begin(vec![LockKey::Account("1000000001".to_string())])
            .await
            .unwrap();
        uow.update_account_balance("1000000001", dec!(1)).await.unwrap();
    }

    let mut uow = store.begin(vec![]).await.unwrap();
    let stored = uow.account("1000000001").await.unwrap().unwrap();
    assert_eq!(stored.balance, dec!(10000000.00));
    assert_eq!(stored.account_type, AccountType::Corporate);

    let owned = uow.accounts_by_owner("NIT-900").await.unwrap();
    assert_eq!(owned.len(), 1);
}

#[tokio::test]
async fn test_duplicate_account_number() {
    let store = memory_store().await;
    let mut uow = store.begin(vec![]).await.unwrap();
    uow.insert_account(&account("1000000001", "A")).await.unwrap();
    let err = uow
        .insert_account(&account("1000000001", "B"))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_transfer_compare_and_set() {
    let store = memory_store().await;
    let now = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();

    let mut uow = store.begin(vec![]).await.unwrap();
    let transfer = Transfer::new(
        "1000000001",
        "1000000002",
        dec!(6000000),
        TransferStatus::PendingApproval,
        3,
        Some("payroll".to_string()),
        now,
    )
    .unwrap();
    let id = uow.insert_transfer(&transfer).await.unwrap();
    uow.commit().await.unwrap();
    drop(uow);

    let mut uow = store.begin(vec![LockKey::Transfer(id)]).await.unwrap();
    let mut stored = uow.transfer(id).await.unwrap().unwrap();
    assert_eq!(stored.memo.as_deref(), Some("payroll"));
    stored.execute(5, now).unwrap();

    assert!(uow
        .update_transfer(&stored, TransferStatus::PendingApproval)
        .await
        .unwrap());
    assert!(!uow
        .update_transfer(&stored, TransferStatus::PendingApproval)
        .await
        .unwrap());
    uow.commit().await.unwrap();
    drop(uow);

    let mut uow = store.begin(vec![]).await.unwrap();
    let pending = uow
        .transfers_by_status(TransferStatus::PendingApproval)
        .await
        .unwrap();
    assert!(pending.is_empty());
    let history = uow.transfers_by_account("1000000002").await.unwrap();
    assert_eq!(history[0].approver_id, Some(5));
}

#[tokio::test]
async fn test_loan_update_roundtrip() {
    let store = memory_store().await;
    let now = Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap();

    let mut uow = store.begin(vec![]).await.unwrap();
    let loan = Loan::application(LoanType::Mortgage, "CC-77", dec!(90000000), 240, None, 2, now)
        .unwrap();
    let id = uow.insert_loan(&loan).await.unwrap();

    let mut loan = uow.loan(id).await.unwrap().unwrap();
    loan.approve(dec!(85000000), dec!(11.25), 9, now).unwrap();
    uow.update_loan(&loan).await.unwrap();
    uow.commit().await.unwrap();
    drop(uow);

    let mut uow = store.begin(vec![]).await.unwrap();
    let stored = uow.loan(id).await.unwrap().unwrap();
    assert_eq!(stored.status, LoanStatus::Approved);
    assert_eq!(stored.interest_rate, Some(dec!(11.25)));
    assert_eq!(stored.term_months, 240);
    assert!(uow
        .loans_by_status(LoanStatus::Underwriting)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_audit_log_is_append_only() {
    let store = memory_store().await;
    let now = Utc.with_ymd_and_hms(2026, 4, 3, 9, 0, 0).unwrap();

    let mut uow = store.begin(vec![]).await.unwrap();
    let entry = AuditEntry::new(
        OperationType::TransferExpired,
        Actor::System,
        Some("transfer:12".to_string()),
        AuditDetail::new().with("previous_status", "pending_approval"),
        now,
    );
    uow.append_audit(&entry).await.unwrap();
    uow.append_audit(&AuditEntry::new(
        OperationType::AccountOpened,
        Actor::User {
            id: 1,
            role: UserRole::TellerEmployee,
        },
        Some("account:1000000001".to_string()),
        AuditDetail::new().decimal("balance", dec!(0)),
        now,
    ))
    .await
    .unwrap();
    uow.commit().await.unwrap();
    drop(uow);

    let mut uow = store.begin(vec![]).await.unwrap();
    let for_transfer = uow.audit_entries(Some("transfer:12")).await.unwrap();
    assert_eq!(for_transfer.len(), 1);
    assert_eq!(for_transfer[0].actor, Actor::System);
    assert_eq!(uow.audit_entries(None).await.unwrap().len(), 2);
    uow.commit().await.unwrap();

    let tampered = sqlx::query("DELETE FROM audit_log").execute(store.pool()).await;
    assert!(tampered.is_err());
}

#[tokio::test]
async fn test_file_database_persists() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("banco.db").display());

    let store = SqliteStore::open(&StoreConfig::new(&url)).await.unwrap();
    let mut uow = store.begin(vec![]).await.unwrap();
    uow.insert_account(&account("2000000001", "CC-5")).await.unwrap();
    uow.commit().await.unwrap();
    drop(uow);
    store.close().await;

    let reopened = SqliteStore::open(&StoreConfig::new(&url)).await.unwrap();
    let mut uow = reopened.begin(vec![]).await.unwrap();
    assert!(uow.account("2000000001").await.unwrap().is_some());
}
