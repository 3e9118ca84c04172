//! Database schema definitions
//!
//! DDL của ledger và các row type cho sqlx mapping. Decimal được lưu dạng
//! TEXT để giữ nguyên precision.

use crate::error::{PersistenceError, PersistenceResult};
use banco_core::{
    Account, AccountStatus, AccountType, Actor, AuditDetail, AuditEntry, BankUser, CompanyClient,
    Currency, Loan, LoanStatus, LoanType, OperationType, PersonClient, Transfer, TransferStatus,
    UserRole, UserStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use std::str::FromStr;

const SCHEMA: &str = r#"
    -- Bank users (staff and clients that can log in)
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        full_name TEXT NOT NULL,
        identification TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        birth_date TEXT,
        address TEXT NOT NULL,
        role TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        password_hash TEXT NOT NULL,
        company_id INTEGER,
        created_at TEXT NOT NULL
    );

    -- Client registry
    CREATE TABLE IF NOT EXISTS person_clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        registered_by INTEGER NOT NULL,
        full_name TEXT NOT NULL,
        identification TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        birth_date TEXT NOT NULL,
        address TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS company_clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        registered_by INTEGER NOT NULL,
        legal_name TEXT NOT NULL,
        nit TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        legal_representative_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    -- Accounts (owner_id is a weak reference to an identification)
    CREATE TABLE IF NOT EXISTS accounts (
        number TEXT PRIMARY KEY,
        account_type TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        balance TEXT NOT NULL DEFAULT '0',
        currency TEXT NOT NULL DEFAULT 'COP',
        status TEXT NOT NULL DEFAULT 'active',
        opened_at TEXT NOT NULL,
        opened_by INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts(owner_id);

    -- Loans
    CREATE TABLE IF NOT EXISTS loans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        loan_type TEXT NOT NULL,
        applicant_id TEXT NOT NULL,
        requested_amount TEXT NOT NULL,
        approved_amount TEXT,
        interest_rate TEXT,
        term_months INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'underwriting',
        approval_date TEXT,
        disbursement_date TEXT,
        disbursement_account TEXT,
        created_by INTEGER NOT NULL,
        decided_by INTEGER,
        rejection_reason TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_loans_applicant ON loans(applicant_id);
    CREATE INDEX IF NOT EXISTS idx_loans_status ON loans(status);

    -- Transfers
    CREATE TABLE IF NOT EXISTS transfers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_account TEXT NOT NULL,
        destination_account TEXT NOT NULL,
        amount TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        approved_at TEXT,
        creator_id INTEGER NOT NULL,
        approver_id INTEGER,
        memo TEXT,
        rejection_reason TEXT,
        CHECK (source_account <> destination_account)
    );
    CREATE INDEX IF NOT EXISTS idx_transfers_status ON transfers(status);
    CREATE INDEX IF NOT EXISTS idx_transfers_source ON transfers(source_account);
    CREATE INDEX IF NOT EXISTS idx_transfers_destination ON transfers(destination_account);

    -- Audit log (append-only)
    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        operation_type TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        actor_user_id INTEGER,
        actor_role TEXT NOT NULL,
        affected_product_id TEXT,
        detail TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_audit_product ON audit_log(affected_product_id);

    CREATE TRIGGER IF NOT EXISTS audit_log_no_update
    BEFORE UPDATE ON audit_log
    BEGIN
        SELECT RAISE(ABORT, 'audit_log is append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
    BEFORE DELETE ON audit_log
    BEGIN
        SELECT RAISE(ABORT, 'audit_log is append-only');
    END;
"#;

/// Tạo toàn bộ bảng (idempotent)
pub async fn create_schema(conn: &mut SqliteConnection) -> PersistenceResult<()> {
    sqlx::query(SCHEMA).execute(conn).await?;
    Ok(())
}

// === Row types ===

/// Row type cho bảng `users`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub full_name: String,
    pub identification: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub address: String,
    pub role: String,
    pub status: String,
    pub password_hash: String,
    pub company_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `person_clients`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersonClientRow {
    pub id: i64,
    pub registered_by: i64,
    pub full_name: String,
    pub identification: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `company_clients`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompanyClientRow {
    pub id: i64,
    pub registered_by: i64,
    pub legal_name: String,
    pub nit: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub legal_representative_id: String,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `accounts`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub number: String,
    pub account_type: String,
    pub owner_id: String,
    pub balance: String, // Decimal stored as TEXT
    pub currency: String,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub opened_by: Option<i64>,
}

/// Row type cho bảng `loans`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoanRow {
    pub id: i64,
    pub loan_type: String,
    pub applicant_id: String,
    pub requested_amount: String,
    pub approved_amount: Option<String>,
    pub interest_rate: Option<String>,
    pub term_months: i64,
    pub status: String,
    pub approval_date: Option<DateTime<Utc>>,
    pub disbursement_date: Option<DateTime<Utc>>,
    pub disbursement_account: Option<String>,
    pub created_by: i64,
    pub decided_by: Option<i64>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `transfers`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransferRow {
    pub id: i64,
    pub source_account: String,
    pub destination_account: String,
    pub amount: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub creator_id: i64,
    pub approver_id: Option<i64>,
    pub memo: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Row type cho bảng `audit_log`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
    pub id: i64,
    pub operation_type: String,
    pub timestamp: DateTime<Utc>,
    pub actor_user_id: Option<i64>,
    pub actor_role: String,
    pub affected_product_id: Option<String>,
    pub detail: String,
}

// === Conversion implementations ===

fn decimal(field: &str, raw: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|_| PersistenceError::InvalidDecimal(format!("{} = {}", field, raw)))
}

fn optional_decimal(field: &str, raw: Option<&str>) -> PersistenceResult<Option<Decimal>> {
    raw.map(|raw| decimal(field, raw)).transpose()
}

fn enum_value<T>(field: &str, raw: &str, parse: fn(&str) -> Option<T>) -> PersistenceResult<T> {
    parse(raw).ok_or_else(|| PersistenceError::invalid_enum(field, raw))
}

impl TryFrom<UserRow> for BankUser {
    type Error = PersistenceError;

    fn try_from(row: UserRow) -> PersistenceResult<Self> {
        Ok(Self {
            id: row.id,
            full_name: row.full_name,
            identification: row.identification,
            email: row.email,
            phone: row.phone,
            birth_date: row.birth_date,
            address: row.address,
            role: enum_value("users.role", &row.role, UserRole::from_str)?,
            status: enum_value("users.status", &row.status, UserStatus::from_str)?,
            password_hash: row.password_hash,
            company_id: row.company_id,
            created_at: row.created_at,
        })
    }
}

impl From<PersonClientRow> for PersonClient {
    fn from(row: PersonClientRow) -> Self {
        Self {
            id: row.id,
            registered_by: row.registered_by,
            full_name: row.full_name,
            identification: row.identification,
            email: row.email,
            phone: row.phone,
            birth_date: row.birth_date,
            address: row.address,
            created_at: row.created_at,
        }
    }
}

impl From<CompanyClientRow> for CompanyClient {
    fn from(row: CompanyClientRow) -> Self {
        Self {
            id: row.id,
            registered_by: row.registered_by,
            legal_name: row.legal_name,
            nit: row.nit,
            email: row.email,
            phone: row.phone,
            address: row.address,
            legal_representative_id: row.legal_representative_id,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = PersistenceError;

    fn try_from(row: AccountRow) -> PersistenceResult<Self> {
        Ok(Self {
            account_type: enum_value(
                "accounts.account_type",
                &row.account_type,
                AccountType::from_str,
            )?,
            balance: decimal("accounts.balance", &row.balance)?,
            currency: enum_value("accounts.currency", &row.currency, Currency::from_str)?,
            status: enum_value("accounts.status", &row.status, AccountStatus::from_str)?,
            number: row.number,
            owner_id: row.owner_id,
            opened_at: row.opened_at,
            opened_by: row.opened_by,
        })
    }
}

impl TryFrom<LoanRow> for Loan {
    type Error = PersistenceError;

    fn try_from(row: LoanRow) -> PersistenceResult<Self> {
        let term_months = u32::try_from(row.term_months)
            .map_err(|_| {
                PersistenceError::invalid_enum("loans.term_months", &row.term_months.to_string())
            })?;

        Ok(Self {
            id: row.id,
            loan_type: enum_value("loans.loan_type", &row.loan_type, LoanType::from_str)?,
            requested_amount: decimal("loans.requested_amount", &row.requested_amount)?,
            approved_amount: optional_decimal(
                "loans.approved_amount",
                row.approved_amount.as_deref(),
            )?,
            interest_rate: optional_decimal("loans.interest_rate", row.interest_rate.as_deref())?,
            term_months,
            status: enum_value("loans.status", &row.status, LoanStatus::from_str)?,
            applicant_id: row.applicant_id,
            approval_date: row.approval_date,
            disbursement_date: row.disbursement_date,
            disbursement_account: row.disbursement_account,
            created_by: row.created_by,
            decided_by: row.decided_by,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<TransferRow> for Transfer {
    type Error = PersistenceError;

    fn try_from(row: TransferRow) -> PersistenceResult<Self> {
        Ok(Self {
            id: row.id,
            amount: decimal("transfers.amount", &row.amount)?,
            status: enum_value("transfers.status", &row.status, TransferStatus::from_str)?,
            source_account: row.source_account,
            destination_account: row.destination_account,
            created_at: row.created_at,
            approved_at: row.approved_at,
            creator_id: row.creator_id,
            approver_id: row.approver_id,
            memo: row.memo,
            rejection_reason: row.rejection_reason,
        })
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = PersistenceError;

    fn try_from(row: AuditRow) -> PersistenceResult<Self> {
        let actor = Actor::from_parts(row.actor_user_id, &row.actor_role)
            .ok_or_else(|| {
                PersistenceError::invalid_enum("audit_log.actor_role", &row.actor_role)
            })?;

        Ok(Self {
            id: row.id,
            operation_type: enum_value(
                "audit_log.operation_type",
                &row.operation_type,
                OperationType::from_str,
            )?,
            timestamp: row.timestamp,
            actor,
            affected_product_id: row.affected_product_id,
            detail: AuditDetail::from_json(&row.detail)?,
        })
    }
}
