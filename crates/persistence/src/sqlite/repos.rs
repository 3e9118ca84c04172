//! Repository implementations cho SQLite
//!
//! Các truy vấn cho từng bảng, chạy trên connection của transaction hiện tại.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use banco_core::{
    Account, AccountStatus, AuditEntry, BankUser, CompanyClient, Loan, LoanStatus, PersonClient,
    Transfer, TransferStatus, UserStatus,
};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

fn convert_all<R, T>(rows: Vec<R>) -> PersistenceResult<Vec<T>>
where
    T: TryFrom<R, Error = PersistenceError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// User Repository
// ============================================================================

/// Repository cho users table
pub struct UserRepo;

impl UserRepo {
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<Option<BankUser>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .map(BankUser::try_from)
            .transpose()
    }

    pub async fn get_by_identification(
        conn: &mut SqliteConnection,
        identification: &str,
    ) -> PersistenceResult<Option<BankUser>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE identification = ?")
            .bind(identification)
            .fetch_optional(conn)
            .await?
            .map(BankUser::try_from)
            .transpose()
    }

    pub async fn insert(conn: &mut SqliteConnection, user: &BankUser) -> PersistenceResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (full_name, identification, email, phone, birth_date, address,
                               role, status, password_hash, company_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.full_name)
        .bind(&user.identification)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.birth_date)
        .bind(&user.address)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(&user.password_hash)
        .bind(user.company_id)
        .bind(user.created_at)
        .execute(conn)
        .await
        .map_err(|e| PersistenceError::from_insert(e, "User", &user.identification))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update_status(
        conn: &mut SqliteConnection,
        id: i64,
        status: UserStatus,
    ) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn get_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<BankUser>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY id")
            .fetch_all(conn)
            .await?;
        convert_all(rows)
    }
}

// ============================================================================
// Client Repository
// ============================================================================

/// Repository cho person_clients và company_clients
pub struct ClientRepo;

impl ClientRepo {
    pub async fn insert_person(
        conn: &mut SqliteConnection,
        client: &PersonClient,
    ) -> PersistenceResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO person_clients (registered_by, full_name, identification, email, phone,
                                        birth_date, address, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(client.registered_by)
        .bind(&client.full_name)
        .bind(&client.identification)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(client.birth_date)
        .bind(&client.address)
        .bind(client.created_at)
        .execute(conn)
        .await
        .map_err(|e| PersistenceError::from_insert(e, "PersonClient", &client.identification))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_person(
        conn: &mut SqliteConnection,
        identification: &str,
    ) -> PersistenceResult<Option<PersonClient>> {
        let row = sqlx::query_as::<_, PersonClientRow>(
            "SELECT * FROM person_clients WHERE identification = ?",
        )
        .bind(identification)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(PersonClient::from))
    }

    pub async fn get_all_persons(
        conn: &mut SqliteConnection,
    ) -> PersistenceResult<Vec<PersonClient>> {
        let rows = sqlx::query_as::<_, PersonClientRow>("SELECT * FROM person_clients ORDER BY id")
            .fetch_all(conn)
            .await?;
        Ok(rows.into_iter().map(PersonClient::from).collect())
    }

    pub async fn insert_company(
        conn: &mut SqliteConnection,
        client: &CompanyClient,
    ) -> PersistenceResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO company_clients (registered_by, legal_name, nit, email, phone, address,
                                         legal_representative_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(client.registered_by)
        .bind(&client.legal_name)
        .bind(&client.nit)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.legal_representative_id)
        .bind(client.created_at)
        .execute(conn)
        .await
        .map_err(|e| PersistenceError::from_insert(e, "CompanyClient", &client.nit))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_company(
        conn: &mut SqliteConnection,
        nit: &str,
    ) -> PersistenceResult<Option<CompanyClient>> {
        let row = sqlx::query_as::<_, CompanyClientRow>(
            "SELECT * FROM company_clients WHERE nit = ?",
        )
        .bind(nit)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(CompanyClient::from))
    }

    pub async fn get_all_companies(
        conn: &mut SqliteConnection,
    ) -> PersistenceResult<Vec<CompanyClient>> {
        let rows =
            sqlx::query_as::<_, CompanyClientRow>("SELECT * FROM company_clients ORDER BY id")
                .fetch_all(conn)
                .await?;
        Ok(rows.into_iter().map(CompanyClient::from).collect())
    }
}

// ============================================================================
// Account Repository
// ============================================================================

/// Repository cho accounts table
pub struct AccountRepo;

impl AccountRepo {
    /// Lấy account theo số tài khoản
    pub async fn get(
        conn: &mut SqliteConnection,
        number: &str,
    ) -> PersistenceResult<Option<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE number = ?")
            .bind(number)
            .fetch_optional(conn)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    /// Thêm account mới
    pub async fn insert(conn: &mut SqliteConnection, account: &Account) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (number, account_type, owner_id, balance, currency, status,
                                  opened_at, opened_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.number)
        .bind(account.account_type.as_str())
        .bind(&account.owner_id)
        .bind(account.balance.to_string())
        .bind(account.currency.as_str())
        .bind(account.status.as_str())
        .bind(account.opened_at)
        .bind(account.opened_by)
        .execute(conn)
        .await
        .map_err(|e| PersistenceError::from_insert(e, "Account", &account.number))?;
        Ok(())
    }

    /// Ghi số dư mới
    pub async fn update_balance(
        conn: &mut SqliteConnection,
        number: &str,
        balance: Decimal,
    ) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE accounts SET balance = ? WHERE number = ?")
            .bind(balance.to_string())
            .bind(number)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Account", number));
        }
        Ok(())
    }

    /// Cập nhật status
    pub async fn update_status(
        conn: &mut SqliteConnection,
        number: &str,
        status: AccountStatus,
    ) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE accounts SET status = ? WHERE number = ?")
            .bind(status.as_str())
            .bind(number)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Account", number));
        }
        Ok(())
    }

    pub async fn get_by_owner(
        conn: &mut SqliteConnection,
        owner_id: &str,
    ) -> PersistenceResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE owner_id = ? ORDER BY opened_at, number",
        )
        .bind(owner_id)
        .fetch_all(conn)
        .await?;
        convert_all(rows)
    }

    /// Lấy tất cả accounts
    pub async fn get_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts ORDER BY opened_at, number",
        )
        .fetch_all(conn)
        .await?;
        convert_all(rows)
    }
}

// ============================================================================
// Loan Repository
// ============================================================================

/// Repository cho loans table
pub struct LoanRepo;

impl LoanRepo {
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<Option<Loan>> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .map(Loan::try_from)
            .transpose()
    }

    pub async fn insert(conn: &mut SqliteConnection, loan: &Loan) -> PersistenceResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO loans (loan_type, applicant_id, requested_amount, approved_amount,
                               interest_rate, term_months, status, approval_date,
                               disbursement_date, disbursement_account, created_by, decided_by,
                               rejection_reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(loan.loan_type.as_str())
        .bind(&loan.applicant_id)
        .bind(loan.requested_amount.to_string())
        .bind(loan.approved_amount.map(|a| a.to_string()))
        .bind(loan.interest_rate.map(|r| r.to_string()))
        .bind(i64::from(loan.term_months))
        .bind(loan.status.as_str())
        .bind(loan.approval_date)
        .bind(loan.disbursement_date)
        .bind(&loan.disbursement_account)
        .bind(loan.created_by)
        .bind(loan.decided_by)
        .bind(&loan.rejection_reason)
        .bind(loan.created_at)
        .execute(conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Ghi lại toàn bộ các trường có thể thay đổi
    pub async fn update(conn: &mut SqliteConnection, loan: &Loan) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET approved_amount = ?, interest_rate = ?, status = ?, approval_date = ?,
                disbursement_date = ?, disbursement_account = ?, decided_by = ?,
                rejection_reason = ?
            WHERE id = ?
            "#,
        )
        .bind(loan.approved_amount.map(|a| a.to_string()))
        .bind(loan.interest_rate.map(|r| r.to_string()))
        .bind(loan.status.as_str())
        .bind(loan.approval_date)
        .bind(loan.disbursement_date)
        .bind(&loan.disbursement_account)
        .bind(loan.decided_by)
        .bind(&loan.rejection_reason)
        .bind(loan.id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Loan", loan.id));
        }
        Ok(())
    }

    pub async fn get_by_applicant(
        conn: &mut SqliteConnection,
        applicant_id: &str,
    ) -> PersistenceResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE applicant_id = ? ORDER BY id DESC",
        )
        .bind(applicant_id)
        .fetch_all(conn)
        .await?;
        convert_all(rows)
    }

    pub async fn get_by_status(
        conn: &mut SqliteConnection,
        status: LoanStatus,
    ) -> PersistenceResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE status = ? ORDER BY id")
            .bind(status.as_str())
            .fetch_all(conn)
            .await?;
        convert_all(rows)
    }

    pub async fn get_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>("SELECT * FROM loans ORDER BY id DESC")
            .fetch_all(conn)
            .await?;
        convert_all(rows)
    }
}

// ============================================================================
// Transfer Repository
// ============================================================================

/// Repository cho transfers table
pub struct TransferRepo;

impl TransferRepo {
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<Option<Transfer>> {
        sqlx::query_as::<_, TransferRow>("SELECT * FROM transfers WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .map(Transfer::try_from)
            .transpose()
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        transfer: &Transfer,
    ) -> PersistenceResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO transfers (source_account, destination_account, amount, status,
                                   created_at, approved_at, creator_id, approver_id, memo,
                                   rejection_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transfer.source_account)
        .bind(&transfer.destination_account)
        .bind(transfer.amount.to_string())
        .bind(transfer.status.as_str())
        .bind(transfer.created_at)
        .bind(transfer.approved_at)
        .bind(transfer.creator_id)
        .bind(transfer.approver_id)
        .bind(&transfer.memo)
        .bind(&transfer.rejection_reason)
        .execute(conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Compare-and-set trên cột status
    pub async fn update_if_status(
        conn: &mut SqliteConnection,
        transfer: &Transfer,
        expected: TransferStatus,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transfers
            SET status = ?, approved_at = ?, approver_id = ?, rejection_reason = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(transfer.status.as_str())
        .bind(transfer.approved_at)
        .bind(transfer.approver_id)
        .bind(&transfer.rejection_reason)
        .bind(transfer.id)
        .bind(expected.as_str())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_by_status(
        conn: &mut SqliteConnection,
        status: TransferStatus,
    ) -> PersistenceResult<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            "SELECT * FROM transfers WHERE status = ? ORDER BY id",
        )
        .bind(status.as_str())
        .fetch_all(conn)
        .await?;
        convert_all(rows)
    }

    pub async fn get_by_account(
        conn: &mut SqliteConnection,
        number: &str,
    ) -> PersistenceResult<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT * FROM transfers
            WHERE source_account = ? OR destination_account = ?
            ORDER BY id DESC
            "#,
        )
        .bind(number)
        .bind(number)
        .fetch_all(conn)
        .await?;
        convert_all(rows)
    }

    pub async fn get_by_creator(
        conn: &mut SqliteConnection,
        creator_id: i64,
    ) -> PersistenceResult<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            "SELECT * FROM transfers WHERE creator_id = ? ORDER BY id DESC",
        )
        .bind(creator_id)
        .fetch_all(conn)
        .await?;
        convert_all(rows)
    }
}

// ============================================================================
// Audit Repository
// ============================================================================

/// Repository cho audit_log table (chỉ INSERT và SELECT)
pub struct AuditRepo;

impl AuditRepo {
    pub async fn insert(conn: &mut SqliteConnection, entry: &AuditEntry) -> PersistenceResult<i64> {
        let detail = entry.detail.to_json()?;
        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (operation_type, timestamp, actor_user_id, actor_role,
                                   affected_product_id, detail)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.operation_type.as_str())
        .bind(entry.timestamp)
        .bind(entry.actor.user_id())
        .bind(entry.actor.role_str())
        .bind(&entry.affected_product_id)
        .bind(detail)
        .execute(conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>("SELECT * FROM audit_log ORDER BY id")
            .fetch_all(conn)
            .await?;
        convert_all(rows)
    }

    pub async fn get_by_product(
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> PersistenceResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT * FROM audit_log WHERE affected_product_id = ? ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(conn)
        .await?;
        convert_all(rows)
    }
}
