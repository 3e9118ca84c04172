//! Loan workflow engine
//!
//! underwriting → approved → disbursed, or underwriting → rejected.
//! Disbursement is the only step that moves money.

use crate::accounts::AccountService;
use crate::audit::AuditWriter;
use crate::error::{BankError, BankResult};
use crate::services::{require_user, ServiceContext};
use banco_core::{
    validate_rate, validate_scale, Actor, AuditDetail, Loan, LoanStatus, LoanType, OperationType,
    ProductRef,
};
use banco_persistence::{LockKey, UnitOfWork};
use rust_decimal::Decimal;
use tracing::info;

/// Input for a new loan application
#[derive(Debug, Clone)]
pub struct LoanApplication {
    pub applicant_id: String,
    pub loan_type: LoanType,
    pub requested_amount: Decimal,
    pub term_months: u32,
    pub disbursement_account: Option<String>,
}

/// Loan Workflow Engine - apply, approve, reject, disburse
pub struct LoanService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LoanService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// File an application in `underwriting`
    pub async fn apply(&self, actor: Actor, application: LoanApplication) -> BankResult<Loan> {
        let created_by = require_user(&actor)?;
        let requested = validate_scale("Requested amount", application.requested_amount)?;

        let mut uow = self.ctx.begin(vec![]).await?;

        // Applicant must exist and be active
        let applicant = uow
            .user_by_identification(&application.applicant_id)
            .await?
            .ok_or_else(|| BankError::not_found("Applicant", &application.applicant_id))?;
        if !applicant.is_active() {
            return Err(BankError::invalid_state(format!(
                "Applicant {} is not active ({})",
                application.applicant_id, applicant.status
            )));
        }

        let now = self.ctx.clock().now();
        let mut loan = Loan::application(
            application.loan_type,
            &application.applicant_id,
            requested,
            application.term_months,
            application.disbursement_account,
            created_by,
            now,
        )?;
        loan.id = uow.insert_loan(&loan).await?;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::LoanApplied,
            actor,
            ProductRef::Loan(loan.id),
            AuditDetail::new()
                .with("applicant_id", loan.applicant_id.as_str())
                .with("loan_type", loan.loan_type.as_str())
                .decimal("requested_amount", loan.requested_amount)
                .with("term_months", loan.term_months)
                .with("status", loan.status.as_str()),
            now,
        )
        .await?;
        uow.commit().await?;

        info!(loan_id = loan.id, amount = %requested, "Loan application filed");
        Ok(loan)
    }

    /// underwriting → approved
    pub async fn approve(
        &self,
        actor: Actor,
        loan_id: i64,
        approved_amount: Decimal,
        interest_rate: Decimal,
    ) -> BankResult<Loan> {
        let analyst_id = require_user(&actor)?;
        let mut uow = self.ctx.begin(vec![LockKey::Loan(loan_id)]).await?;
        let mut loan = fetch(uow.as_mut(), loan_id).await?;

        ensure_status(&loan, LoanStatus::Underwriting)?;
        let approved_amount = validate_scale("Approved amount", approved_amount)?;
        let interest_rate = validate_rate("Interest rate", interest_rate)?;

        let now = self.ctx.clock().now();
        let previous = loan.status;
        loan.approve(approved_amount, interest_rate, analyst_id, now)?;
        uow.update_loan(&loan).await?;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::LoanApproved,
            actor,
            ProductRef::Loan(loan_id),
            AuditDetail::new()
                .with("previous_status", previous.as_str())
                .with("new_status", loan.status.as_str())
                .decimal("approved_amount", approved_amount)
                .decimal("interest_rate", interest_rate)
                .with("analyst_id", analyst_id),
            now,
        )
        .await?;
        uow.commit().await?;

        info!(loan_id, amount = %approved_amount, "Loan approved");
        Ok(loan)
    }

    /// underwriting → rejected
    pub async fn reject(&self, actor: Actor, loan_id: i64, reason: &str) -> BankResult<Loan> {
        let analyst_id = require_user(&actor)?;
        let mut uow = self.ctx.begin(vec![LockKey::Loan(loan_id)]).await?;
        let mut loan = fetch(uow.as_mut(), loan_id).await?;

        ensure_status(&loan, LoanStatus::Underwriting)?;

        let now = self.ctx.clock().now();
        let previous = loan.status;
        loan.reject(reason, analyst_id, now)?;
        uow.update_loan(&loan).await?;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::LoanRejected,
            actor,
            ProductRef::Loan(loan_id),
            AuditDetail::new()
                .with("previous_status", previous.as_str())
                .with("new_status", loan.status.as_str())
                .with("reason", loan.rejection_reason.as_deref().unwrap_or_default())
                .with("analyst_id", analyst_id),
            now,
        )
        .await?;
        uow.commit().await?;

        info!(loan_id, "Loan rejected");
        Ok(loan)
    }

    /// approved → disbursed, crediting `destination`
    pub async fn disburse(
        &self,
        actor: Actor,
        loan_id: i64,
        destination: &str,
    ) -> BankResult<Loan> {
        require_user(&actor)?;
        let mut uow = self
            .ctx
            .begin(vec![
                LockKey::Account(destination.to_string()),
                LockKey::Loan(loan_id),
            ])
            .await?;
        let mut loan = fetch(uow.as_mut(), loan_id).await?;
        let amount = loan.disbursable_amount()?;

        // Destination must exist and be active
        let account = uow
            .account(destination)
            .await?
            .ok_or_else(|| BankError::not_found("Destination account", destination))?;
        if !account.is_active() {
            return Err(BankError::invalid_state(format!(
                "Destination account {} is {}",
                destination, account.status
            )));
        }

        let now = self.ctx.clock().now();
        let previous = loan.status;
        let credit = AccountService::adjust_in(uow.as_mut(), destination, amount).await?;
        loan.mark_disbursed(destination, now)?;
        uow.update_loan(&loan).await?;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::LoanDisbursed,
            actor,
            ProductRef::Loan(loan_id),
            AuditDetail::new()
                .with("previous_status", previous.as_str())
                .with("new_status", loan.status.as_str())
                .decimal("amount", amount)
                .with("destination_account", destination)
                .decimal("balance_before", credit.before)
                .decimal("balance_after", credit.after),
            now,
        )
        .await?;
        uow.commit().await?;

        info!(loan_id, destination, amount = %amount, "Loan disbursed");
        Ok(loan)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, loan_id: i64) -> BankResult<Loan> {
        let mut uow = self.ctx.read().await?;
        fetch(uow.as_mut(), loan_id).await
    }

    pub async fn by_applicant(&self, applicant_id: &str) -> BankResult<Vec<Loan>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.loans_by_applicant(applicant_id).await?)
    }

    pub async fn list(&self) -> BankResult<Vec<Loan>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.loans().await?)
    }

    /// Loans still in underwriting
    pub async fn pending(&self) -> BankResult<Vec<Loan>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.loans_by_status(LoanStatus::Underwriting).await?)
    }
}

async fn fetch(uow: &mut dyn UnitOfWork, loan_id: i64) -> BankResult<Loan> {
    uow.loan(loan_id)
        .await?
        .ok_or_else(|| BankError::not_found("Loan", loan_id))
}

fn ensure_status(loan: &Loan, expected: LoanStatus) -> BankResult<()> {
    if loan.status != expected {
        return Err(BankError::invalid_state(format!(
            "Loan {} is {}, expected {}",
            loan.id, loan.status, expected
        )));
    }
    Ok(())
}
