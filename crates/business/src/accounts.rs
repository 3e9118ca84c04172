//! Account service - opening, balance mutation, status changes
//!
//! Balance changes made on behalf of a workflow go through
//! [`AccountService::adjust_in`] inside the workflow's own unit of work.

use crate::audit::AuditWriter;
use crate::error::{BankError, BankResult};
use crate::services::{require_user, ServiceContext};
use banco_core::{
    validate_scale, Account, AccountStatus, AccountType, Actor, AuditDetail, Currency,
    OperationType, ProductRef, Transfer,
};
use banco_persistence::{LockKey, UnitOfWork};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Attempts at finding a free account number before giving up
const MAX_NUMBER_ATTEMPTS: u32 = 16;

/// Balance before and after one adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub before: Decimal,
    pub after: Decimal,
}

/// Account Service - open, adjust, set status, queries
pub struct AccountService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AccountService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Open an account for an existing, active owner
    pub async fn open(
        &self,
        actor: Actor,
        owner_id: &str,
        account_type: AccountType,
        currency: Currency,
    ) -> BankResult<Account> {
        let opened_by = require_user(&actor)?;

        let now = self.ctx.clock().now();
        for attempt in 0..MAX_NUMBER_ATTEMPTS {
            let number = Account::number_candidate(now, attempt);
            let mut uow = self.ctx.begin(vec![LockKey::Account(number.clone())]).await?;

            // Owner must exist and be active, checked in the same unit of work
            let owner = uow
                .user_by_identification(owner_id)
                .await?
                .ok_or_else(|| BankError::not_found("Owner", owner_id))?;
            if !owner.is_active() {
                return Err(BankError::invalid_state(format!(
                    "Owner {} is not active ({})",
                    owner_id, owner.status
                )));
            }

            if uow.account(&number).await?.is_some() {
                debug!(number = %number, attempt, "Account number taken, retrying");
                continue;
            }

            let account = Account::open(
                number.clone(),
                account_type,
                owner_id,
                currency,
                Some(opened_by),
                now,
            );
            match uow.insert_account(&account).await {
                Err(e) if e.is_already_exists() => continue,
                other => other?,
            }

            AuditWriter::record(
                uow.as_mut(),
                OperationType::AccountOpened,
                actor,
                ProductRef::Account(number.clone()),
                AuditDetail::new()
                    .with("owner_id", owner_id)
                    .with("account_type", account_type.as_str())
                    .with("currency", currency.as_str())
                    .decimal("balance", account.balance)
                    .with("status", account.status.as_str()),
                now,
            )
            .await?;

            match uow.commit().await {
                Err(e) if e.is_already_exists() => continue,
                other => other?,
            }

            info!(number = %number, owner = owner_id, "Account opened");
            return Ok(account);
        }

        Err(BankError::invalid_state(
            "Could not allocate a unique account number",
        ))
    }

    /// Apply `delta` to an account inside an open unit of work.
    ///
    /// The caller must hold the account's row lock.
    pub async fn adjust_in(
        uow: &mut dyn UnitOfWork,
        number: &str,
        delta: Decimal,
    ) -> BankResult<BalanceChange> {
        let mut account = uow
            .account(number)
            .await?
            .ok_or_else(|| BankError::not_found("Account", number))?;

        let before = account.balance;
        let after = account.apply_delta(delta)?;
        uow.update_account_balance(number, after).await?;

        Ok(BalanceChange { before, after })
    }

    /// Standalone balance adjustment (teller deposit or withdrawal)
    pub async fn adjust_balance(
        &self,
        actor: Actor,
        number: &str,
        delta: Decimal,
    ) -> BankResult<Decimal> {
        require_user(&actor)?;
        if delta.is_zero() {
            return Err(BankError::validation("Adjustment must not be zero"));
        }
        validate_scale("Adjustment", delta.abs())?;

        let mut uow = self.ctx.begin(vec![LockKey::Account(number.to_string())]).await?;
        let change = Self::adjust_in(uow.as_mut(), number, delta).await?;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::BalanceAdjusted,
            actor,
            ProductRef::Account(number.to_string()),
            AuditDetail::new()
                .decimal("delta", delta)
                .decimal("balance_before", change.before)
                .decimal("balance_after", change.after),
            self.ctx.clock().now(),
        )
        .await?;
        uow.commit().await?;

        info!(number, delta = %delta, balance = %change.after, "Balance adjusted");
        Ok(change.after)
    }

    /// Write a new status. No transition guard: any status may follow any other.
    pub async fn set_status(
        &self,
        actor: Actor,
        number: &str,
        status: AccountStatus,
    ) -> BankResult<Account> {
        let mut uow = self.ctx.begin(vec![LockKey::Account(number.to_string())]).await?;
        let mut account = uow
            .account(number)
            .await?
            .ok_or_else(|| BankError::not_found("Account", number))?;

        let previous = account.status;
        uow.update_account_status(number, status).await?;
        account.status = status;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::AccountStatusChanged,
            actor,
            ProductRef::Account(number.to_string()),
            AuditDetail::new()
                .with("previous_status", previous.as_str())
                .with("new_status", status.as_str()),
            self.ctx.clock().now(),
        )
        .await?;
        uow.commit().await?;

        info!(number, from = %previous, to = %status, "Account status changed");
        Ok(account)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, number: &str) -> BankResult<Account> {
        let mut uow = self.ctx.read().await?;
        uow.account(number)
            .await?
            .ok_or_else(|| BankError::not_found("Account", number))
    }

    pub async fn by_owner(&self, owner_id: &str) -> BankResult<Vec<Account>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.accounts_by_owner(owner_id).await?)
    }

    pub async fn list(&self) -> BankResult<Vec<Account>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.accounts().await?)
    }

    /// Transfers where the account is source or destination
    pub async fn history(&self, number: &str) -> BankResult<Vec<Transfer>> {
        let mut uow = self.ctx.read().await?;
        if uow.account(number).await?.is_none() {
            return Err(BankError::not_found("Account", number));
        }
        Ok(uow.transfers_by_account(number).await?)
    }
}
