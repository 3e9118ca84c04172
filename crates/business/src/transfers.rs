//! Transfer workflow engine
//!
//! Creation executes immediately unless the transfer is corporate and above
//! the approval threshold, in which case it is held for a supervisor.
//! Held transfers are not funded until approval; see [`PendingFunds`].
//!
//! [`PendingFunds`]: banco_core::PendingFunds

use crate::accounts::{AccountService, BalanceChange};
use crate::audit::AuditWriter;
use crate::error::{BankError, BankResult};
use crate::services::{require_user, ServiceContext};
use banco_core::{
    validate_scale, Actor, AuditDetail, OperationType, ProductRef, Transfer,
    TransferStatus,
};
use banco_persistence::{LockKey, UnitOfWork};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

const HELD_REASON: &str = "amount exceeds approval threshold";
const EXPIRED_REASON: &str = "expired without approval within the allowed window";
const DEFAULT_REJECTION_REASON: &str = "Rejected by supervisor";

/// Input for a new transfer
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_account: String,
    pub destination_account: String,
    pub amount: Decimal,
    pub is_corporate: bool,
    pub memo: Option<String>,
}

/// Transfer Workflow Engine - create, approve, reject, sweep
pub struct TransferService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TransferService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create a transfer; executes now or is held for approval
    pub async fn create(&self, actor: Actor, request: TransferRequest) -> BankResult<Transfer> {
        let creator_id = require_user(&actor)?;

        // Validate input
        if request.source_account == request.destination_account {
            return Err(BankError::validation(
                "Source and destination accounts must differ",
            ));
        }
        let amount = validate_scale("Transfer amount", request.amount)?;

        let mut uow = self
            .ctx
            .begin(vec![
                LockKey::Account(request.source_account.clone()),
                LockKey::Account(request.destination_account.clone()),
            ])
            .await?;
        let now = self.ctx.clock().now();

        // Source must exist and be active
        let source = uow
            .account(&request.source_account)
            .await?
            .ok_or_else(|| BankError::not_found("Source account", &request.source_account))?;
        if !source.is_active() {
            return Err(BankError::invalid_state(format!(
                "Source account {} is {}",
                source.number, source.status
            )));
        }

        // Destination must exist (status not checked)
        if uow.account(&request.destination_account).await?.is_none() {
            return Err(BankError::not_found(
                "Destination account",
                &request.destination_account,
            ));
        }

        if self.ctx.policy().requires_approval(request.is_corporate, amount) {
            let mut transfer = Transfer::new(
                &request.source_account,
                &request.destination_account,
                amount,
                TransferStatus::PendingApproval,
                creator_id,
                request.memo,
                now,
            )?;
            transfer.id = uow.insert_transfer(&transfer).await?;

            AuditWriter::record(
                uow.as_mut(),
                OperationType::TransferHeld,
                actor,
                ProductRef::Transfer(transfer.id),
                AuditDetail::new()
                    .decimal("amount", amount)
                    .with("source_account", transfer.source_account.as_str())
                    .with("destination_account", transfer.destination_account.as_str())
                    .with("reason", HELD_REASON),
                now,
            )
            .await?;
            uow.commit().await?;

            info!(
                transfer_id = transfer.id,
                amount = %amount,
                "Transfer held for approval"
            );
            return Ok(transfer);
        }

        if !source.has_funds(amount) {
            return Err(BankError::InsufficientFunds {
                required: amount,
                available: source.balance,
            });
        }

        let (debit, credit) = Self::move_funds(
            uow.as_mut(),
            &request.source_account,
            &request.destination_account,
            amount,
        )
        .await?;

        let mut transfer = Transfer::new(
            &request.source_account,
            &request.destination_account,
            amount,
            TransferStatus::Executed,
            creator_id,
            request.memo,
            now,
        )?;
        transfer.id = uow.insert_transfer(&transfer).await?;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::TransferExecuted,
            actor,
            ProductRef::Transfer(transfer.id),
            movement_detail(&transfer, debit, credit),
            now,
        )
        .await?;
        uow.commit().await?;

        info!(transfer_id = transfer.id, amount = %amount, "Transfer executed");
        Ok(transfer)
    }

    /// Approve a held transfer.
    ///
    /// A transfer past its window is moved to `expired` (and that write is
    /// committed) before the call fails with `Expired`.
    pub async fn approve(&self, actor: Actor, transfer_id: i64) -> BankResult<Transfer> {
        let approver_id = require_user(&actor)?;

        // Peek to learn which accounts to lock
        let peeked = self.load(transfer_id).await?;
        let mut uow = self
            .ctx
            .begin(vec![
                LockKey::Transfer(transfer_id),
                LockKey::Account(peeked.source_account.clone()),
                LockKey::Account(peeked.destination_account.clone()),
            ])
            .await?;

        let mut transfer = uow
            .transfer(transfer_id)
            .await?
            .ok_or_else(|| BankError::not_found("Transfer", transfer_id))?;
        ensure_pending(&transfer)?;

        let now = self.ctx.clock().now();
        if self.ctx.policy().is_expired(transfer.created_at, now) {
            self.expire_in(uow.as_mut(), &mut transfer, actor, now).await?;
            uow.commit().await?;
            warn!(transfer_id, "Approval attempted after expiry window");
            return Err(BankError::Expired { transfer_id });
        }

        // Re-validate source
        let source = uow
            .account(&transfer.source_account)
            .await?
            .ok_or_else(|| BankError::not_found("Source account", &transfer.source_account))?;
        if !source.is_active() {
            return Err(BankError::invalid_state(format!(
                "Source account {} is {}",
                source.number, source.status
            )));
        }
        if !source.has_funds(transfer.amount) {
            return Err(BankError::InsufficientFunds {
                required: transfer.amount,
                available: source.balance,
            });
        }

        let (debit, credit) = Self::move_funds(
            uow.as_mut(),
            &transfer.source_account,
            &transfer.destination_account,
            transfer.amount,
        )
        .await?;

        transfer.execute(approver_id, now)?;
        if !uow
            .update_transfer(&transfer, TransferStatus::PendingApproval)
            .await?
        {
            warn!(transfer_id, "Transfer changed state during approval");
            return Err(lost_race(transfer_id));
        }

        AuditWriter::record(
            uow.as_mut(),
            OperationType::TransferApproved,
            actor,
            ProductRef::Transfer(transfer_id),
            movement_detail(&transfer, debit, credit),
            now,
        )
        .await?;
        uow.commit().await?;

        info!(transfer_id, approver = approver_id, "Transfer approved");
        Ok(transfer)
    }

    /// Reject a held transfer. Expiry is not checked.
    pub async fn reject(
        &self,
        actor: Actor,
        transfer_id: i64,
        reason: Option<String>,
    ) -> BankResult<Transfer> {
        let approver_id = require_user(&actor)?;
        let mut uow = self.ctx.begin(vec![LockKey::Transfer(transfer_id)]).await?;

        let mut transfer = uow
            .transfer(transfer_id)
            .await?
            .ok_or_else(|| BankError::not_found("Transfer", transfer_id))?;
        ensure_pending(&transfer)?;

        let now = self.ctx.clock().now();
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        transfer.reject(approver_id, reason.clone(), now)?;
        if !uow
            .update_transfer(&transfer, TransferStatus::PendingApproval)
            .await?
        {
            warn!(transfer_id, "Transfer changed state during rejection");
            return Err(lost_race(transfer_id));
        }

        AuditWriter::record(
            uow.as_mut(),
            OperationType::TransferRejected,
            actor,
            ProductRef::Transfer(transfer_id),
            AuditDetail::new()
                .with("previous_status", TransferStatus::PendingApproval.as_str())
                .with("new_status", transfer.status.as_str())
                .with(
                    "reason",
                    reason.as_deref().unwrap_or(DEFAULT_REJECTION_REASON),
                )
                .with("creator_id", transfer.creator_id),
            now,
        )
        .await?;
        uow.commit().await?;

        info!(transfer_id, approver = approver_id, "Transfer rejected");
        Ok(transfer)
    }

    /// Expire every held transfer past its window, as the system actor.
    ///
    /// Returns how many transfers moved. Running it twice in a row yields 0
    /// the second time.
    pub async fn sweep_expired(&self) -> BankResult<usize> {
        let now = self.ctx.clock().now();
        let candidates: Vec<i64> = {
            let mut uow = self.ctx.read().await?;
            uow.transfers_by_status(TransferStatus::PendingApproval)
                .await?
                .into_iter()
                .filter(|t| self.ctx.policy().is_expired(t.created_at, now))
                .map(|t| t.id)
                .collect()
        };
        debug!(candidates = candidates.len(), "Sweeping held transfers");

        let mut expired = 0;
        for transfer_id in candidates {
            let mut uow = self.ctx.begin(vec![LockKey::Transfer(transfer_id)]).await?;
            let Some(mut transfer) = uow.transfer(transfer_id).await? else {
                continue;
            };

            // Approved, rejected or expired since the scan
            if !transfer.is_pending() {
                debug!(transfer_id, status = %transfer.status, "Skipping settled transfer");
                continue;
            }
            if !self.ctx.policy().is_expired(transfer.created_at, now) {
                continue;
            }

            match self
                .expire_in(uow.as_mut(), &mut transfer, Actor::System, now)
                .await
            {
                Ok(()) => {}
                Err(BankError::InvalidState(_)) => continue,
                Err(e) => return Err(e),
            }
            uow.commit().await?;
            expired += 1;
        }

        if expired > 0 {
            info!(expired, "Expired held transfers");
        }
        Ok(expired)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, transfer_id: i64) -> BankResult<Transfer> {
        self.load(transfer_id).await
    }

    pub async fn by_account(&self, number: &str) -> BankResult<Vec<Transfer>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.transfers_by_account(number).await?)
    }

    pub async fn by_creator(&self, creator_id: i64) -> BankResult<Vec<Transfer>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.transfers_by_creator(creator_id).await?)
    }

    /// Transfers awaiting approval, expired-but-unswept included
    pub async fn pending(&self) -> BankResult<Vec<Transfer>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow
            .transfers_by_status(TransferStatus::PendingApproval)
            .await?)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load(&self, transfer_id: i64) -> BankResult<Transfer> {
        let mut uow = self.ctx.read().await?;
        uow.transfer(transfer_id)
            .await?
            .ok_or_else(|| BankError::not_found("Transfer", transfer_id))
    }

    /// Debit source and credit destination; caller holds both row locks
    async fn move_funds(
        uow: &mut dyn UnitOfWork,
        source: &str,
        destination: &str,
        amount: Decimal,
    ) -> BankResult<(BalanceChange, BalanceChange)> {
        let debit = AccountService::adjust_in(uow, source, -amount).await?;
        let credit = AccountService::adjust_in(uow, destination, amount).await?;
        Ok((debit, credit))
    }

    /// pending_approval → expired plus its audit entry, inside `uow`
    async fn expire_in(
        &self,
        uow: &mut dyn UnitOfWork,
        transfer: &mut Transfer,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> BankResult<()> {
        transfer.expire()?;
        if !uow
            .update_transfer(transfer, TransferStatus::PendingApproval)
            .await?
        {
            warn!(transfer_id = transfer.id, "Transfer settled before it could expire");
            return Err(lost_race(transfer.id));
        }

        AuditWriter::record(
            uow,
            OperationType::TransferExpired,
            actor,
            ProductRef::Transfer(transfer.id),
            AuditDetail::new()
                .with("previous_status", TransferStatus::PendingApproval.as_str())
                .with("new_status", transfer.status.as_str())
                .with("reason", EXPIRED_REASON)
                .with("expired_at", now.to_rfc3339())
                .with("creator_id", transfer.creator_id),
            now,
        )
        .await?;

        info!(transfer_id = transfer.id, by = %actor, "Transfer expired");
        Ok(())
    }
}

fn ensure_pending(transfer: &Transfer) -> BankResult<()> {
    if !transfer.is_pending() {
        return Err(BankError::invalid_state(format!(
            "Transfer {} is not pending approval ({})",
            transfer.id, transfer.status
        )));
    }
    Ok(())
}

fn lost_race(transfer_id: i64) -> BankError {
    BankError::invalid_state(format!(
        "Transfer {} was settled by another operation",
        transfer_id
    ))
}

fn movement_detail(
    transfer: &Transfer,
    debit: BalanceChange,
    credit: BalanceChange,
) -> AuditDetail {
    AuditDetail::new()
        .decimal("amount", transfer.amount)
        .with("source_account", transfer.source_account.as_str())
        .with("destination_account", transfer.destination_account.as_str())
        .decimal("source_before", debit.before)
        .decimal("source_after", debit.after)
        .decimal("destination_before", credit.before)
        .decimal("destination_after", credit.after)
}
