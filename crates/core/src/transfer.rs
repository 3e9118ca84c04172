//! # Transfer Module
//!
//! Chuyển khoản giữa hai tài khoản với workflow duyệt có điều kiện.
//!
//! ```text
//! create ──(không cần duyệt)──▶ executed
//!    │
//!    └──(corporate ∧ amount > threshold)──▶ pending_approval
//!                                              ├─approve─▶ executed
//!                                              ├─reject──▶ rejected
//!                                              └─expire──▶ expired
//! ```

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ngưỡng duyệt (đơn vị tiền tệ nguyên)
pub const APPROVAL_THRESHOLD_UNITS: i64 = 5_000_000;

/// Thời hạn chờ duyệt (ms)
pub const EXPIRY_WINDOW_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Executed,
    PendingApproval,
    Rejected,
    Expired,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Executed => "executed",
            TransferStatus::PendingApproval => "pending_approval",
            TransferStatus::Rejected => "rejected",
            TransferStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "executed" => Some(TransferStatus::Executed),
            "pending_approval" => Some(TransferStatus::PendingApproval),
            "rejected" => Some(TransferStatus::Rejected),
            "expired" => Some(TransferStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::PendingApproval)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cách xử lý tiền của chuyển khoản đang chờ duyệt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingFunds {
    /// Không giữ tiền: số dư nguồn có thể bị tiêu trong lúc chờ duyệt,
    /// việc duyệt sẽ kiểm tra lại số dư.
    #[default]
    Unreserved,
}

/// Chính sách duyệt chuyển khoản
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPolicy {
    pub approval_threshold: Decimal,
    pub expiry_window: Duration,
    pub pending_funds: PendingFunds,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            approval_threshold: Decimal::new(APPROVAL_THRESHOLD_UNITS, 0),
            expiry_window: Duration::milliseconds(EXPIRY_WINDOW_MS),
            pending_funds: PendingFunds::Unreserved,
        }
    }
}

impl TransferPolicy {
    /// Cần duyệt khi là chuyển khoản doanh nghiệp và vượt ngưỡng (strict)
    pub fn requires_approval(&self, is_corporate: bool, amount: Decimal) -> bool {
        is_corporate && amount > self.approval_threshold
    }

    /// Hết hạn khi `now - created_at > expiry_window` (strict)
    pub fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - created_at > self.expiry_window
    }
}

/// Chuyển khoản
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// ID (0 cho tới khi được lưu)
    pub id: i64,
    pub source_account: String,
    pub destination_account: String,
    pub amount: Decimal,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub creator_id: i64,
    pub approver_id: Option<i64>,
    pub memo: Option<String>,
    /// Lý do từ chối (nếu có)
    pub rejection_reason: Option<String>,
}

impl Transfer {
    /// Tạo chuyển khoản mới với status ban đầu đã được quyết định
    pub fn new(
        source_account: &str,
        destination_account: &str,
        amount: Decimal,
        status: TransferStatus,
        creator_id: i64,
        memo: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if source_account == destination_account {
            return Err(CoreError::ValidationError(
                "Source and destination accounts must differ".to_string(),
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "Transfer amount must be positive: {}",
                amount
            )));
        }
        if matches!(status, TransferStatus::Rejected | TransferStatus::Expired) {
            return Err(CoreError::invalid_transition(
                "transfer", "new", "none", status,
            ));
        }

        Ok(Self {
            id: 0,
            source_account: source_account.to_string(),
            destination_account: destination_account.to_string(),
            amount,
            status,
            created_at: now,
            approved_at: None,
            creator_id,
            approver_id: None,
            memo,
            rejection_reason: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::PendingApproval
    }

    fn ensure_pending(&self, target: TransferStatus) -> CoreResult<()> {
        if !self.is_pending() {
            return Err(CoreError::invalid_transition(
                "transfer",
                self.id,
                self.status,
                target,
            ));
        }
        Ok(())
    }

    /// pending_approval → executed
    pub fn execute(&mut self, approver_id: i64, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_pending(TransferStatus::Executed)?;
        self.status = TransferStatus::Executed;
        self.approved_at = Some(now);
        self.approver_id = Some(approver_id);
        Ok(())
    }

    /// pending_approval → rejected. `approved_at` ghi thời điểm quyết định.
    pub fn reject(
        &mut self,
        approver_id: i64,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.ensure_pending(TransferStatus::Rejected)?;
        self.status = TransferStatus::Rejected;
        self.approved_at = Some(now);
        self.approver_id = Some(approver_id);
        self.rejection_reason = reason;
        Ok(())
    }

    /// pending_approval → expired
    pub fn expire(&mut self) -> CoreResult<()> {
        self.ensure_pending(TransferStatus::Expired)?;
        self.status = TransferStatus::Expired;
        Ok(())
    }
}
