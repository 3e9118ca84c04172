//! # Loan Module
//!
//! Khoản vay và state machine:
//!
//! ```text
//! underwriting ──approve──▶ approved ──disburse──▶ disbursed
//!      │
//!      └──────reject──────▶ rejected
//! ```
//!
//! Không có chuyển trạng thái ngược.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Độ dài tối thiểu của lý do từ chối
pub const MIN_REJECTION_REASON_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanType {
    Personal,
    Mortgage,
    Vehicle,
    Corporate,
    Consumer,
}

impl LoanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanType::Personal => "personal",
            LoanType::Mortgage => "mortgage",
            LoanType::Vehicle => "vehicle",
            LoanType::Corporate => "corporate",
            LoanType::Consumer => "consumer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "personal" => Some(LoanType::Personal),
            "mortgage" => Some(LoanType::Mortgage),
            "vehicle" => Some(LoanType::Vehicle),
            "corporate" => Some(LoanType::Corporate),
            "consumer" => Some(LoanType::Consumer),
            _ => None,
        }
    }
}

impl fmt::Display for LoanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trạng thái khoản vay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Đang thẩm định, chờ analyst quyết định
    Underwriting,
    Approved,
    Rejected,
    /// Đã giải ngân (terminal)
    Disbursed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Underwriting => "underwriting",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Disbursed => "disbursed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "underwriting" => Some(LoanStatus::Underwriting),
            "approved" => Some(LoanStatus::Approved),
            "rejected" => Some(LoanStatus::Rejected),
            "disbursed" => Some(LoanStatus::Disbursed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Rejected | LoanStatus::Disbursed)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Khoản vay.
///
/// Invariants:
/// - `approved_amount`/`interest_rate` có giá trị ⟺ status ∈ {approved, disbursed}
/// - `rejection_reason` có giá trị ⟺ status = rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    /// ID (0 cho tới khi được lưu)
    pub id: i64,
    pub loan_type: LoanType,
    /// Số định danh của người vay
    pub applicant_id: String,
    pub requested_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    /// Lãi suất năm (%)
    pub interest_rate: Option<Decimal>,
    pub term_months: u32,
    pub status: LoanStatus,
    /// Thời điểm analyst quyết định (duyệt hoặc từ chối)
    pub approval_date: Option<DateTime<Utc>>,
    pub disbursement_date: Option<DateTime<Utc>>,
    pub disbursement_account: Option<String>,
    pub created_by: i64,
    /// Analyst đã duyệt/từ chối
    pub decided_by: Option<i64>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Tạo hồ sơ vay mới ở trạng thái underwriting
    pub fn application(
        loan_type: LoanType,
        applicant_id: &str,
        requested_amount: Decimal,
        term_months: u32,
        disbursement_account: Option<String>,
        created_by: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if requested_amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "Requested amount must be positive: {}",
                requested_amount
            )));
        }
        if term_months == 0 {
            return Err(CoreError::ValidationError(
                "Term must be at least one month".to_string(),
            ));
        }

        Ok(Self {
            id: 0,
            loan_type,
            applicant_id: applicant_id.to_string(),
            requested_amount,
            approved_amount: None,
            interest_rate: None,
            term_months,
            status: LoanStatus::Underwriting,
            approval_date: None,
            disbursement_date: None,
            disbursement_account,
            created_by,
            decided_by: None,
            rejection_reason: None,
            created_at: now,
        })
    }

    fn ensure_status(&self, expected: LoanStatus, target: LoanStatus) -> CoreResult<()> {
        if self.status != expected {
            return Err(CoreError::invalid_transition(
                "loan",
                self.id,
                self.status,
                target,
            ));
        }
        Ok(())
    }

    /// underwriting → approved
    pub fn approve(
        &mut self,
        approved_amount: Decimal,
        interest_rate: Decimal,
        analyst_id: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.ensure_status(LoanStatus::Underwriting, LoanStatus::Approved)?;
        if approved_amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "Approved amount must be positive: {}",
                approved_amount
            )));
        }
        if interest_rate <= Decimal::ZERO {
            return Err(CoreError::ValidationError(format!(
                "Interest rate must be positive: {}",
                interest_rate
            )));
        }

        self.status = LoanStatus::Approved;
        self.approved_amount = Some(approved_amount);
        self.interest_rate = Some(interest_rate);
        self.approval_date = Some(now);
        self.decided_by = Some(analyst_id);
        Ok(())
    }

    /// underwriting → rejected
    pub fn reject(&mut self, reason: &str, analyst_id: i64, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_status(LoanStatus::Underwriting, LoanStatus::Rejected)?;
        let reason = reason.trim();
        if reason.chars().count() < MIN_REJECTION_REASON_LEN {
            return Err(CoreError::ValidationError(format!(
                "Rejection reason must have at least {} characters",
                MIN_REJECTION_REASON_LEN
            )));
        }

        self.status = LoanStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.approval_date = Some(now);
        self.decided_by = Some(analyst_id);
        Ok(())
    }

    /// Số tiền sẽ được giải ngân, kiểm tra state trước.
    ///
    /// Tách riêng khỏi [`Loan::mark_disbursed`] để engine có thể kiểm tra tài
    /// khoản đích trước khi thay đổi khoản vay.
    pub fn disbursable_amount(&self) -> CoreResult<Decimal> {
        self.ensure_status(LoanStatus::Approved, LoanStatus::Disbursed)?;
        match self.approved_amount {
            Some(amount) if amount > Decimal::ZERO => Ok(amount),
            _ => Err(CoreError::corrupt(
                "loan",
                self.id,
                "approved amount missing or not positive",
            )),
        }
    }

    /// approved → disbursed
    pub fn mark_disbursed(
        &mut self,
        account_number: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Decimal> {
        let amount = self.disbursable_amount()?;
        self.status = LoanStatus::Disbursed;
        self.disbursement_date = Some(now);
        self.disbursement_account = Some(account_number.to_string());
        Ok(amount)
    }
}
