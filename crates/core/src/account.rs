//! # Account Module
//!
//! Định nghĩa Account - tài khoản ngân hàng với số dư fixed-point.
//! `owner_id` là số định danh của chủ tài khoản (weak reference, không phải
//! foreign key).

use crate::error::{CoreError, CoreResult};
use crate::money::{max_amount, Currency};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loại tài khoản
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Tài khoản tiết kiệm
    Savings,
    /// Tài khoản vãng lai
    Checking,
    Personal,
    Corporate,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
            AccountType::Personal => "personal",
            AccountType::Corporate => "corporate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "savings" => Some(AccountType::Savings),
            "checking" => Some(AccountType::Checking),
            "personal" => Some(AccountType::Personal),
            "corporate" => Some(AccountType::Corporate),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trạng thái của Account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Tài khoản hoạt động bình thường
    Active,
    /// Tài khoản bị khóa (có thể mở lại)
    Blocked,
    /// Tài khoản đã hủy
    Cancelled,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Blocked => "blocked",
            AccountStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(AccountStatus::Active),
            "blocked" => Some(AccountStatus::Blocked),
            "cancelled" => Some(AccountStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tài khoản ngân hàng.
///
/// Invariant: `balance >= 0`. Số dư chỉ thay đổi qua [`Account::apply_delta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Số tài khoản (10 chữ số, do hệ thống sinh)
    pub number: String,
    pub account_type: AccountType,
    /// Số định danh của chủ tài khoản
    pub owner_id: String,
    pub balance: Decimal,
    pub currency: Currency,
    pub status: AccountStatus,
    pub opened_at: DateTime<Utc>,
    /// ID của nhân viên mở tài khoản
    pub opened_by: Option<i64>,
}

impl Account {
    /// Số chữ số của số tài khoản
    pub const NUMBER_DIGITS: u32 = 10;

    /// Tạo Account mới với số dư 0, trạng thái active
    pub fn open(
        number: String,
        account_type: AccountType,
        owner_id: &str,
        currency: Currency,
        opened_by: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            number,
            account_type,
            owner_id: owner_id.to_string(),
            balance: Decimal::ZERO,
            currency,
            status: AccountStatus::Active,
            opened_at: now,
            opened_by,
        }
    }

    /// Sinh số tài khoản ứng viên từ thời gian (ms).
    ///
    /// `attempt` được cộng vào để retry khi bị trùng.
    pub fn number_candidate(now: DateTime<Utc>, attempt: u32) -> String {
        let modulus = 10_i64.pow(Self::NUMBER_DIGITS);
        let raw = (now.timestamp_millis() + i64::from(attempt)).rem_euclid(modulus);
        format!("{:0width$}", raw, width = Self::NUMBER_DIGITS as usize)
    }

    /// Kiểm tra account có active không
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Kiểm tra đủ số dư
    pub fn has_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Cộng `delta` (có thể âm) vào số dư.
    ///
    /// Trả về số dư mới; lỗi nếu kết quả âm (số dư không đổi).
    pub fn apply_delta(&mut self, delta: Decimal) -> CoreResult<Decimal> {
        let next = self.balance.checked_add(delta).ok_or_else(|| {
            CoreError::InvalidAmount(format!("balance overflow on account {}", self.number))
        })?;
        if next < Decimal::ZERO {
            return Err(CoreError::InsufficientFunds {
                needed: -delta,
                available: self.balance,
            });
        }
        if next > max_amount() {
            return Err(CoreError::InvalidAmount(format!(
                "balance of account {} would exceed {}",
                self.number,
                max_amount()
            )));
        }
        self.balance = next;
        Ok(next)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Account {} ({}, owner: {}, {} {}, {})",
            self.number, self.account_type, self.owner_id, self.balance, self.currency, self.status
        )
    }
}
