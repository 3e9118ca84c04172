//! # Money Module
//!
//! Định nghĩa Currency cho Banco. Số tiền luôn là `rust_decimal::Decimal`
//! (fixed-point), không bao giờ dùng f64.

use crate::error::{CoreError, CoreResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Số chữ số thập phân tối đa của các cột tiền (DECIMAL(15,2)).
pub const MONEY_SCALE: u32 = 2;

/// Loại tiền tệ được hỗ trợ.
///
/// Không có logic quy đổi giữa các loại tiền.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Peso Colombia (0 decimals trong hiển thị)
    #[default]
    Cop,
    /// US Dollar
    Usd,
    /// Euro
    Eur,
}

impl Currency {
    /// Trả về ISO code cho DB
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Cop => "COP",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    /// Parse từ string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "COP" => Some(Currency::Cop),
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            _ => None,
        }
    }

    /// Số chữ số thập phân khi hiển thị
    pub fn display_decimals(&self) -> u32 {
        match self {
            Currency::Cop => 0,
            Currency::Usd | Currency::Eur => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tổng số chữ số của các cột tiền (DECIMAL(15,2)).
pub const MONEY_PRECISION: u32 = 15;

/// Tổng số chữ số của lãi suất (DECIMAL(5,2)).
pub const RATE_PRECISION: u32 = 5;

/// Giá trị lớn nhất của một cột DECIMAL(precision, MONEY_SCALE)
fn column_max(precision: u32) -> Decimal {
    Decimal::new(10_i64.pow(precision) - 1, MONEY_SCALE)
}

/// Số tiền / số dư lớn nhất lưu được: 9,999,999,999,999.99
pub fn max_amount() -> Decimal {
    column_max(MONEY_PRECISION)
}

/// Lãi suất lớn nhất: 999.99
pub fn max_rate() -> Decimal {
    column_max(RATE_PRECISION)
}

/// Kiểm tra một số tiền dương, không vượt quá `MONEY_SCALE` chữ số thập phân
/// và nằm trong giới hạn DECIMAL(15,2).
pub fn validate_scale(field: &str, amount: Decimal) -> CoreResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "{} must be positive: {}",
            field, amount
        )));
    }
    if amount > max_amount() {
        return Err(CoreError::InvalidAmount(format!(
            "{} exceeds the maximum of {}: {}",
            field,
            max_amount(),
            amount
        )));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(CoreError::InvalidAmount(format!(
            "{} has more than {} decimal places: {}",
            field, MONEY_SCALE, amount
        )));
    }
    Ok(amount)
}

/// Lãi suất dương, tối đa 2 chữ số thập phân, trong giới hạn DECIMAL(5,2)
pub fn validate_rate(field: &str, rate: Decimal) -> CoreResult<Decimal> {
    if rate <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "{} must be positive: {}",
            field, rate
        )));
    }
    if rate > max_rate() || rate.normalize().scale() > MONEY_SCALE {
        return Err(CoreError::InvalidAmount(format!(
            "{} must be at most {} with {} decimal places: {}",
            field,
            max_rate(),
            MONEY_SCALE,
            rate
        )));
    }
    Ok(rate)
}
