//! # Audit Module
//!
//! Bản ghi kiểm toán: append-only, không bao giờ sửa hoặc xóa.
//! Mỗi thao tác thay đổi trạng thái ghi một [`AuditEntry`] với snapshot
//! trước/sau trong [`AuditDetail`].

use crate::user::UserRole;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Loại thao tác được ghi vào audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    // === Account ===
    AccountOpened,
    AccountStatusChanged,
    BalanceAdjusted,

    // === Loan ===
    LoanApplied,
    LoanApproved,
    LoanRejected,
    LoanDisbursed,

    // === Transfer ===
    TransferExecuted,
    /// Chuyển khoản bị giữ chờ duyệt
    TransferHeld,
    TransferApproved,
    TransferRejected,
    TransferExpired,

    // === User ===
    UserRegistered,
    UserStatusChanged,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::AccountOpened => "account_opened",
            OperationType::AccountStatusChanged => "account_status_changed",
            OperationType::BalanceAdjusted => "balance_adjusted",
            OperationType::LoanApplied => "loan_applied",
            OperationType::LoanApproved => "loan_approved",
            OperationType::LoanRejected => "loan_rejected",
            OperationType::LoanDisbursed => "loan_disbursed",
            OperationType::TransferExecuted => "transfer_executed",
            OperationType::TransferHeld => "transfer_held",
            OperationType::TransferApproved => "transfer_approved",
            OperationType::TransferRejected => "transfer_rejected",
            OperationType::TransferExpired => "transfer_expired",
            OperationType::UserRegistered => "user_registered",
            OperationType::UserStatusChanged => "user_status_changed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let op = match s {
            "account_opened" => OperationType::AccountOpened,
            "account_status_changed" => OperationType::AccountStatusChanged,
            "balance_adjusted" => OperationType::BalanceAdjusted,
            "loan_applied" => OperationType::LoanApplied,
            "loan_approved" => OperationType::LoanApproved,
            "loan_rejected" => OperationType::LoanRejected,
            "loan_disbursed" => OperationType::LoanDisbursed,
            "transfer_executed" => OperationType::TransferExecuted,
            "transfer_held" => OperationType::TransferHeld,
            "transfer_approved" => OperationType::TransferApproved,
            "transfer_rejected" => OperationType::TransferRejected,
            "transfer_expired" => OperationType::TransferExpired,
            "user_registered" => OperationType::UserRegistered,
            "user_status_changed" => OperationType::UserStatusChanged,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Người thực hiện thao tác.
///
/// `System` là actor dành riêng cho các tác vụ nền (sweep hết hạn), không
/// tương ứng với user nào.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    User { id: i64, role: UserRole },
    System,
}

impl Actor {
    /// Role string lưu trong cột `actor_role`
    pub const SYSTEM_ROLE: &'static str = "system";

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Actor::User { id, .. } => Some(*id),
            Actor::System => None,
        }
    }

    pub fn role_str(&self) -> &'static str {
        match self {
            Actor::User { role, .. } => role.as_str(),
            Actor::System => Self::SYSTEM_ROLE,
        }
    }

    /// Dựng lại Actor từ hai cột đã lưu
    pub fn from_parts(user_id: Option<i64>, role: &str) -> Option<Self> {
        match (user_id, role) {
            (None, Self::SYSTEM_ROLE) => Some(Actor::System),
            (Some(id), role) => UserRole::from_str(role).map(|role| Actor::User { id, role }),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User { id, role } => write!(f, "user {} ({})", id, role),
            Actor::System => write!(f, "system"),
        }
    }
}

/// Sản phẩm bị tác động bởi một audit entry.
///
/// Lưu dưới dạng `<kind>:<id>` (`account:0000000001`, `loan:3`,
/// `transfer:3`, `user:3`) vì ID của loan, transfer và user trùng không gian.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductRef {
    Account(String),
    Loan(i64),
    Transfer(i64),
    User(i64),
}

impl ProductRef {
    pub fn kind(&self) -> &'static str {
        match self {
            ProductRef::Account(_) => "account",
            ProductRef::Loan(_) => "loan",
            ProductRef::Transfer(_) => "transfer",
            ProductRef::User(_) => "user",
        }
    }

    /// Parse `<kind>:<id>`; trả về None nếu sai định dạng
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, id) = s.trim().split_once(':')?;
        if id.is_empty() {
            return None;
        }
        match kind {
            "account" => Some(ProductRef::Account(id.to_string())),
            "loan" => id.parse().ok().map(ProductRef::Loan),
            "transfer" => id.parse().ok().map(ProductRef::Transfer),
            "user" => id.parse().ok().map(ProductRef::User),
            _ => None,
        }
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductRef::Account(number) => write!(f, "account:{}", number),
            ProductRef::Loan(id) | ProductRef::Transfer(id) | ProductRef::User(id) => {
                write!(f, "{}:{}", self.kind(), id)
            }
        }
    }
}

/// Payload key-value của một audit entry.
///
/// Số tiền được lưu dạng string để không mất precision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditDetail(BTreeMap<String, Value>);

impl AuditDetail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn decimal(self, key: &str, value: Decimal) -> Self {
        self.with(key, value.to_string())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Đọc lại một giá trị Decimal đã ghi bằng [`AuditDetail::decimal`]
    pub fn get_decimal(&self, key: &str) -> Option<Decimal> {
        self.get(key)?.as_str()?.parse().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw).map(Self)
    }
}

/// Một dòng trong audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// ID (0 cho tới khi được lưu)
    pub id: i64,
    pub operation_type: OperationType,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    /// [`ProductRef`] đã format (`transfer:3`, ...)
    pub affected_product_id: Option<String>,
    pub detail: AuditDetail,
}

impl AuditEntry {
    pub fn new(
        operation_type: OperationType,
        actor: Actor,
        affected_product_id: Option<String>,
        detail: AuditDetail,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            operation_type,
            timestamp,
            actor,
            affected_product_id,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_detail_roundtrip_keeps_precision() {
        let detail = AuditDetail::new()
            .decimal("source_before", dec!(10000000.00))
            .decimal("source_after", dec!(4000000.00))
            .with("transfer_id", 3);

        let raw = detail.to_json().unwrap();
        assert!(raw.contains("\"source_before\":\"10000000.00\""));

        let back = AuditDetail::from_json(&raw).unwrap();
        assert_eq!(back.get_decimal("source_after"), Some(dec!(4000000.00)));
        assert_eq!(back.get("transfer_id"), Some(&Value::from(3)));
    }

    #[test]
    fn test_actor_columns() {
        assert_eq!(Actor::System.user_id(), None);
        assert_eq!(Actor::System.role_str(), "system");
        assert_eq!(Actor::from_parts(None, "system"), Some(Actor::System));

        let supervisor = Actor::User {
            id: 5,
            role: UserRole::CompanySupervisor,
        };
        assert_eq!(
            Actor::from_parts(Some(5), supervisor.role_str()),
            Some(supervisor)
        );
        assert_eq!(Actor::from_parts(None, "company_supervisor"), None);
    }

    #[test]
    fn test_product_ref_format() {
        assert_eq!(ProductRef::Transfer(1).to_string(), "transfer:1");
        assert_eq!(ProductRef::User(1).to_string(), "user:1");
        assert_ne!(ProductRef::Loan(1).to_string(), ProductRef::User(1).to_string());
        assert_eq!(
            ProductRef::parse("account:0000000042"),
            Some(ProductRef::Account("0000000042".to_string()))
        );
        assert_eq!(ProductRef::parse("loan:7"), Some(ProductRef::Loan(7)));
        assert_eq!(ProductRef::parse("7"), None);
        assert_eq!(ProductRef::parse("loan:x"), None);
        assert_eq!(ProductRef::parse("wallet:1"), None);
        assert_eq!(ProductRef::parse("account:"), None);
    }

    #[test]
    fn test_operation_codes() {
        for op in [
            OperationType::TransferHeld,
            OperationType::LoanDisbursed,
            OperationType::UserStatusChanged,
        ] {
            assert_eq!(OperationType::from_str(op.as_str()), Some(op));
        }
    }
}
