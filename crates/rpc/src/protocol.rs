//! Wire format
//!
//! One JSON object per request and per response. Amounts travel as decimal
//! strings (`"6000000.00"`) so no precision is lost.

use banco_business::{BankError, ErrorKind};
use banco_core::{
    AccountStatus, AccountType, Currency, LoanType, ProductCategory, UserRole, UserStatus,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Incoming request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Echoed back; generated when absent
    #[serde(default)]
    pub id: Option<String>,
    /// Id of the calling user
    #[serde(default)]
    pub caller: Option<i64>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            id: None,
            caller: None,
            method: method.to_string(),
            params,
        }
    }

    pub fn with_caller(mut self, caller: i64) -> Self {
        self.caller = Some(caller);
        self
    }
}

/// Outgoing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: String, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: String, error: RpcError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Error as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}: {message}", .kind.as_str())]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Caller's role may not invoke `method`
    pub fn forbidden(role: UserRole, method: &str) -> Self {
        Self::new(
            ErrorKind::InvalidState,
            format!("Role {} is not allowed to call {}", role, method),
        )
    }
}

impl From<BankError> for RpcError {
    fn from(err: BankError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

// ============================================================================
// Params
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginParams {
    pub identification: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserParams {
    pub full_name: String,
    pub identification: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub address: String,
    pub role: UserRole,
    pub password: String,
    #[serde(default)]
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserIdParams {
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserStatusParams {
    pub user_id: i64,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonClientParams {
    pub full_name: String,
    pub identification: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentificationParams {
    pub identification: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NitParams {
    pub nit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyClientParams {
    pub legal_name: String,
    pub nit: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub legal_representative_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccountParams {
    pub owner_id: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountNumberParams {
    pub account_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerParams {
    pub owner_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountStatusParams {
    pub account_number: String,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustBalanceParams {
    pub account_number: String,
    pub delta: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyLoanParams {
    pub applicant_id: String,
    pub loan_type: LoanType,
    pub requested_amount: Decimal,
    pub term_months: u32,
    #[serde(default)]
    pub disbursement_account: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveLoanParams {
    pub loan_id: i64,
    pub approved_amount: Decimal,
    pub interest_rate: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectLoanParams {
    pub loan_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisburseLoanParams {
    pub loan_id: i64,
    pub destination_account: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoanIdParams {
    pub loan_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicantParams {
    pub applicant_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransferParams {
    pub source_account: String,
    pub destination_account: String,
    pub amount: Decimal,
    #[serde(default)]
    pub is_corporate: bool,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferIdParams {
    pub transfer_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectTransferParams {
    pub transfer_id: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatorParams {
    pub creator_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListParams {
    #[serde(default)]
    pub category: Option<ProductCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditParams {
    #[serde(default)]
    pub product_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let request: RpcRequest = serde_json::from_str(r#"{"method":"users.list"}"#).unwrap();
        assert!(request.id.is_none());
        assert!(request.caller.is_none());
        assert!(request.params.is_null());
    }

    #[test]
    fn test_response_shape() {
        let ok = RpcResponse::success("1".to_string(), json!({"count": 2}));
        let raw = serde_json::to_value(&ok).unwrap();
        assert_eq!(raw, json!({"id": "1", "ok": true, "result": {"count": 2}}));

        let failed = RpcResponse::failure(
            "2".to_string(),
            RpcError::new(ErrorKind::InsufficientFunds, "not enough"),
        );
        let raw = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            raw,
            json!({
                "id": "2",
                "ok": false,
                "error": {"kind": "insufficient_funds", "message": "not enough"}
            })
        );
    }

    #[test]
    fn test_enum_params() {
        let params: OpenAccountParams = serde_json::from_value(json!({
            "owner_id": "CC-1001",
            "account_type": "corporate",
        }))
        .unwrap();
        assert_eq!(params.account_type, AccountType::Corporate);
        assert_eq!(params.currency, Currency::Cop);

        let bad = serde_json::from_value::<OpenAccountParams>(json!({
            "owner_id": "CC-1001",
            "account_type": "offshore",
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_amounts_are_strings() {
        let params: CreateTransferParams = serde_json::from_value(json!({
            "source_account": "1",
            "destination_account": "2",
            "amount": "5000000.01",
        }))
        .unwrap();
        assert_eq!(params.amount.to_string(), "5000000.01");
        assert!(!params.is_corporate);
    }
}
