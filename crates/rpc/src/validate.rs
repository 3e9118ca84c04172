//! Input checks run before any business logic
//!
//! Failures here are always `validation` errors.

use crate::protocol::RpcError;
use banco_core::{validate_rate, validate_scale, ProductRef};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Minimum length of owner and applicant identifications
pub const MIN_IDENTIFICATION_LEN: usize = 3;
/// Minimum length of a loan rejection reason
pub const MIN_REASON_LEN: usize = 5;

pub type ValidationResult<T> = Result<T, RpcError>;

/// Decode method params; missing params count as `{}`
pub fn params<T: DeserializeOwned>(method: &str, raw: Value) -> ValidationResult<T> {
    let raw = if raw.is_null() {
        Value::Object(Default::default())
    } else {
        raw
    };
    serde_json::from_value(raw)
        .map_err(|e| RpcError::validation(format!("invalid params for {}: {}", method, e)))
}

/// Positive, at most two decimal places
pub fn amount(field: &str, value: Decimal) -> ValidationResult<Decimal> {
    validate_scale(field, value).map_err(|e| RpcError::validation(e.to_string()))
}

/// Non-zero, at most two decimal places
pub fn delta(field: &str, value: Decimal) -> ValidationResult<Decimal> {
    if value.is_zero() {
        return Err(RpcError::validation(format!("{} must not be zero", field)));
    }
    amount(field, value.abs()).map(|_| value)
}

/// Positive, at most two decimal places, below 1000 (DECIMAL(5,2))
pub fn positive_rate(field: &str, value: Decimal) -> ValidationResult<Decimal> {
    validate_rate(field, value).map_err(|e| RpcError::validation(e.to_string()))
}

pub fn term(months: u32) -> ValidationResult<u32> {
    if months == 0 {
        return Err(RpcError::validation("term_months must be at least 1"));
    }
    Ok(months)
}

pub fn min_len<'a>(field: &str, value: &'a str, min: usize) -> ValidationResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.chars().count() < min {
        return Err(RpcError::validation(format!(
            "{} must have at least {} characters",
            field, min
        )));
    }
    Ok(trimmed)
}

pub fn identification<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    min_len(field, value, MIN_IDENTIFICATION_LEN)
}

pub fn non_empty<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    min_len(field, value, 1)
}

/// `<kind>:<id>` audit product reference
pub fn product(field: &str, value: &str) -> ValidationResult<ProductRef> {
    ProductRef::parse(value).ok_or_else(|| {
        RpcError::validation(format!(
            "{} must look like account:<number>, loan:<id>, transfer:<id> or user:<id>",
            field
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CreateTransferParams;
    use banco_business::ErrorKind;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_amount() {
        assert_eq!(amount("amount", dec!(10.25)).unwrap(), dec!(10.25));
        assert_eq!(amount("amount", dec!(10.2500)).unwrap(), dec!(10.2500));
        assert_eq!(amount("amount", dec!(0)).unwrap_err().kind, ErrorKind::Validation);
        assert!(amount("amount", dec!(-3)).is_err());
        assert!(amount("amount", dec!(1.001)).is_err());
    }

    #[test]
    fn test_amount_limits() {
        assert!(amount("amount", dec!(9999999999999.99)).is_ok());
        assert!(amount("amount", dec!(10000000000000.00)).is_err());
        assert!(delta("delta", dec!(-79228162514264337593543950335)).is_err());
        assert_eq!(positive_rate("interest_rate", dec!(14.5)).unwrap(), dec!(14.5));
        assert!(positive_rate("interest_rate", dec!(1000)).is_err());
        assert!(positive_rate("interest_rate", dec!(-1)).is_err());
    }

    #[test]
    fn test_delta() {
        assert_eq!(delta("delta", dec!(-40.5)).unwrap(), dec!(-40.5));
        assert!(delta("delta", dec!(0)).is_err());
        assert!(delta("delta", dec!(-0.001)).is_err());
    }

    #[test]
    fn test_min_len_trims() {
        assert_eq!(min_len("reason", "  fraud  ", 5).unwrap(), "fraud");
        assert!(min_len("reason", "   no   ", 5).is_err());
        assert!(identification("owner_id", "ab").is_err());
    }

    #[test]
    fn test_product() {
        assert_eq!(product("product_id", "transfer:4").unwrap(), ProductRef::Transfer(4));
        assert_eq!(
            product("product_id", "4").unwrap_err().kind,
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_params_decoding() {
        let err = params::<CreateTransferParams>("transfers.create", Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("transfers.create"));

        let ok: CreateTransferParams = params(
            "transfers.create",
            json!({"source_account": "1", "destination_account": "2", "amount": "1.5"}),
        )
        .unwrap();
        assert_eq!(ok.amount, dec!(1.5));
    }
}
