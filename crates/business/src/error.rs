//! Business layer errors
//!
//! `BankError` is the error surface of every workflow operation. Each
//! variant maps to one [`ErrorKind`] reported to callers.

use banco_core::CoreError;
use banco_persistence::PersistenceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Business operation errors
#[derive(Debug, Error)]
pub enum BankError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Transfer {transfer_id} has expired without approval")]
    Expired { transfer_id: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[source] PersistenceError),
}

/// Result type alias for business operations
pub type BankResult<T> = Result<T, BankError>;

/// Error class reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientFunds,
    Expired,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Expired => "expired",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl BankError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BankError::NotFound { .. } => ErrorKind::NotFound,
            BankError::InvalidState(_) => ErrorKind::InvalidState,
            BankError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            BankError::Expired { .. } => ErrorKind::Expired,
            BankError::Validation(_) => ErrorKind::Validation,
            BankError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<CoreError> for BankError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientFunds { needed, available } => Self::InsufficientFunds {
                required: needed,
                available,
            },
            CoreError::InvalidAmount(msg) | CoreError::ValidationError(msg) => {
                Self::Validation(msg)
            }
            err @ (CoreError::InvalidTransition { .. } | CoreError::CorruptState { .. }) => {
                Self::InvalidState(err.to_string())
            }
        }
    }
}

impl From<PersistenceError> for BankError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity, id } => Self::NotFound { entity, id },
            PersistenceError::AlreadyExists { entity, id } => {
                Self::InvalidState(format!("{} already exists: {}", entity, id))
            }
            PersistenceError::Conflict { entity, id } => Self::InvalidState(format!(
                "{} {} was modified concurrently",
                entity, id
            )),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_core_errors_map_to_kinds() {
        let err: BankError = CoreError::InsufficientFunds {
            needed: dec!(100),
            available: dec!(50),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert!(err.to_string().contains("required 100"));

        let err: BankError =
            CoreError::invalid_transition("loan", 1, "approved", "approved").into();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err: BankError = CoreError::InvalidAmount("zero".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_persistence_errors_map_to_kinds() {
        let err: BankError = PersistenceError::already_exists("User", "1020").into();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err: BankError = PersistenceError::not_found("Account", "0000000001").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: BankError = PersistenceError::LockTimeout {
            key: "account 1".to_string(),
            waited_ms: 5000,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.kind().as_str(), "internal");
    }
}
