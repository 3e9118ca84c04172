//! # Persistence Errors
//!
//! Error types cho persistence layer, wrapping sqlx và lỗi chuyển đổi dữ liệu.

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    // === Concurrency errors ===
    #[error("Timed out after {waited_ms} ms waiting for lock on {key}")]
    LockTimeout { key: String, waited_ms: u64 },

    /// Compare-and-set thất bại lúc commit (in-memory store)
    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: String, id: String },

    #[error("Unit of work already committed")]
    Closed,

    // === Conversion errors ===
    #[error("Invalid decimal value: {0}")]
    InvalidDecimal(String),

    #[error("Invalid enum value: {field} = {value}")]
    InvalidEnumValue { field: String, value: String },

    #[error("Invalid audit detail: {0}")]
    InvalidDetail(#[from] serde_json::Error),

    // === Configuration errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias cho PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    /// Tạo NotFound error
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Tạo AlreadyExists error
    pub fn already_exists(entity: &str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_enum(field: &str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Chuyển lỗi unique constraint của SQLite thành AlreadyExists
    pub fn from_insert(err: sqlx::Error, entity: &str, id: impl ToString) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::already_exists(entity, id)
            }
            _ => Self::Database(err),
        }
    }

    /// Kiểm tra có phải lỗi not found không
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Lỗi do tranh chấp đồng thời (có thể thử lại)
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Conflict { .. })
    }
}
