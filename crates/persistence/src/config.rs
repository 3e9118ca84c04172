//! Store configuration

use std::time::Duration;

/// Default database URL
pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/banco.db";

/// Cấu hình kết nối và khóa của ledger store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    /// Số connection tối đa trong pool. Mặc định 1: pool tuần tự hóa các
    /// transaction ghi của SQLite.
    pub max_connections: u32,
    /// Thời gian chờ tối đa cho mỗi row lock
    pub lock_timeout: Duration,
    /// Thời gian chờ tối đa để lấy connection từ pool
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 1,
            lock_timeout: Duration::from_millis(5_000),
            acquire_timeout: Duration::from_millis(5_000),
        }
    }
}

impl StoreConfig {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            ..Self::default()
        }
    }

    /// SQLite in-memory database (dùng cho test)
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}
