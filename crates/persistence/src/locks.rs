//! Row locks
//!
//! Khóa theo từng dòng (account, transfer, loan) trong process. Các thao tác
//! trên cùng một dòng được tuần tự hóa; thao tác trên các dòng khác nhau chạy
//! độc lập. Keys luôn được sort + dedup trước khi lấy để tránh deadlock.

use crate::error::{PersistenceError, PersistenceResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Dòng dữ liệu cần khóa
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Account(String),
    Transfer(i64),
    Loan(i64),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Account(number) => write!(f, "account {}", number),
            LockKey::Transfer(id) => write!(f, "transfer {}", id),
            LockKey::Loan(id) => write!(f, "loan {}", id),
        }
    }
}

type LockTable = HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>;

/// Bảng row lock dùng chung cho một store
#[derive(Debug)]
pub struct RowLocks {
    table: Mutex<LockTable>,
    timeout: Duration,
}

impl RowLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        // Bảng chỉ chứa các Arc, không có invariant nào bị phá khi poisoned
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prune(&self, key: &LockKey) {
        let mut table = self.table();
        if table.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
            table.remove(key);
        }
    }

    /// Số key đang được theo dõi
    pub fn tracked(&self) -> usize {
        self.table().len()
    }

    /// Lấy tất cả các khóa theo thứ tự; mỗi khóa chờ tối đa `timeout`.
    pub async fn acquire(
        self: &Arc<Self>,
        mut keys: Vec<LockKey>,
    ) -> PersistenceResult<RowLockGuard> {
        keys.sort();
        keys.dedup();

        let mut guard = RowLockGuard {
            held: Vec::with_capacity(keys.len()),
            locks: Arc::clone(self),
        };

        for key in keys {
            let mutex = Arc::clone(self.table().entry(key.clone()).or_default());
            match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
                Ok(held) => {
                    debug!(%key, "row lock acquired");
                    guard.held.push((key, held));
                }
                Err(_) => {
                    self.prune(&key);
                    return Err(PersistenceError::LockTimeout {
                        key: key.to_string(),
                        waited_ms: self.timeout.as_millis() as u64,
                    });
                }
            }
        }

        Ok(guard)
    }
}

/// Giữ các row lock cho tới khi bị drop
pub struct RowLockGuard {
    held: Vec<(LockKey, OwnedMutexGuard<()>)>,
    locks: Arc<RowLocks>,
}

impl RowLockGuard {
    pub fn keys(&self) -> impl Iterator<Item = &LockKey> {
        self.held.iter().map(|(key, _)| key)
    }

    pub fn holds(&self, key: &LockKey) -> bool {
        self.keys().any(|k| k == key)
    }
}

impl fmt::Debug for RowLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

impl Drop for RowLockGuard {
    fn drop(&mut self) {
        let released: Vec<LockKey> = self
            .held
            .drain(..)
            .map(|(key, held)| {
                drop(held);
                key
            })
            .collect();
        for key in &released {
            self.locks.prune(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locks(ms: u64) -> Arc<RowLocks> {
        Arc::new(RowLocks::new(Duration::from_millis(ms)))
    }

    #[tokio::test]
    async fn test_keys_sorted_and_deduplicated() {
        let locks = locks(100);
        let guard = locks
            .acquire(vec![
                LockKey::Transfer(3),
                LockKey::Account("0000000002".to_string()),
                LockKey::Account("0000000001".to_string()),
                LockKey::Account("0000000002".to_string()),
            ])
            .await
            .unwrap();

        let keys: Vec<_> = guard.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                LockKey::Account("0000000001".to_string()),
                LockKey::Account("0000000002".to_string()),
                LockKey::Transfer(3),
            ]
        );
        assert_eq!(locks.tracked(), 3);

        drop(guard);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_same_key_times_out() {
        let locks = locks(50);
        let _held = locks.acquire(vec![LockKey::Loan(1)]).await.unwrap();

        let err = locks.acquire(vec![LockKey::Loan(1)]).await.unwrap_err();
        assert!(matches!(err, PersistenceError::LockTimeout { .. }));
        assert!(err.is_contention());
    }

    #[tokio::test]
    async fn test_different_keys_independent() {
        let locks = locks(50);
        let _a = locks.acquire(vec![LockKey::Loan(1)]).await.unwrap();
        let b = locks.acquire(vec![LockKey::Loan(2)]).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_partial_acquisition_released_on_timeout() {
        let locks = locks(50);
        let held = locks.acquire(vec![LockKey::Transfer(9)]).await.unwrap();

        let err = locks
            .acquire(vec![
                LockKey::Transfer(9),
                LockKey::Account("0000000001".to_string()),
            ])
            .await;
        assert!(err.is_err());

        // The account lock was released when the failed acquisition unwound
        let again = locks
            .acquire(vec![LockKey::Account("0000000001".to_string())])
            .await;
        assert!(again.is_ok());
        drop(held);
    }
}
