//! # Banco Persistence
//!
//! Ledger store cho Banco: nguồn dữ liệu duy nhất cho users, clients,
//! accounts, loans, transfers và audit log.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        LedgerStore                            │
//! │  begin(locks) ──▶ RowLocks (sorted) ──▶ Box<dyn UnitOfWork>   │
//! │                                                               │
//! │  ┌──────────────────────┐        ┌──────────────────────────┐ │
//! │  │     SqliteStore      │        │      InMemoryStore       │ │
//! │  │ (sqlx transaction)   │        │  (overlay + commit)      │ │
//! │  └──────────────────────┘        └──────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use banco_persistence::{LedgerStore, LockKey, SqliteStore, StoreConfig};
//!
//! let store = SqliteStore::open(&StoreConfig::new("sqlite:banco.db")).await?;
//!
//! let mut uow = store.begin(vec![LockKey::Account(number.clone())]).await?;
//! let account = uow.account(&number).await?;
//! uow.update_account_balance(&number, new_balance).await?;
//! uow.append_audit(&entry).await?;
//! uow.commit().await?;
//! ```

pub mod config;
pub mod error;
pub mod locks;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use config::{StoreConfig, DEFAULT_DATABASE_URL};
pub use error::{PersistenceError, PersistenceResult};
pub use locks::{LockKey, RowLockGuard, RowLocks};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use store::{LedgerStore, UnitOfWork};
