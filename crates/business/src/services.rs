//! Service context shared by every engine
//!
//! Engines are stateless: each operation re-reads what it needs through
//! the store held here.

use crate::clock::{Clock, SystemClock};
use crate::credentials::{CredentialVerifier, Sha256Verifier};
use crate::error::{BankError, BankResult};
use banco_core::{Actor, TransferPolicy};
use banco_persistence::{LedgerStore, LockKey, UnitOfWork};
use std::sync::Arc;
use tracing::debug;

/// Context for business operations - store, clock, policy, credentials
#[derive(Clone)]
pub struct ServiceContext {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    policy: TransferPolicy,
    verifier: Arc<dyn CredentialVerifier>,
}

impl ServiceContext {
    /// Create context over a store with the wall clock and default policy
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy: TransferPolicy::default(),
            verifier: Arc::new(Sha256Verifier),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: TransferPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    pub fn verifier(&self) -> &dyn CredentialVerifier {
        self.verifier.as_ref()
    }

    /// Open a unit of work holding `locks`
    pub async fn begin(&self, locks: Vec<LockKey>) -> BankResult<Box<dyn UnitOfWork>> {
        debug!(locks = ?locks, "Opening unit of work");
        Ok(self.store.begin(locks).await?)
    }

    /// Open a read-only unit of work (no row locks)
    pub async fn read(&self) -> BankResult<Box<dyn UnitOfWork>> {
        Ok(self.store.begin(Vec::new()).await?)
    }
}

/// User id behind an actor; the system actor cannot originate user work
pub(crate) fn require_user(actor: &Actor) -> BankResult<i64> {
    actor
        .user_id()
        .ok_or_else(|| BankError::invalid_state("Operation requires a user actor"))
}
