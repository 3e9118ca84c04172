//! # Banco Business
//!
//! Business logic layer - account service, transfer and loan workflows,
//! audit log, users and client registry.
//!
//! Every state-changing operation runs as one unit of work: read, validate,
//! mutate, audit, commit. A failure anywhere discards all of it.

pub mod accounts;
pub mod audit;
pub mod clients;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod loans;
pub mod services;
pub mod transfers;
pub mod users;

pub use accounts::{AccountService, BalanceChange};
pub use audit::{AuditLog, AuditWriter};
pub use clients::{ClientDirectory, ClientService, NewCompanyClient, NewPersonClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{CredentialVerifier, Sha256Verifier};
pub use error::{BankError, BankResult, ErrorKind};
pub use loans::{LoanApplication, LoanService};
pub use services::ServiceContext;
pub use transfers::{TransferRequest, TransferService};
pub use users::{UserRegistration, UserService};
