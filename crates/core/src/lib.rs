//! # Banco Core
//!
//! Domain types cho Banco: tài khoản, khoản vay, chuyển khoản, người dùng
//! và nhật ký kiểm toán. Các state machine ở đây là thuần (pure): không
//! truy cập storage, không đọc đồng hồ hệ thống.

pub mod account;
pub mod audit;
pub mod client;
pub mod error;
pub mod loan;
pub mod money;
pub mod product;
pub mod transfer;
pub mod user;

pub use account::{Account, AccountStatus, AccountType};
pub use audit::{Actor, AuditDetail, AuditEntry, OperationType, ProductRef};
pub use client::{CompanyClient, PersonClient};
pub use error::{CoreError, CoreResult};
pub use loan::{Loan, LoanStatus, LoanType};
pub use money::{
    max_amount, max_rate, validate_rate, validate_scale, Currency, MONEY_PRECISION, MONEY_SCALE,
    RATE_PRECISION,
};
pub use product::{BankProduct, ProductCategory};
pub use transfer::{
    PendingFunds, Transfer, TransferPolicy, TransferStatus, APPROVAL_THRESHOLD_UNITS,
    EXPIRY_WINDOW_MS,
};
pub use user::{BankUser, UserRole, UserStatus};
