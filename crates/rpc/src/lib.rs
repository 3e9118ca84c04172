//! # Banco RPC
//!
//! JSON request/response interface over the business services: one method
//! per operation, input validation, caller and role checks.

pub mod context;
pub mod dispatch;
pub mod protocol;
pub mod validate;

pub use dispatch::Dispatcher;
pub use protocol::{RpcError, RpcRequest, RpcResponse};
