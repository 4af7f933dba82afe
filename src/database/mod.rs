//! Order ledger: transaction id → order record
//!
//! Storage sits behind [`order_repository::OrderRepository`]. The process-local
//! [`order_repository::InMemoryOrderRepository`] is what the service runs with;
//! nothing survives a restart.

pub mod error;
pub mod order_repository;

pub use error::{LedgerError, LedgerResult};
pub use order_repository::{
    InMemoryOrderRepository, OrderRecord, OrderRepository, OrderStatus, StatusSource,
};
