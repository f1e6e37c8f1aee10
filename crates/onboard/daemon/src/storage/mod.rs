//! Storage layer for onboard-daemon
//!
//! Persists supplier records; every state transition is committed on its own.

mod memory;
mod postgres;
mod traits;

pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use traits::SupplierStorage;
