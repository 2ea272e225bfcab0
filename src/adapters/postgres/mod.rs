//! PostgreSQL adapters.

mod store;

pub use store::PostgresStore;
