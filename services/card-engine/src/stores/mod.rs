//! Relational stores
//!
//! Two bindings for the store contracts in `card-core`: Postgres for
//! deployments and an in-memory one for tests and adapterless
//! development. Both enforce the same unique keys; the memory store does
//! it at commit time the way the database constraints would.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStores;
