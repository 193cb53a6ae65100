//! Broker Storage
//!
//! Storage backends for the job broker.
//! `MemoryStore` is always available; `PostgresStore` is built with the
//! `postgres` feature.

pub mod memory_store;
pub mod traits;

#[cfg(feature = "postgres")]
pub mod postgres_store;

pub use memory_store::MemoryStore;
pub use traits::{
	AssignmentStorage, JobStorage, ResultStorage, Storage, StorageError, StorageResult,
	StorageStats,
};

#[cfg(feature = "postgres")]
pub use postgres_store::{PostgresConfig, PostgresStore};
