//! Storage traits for pluggable storage implementations

// Re-export the storage traits from types crate
pub use broker_types::storage::{
	AssignmentStorageTrait as AssignmentStorage, JobStorageTrait as JobStorage,
	ResultStorageTrait as ResultStorage, StorageError, StorageResult, StorageStats,
	StorageTrait as Storage,
};
