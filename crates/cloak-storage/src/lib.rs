//! Storage backends for short-link records.
//!
//! All three variants implement [`Repository`] with identical semantics;
//! which one to use is a deployment decision.

pub mod memory;
pub mod postgres;
pub mod snapshot;

pub use cloak_core::{ReadRepository, Repository, StorageError, UrlRecord};
pub use memory::InMemoryRepository;
pub use postgres::{PostgresOptions, PostgresRepository};
pub use snapshot::FileSnapshotRepository;
