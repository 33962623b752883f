//! Audit record persistence

mod storage;

pub use storage::{AuditStore, StorageError, StorageResult};
