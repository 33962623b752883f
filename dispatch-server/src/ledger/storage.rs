//! redb-based storage for dispatch audit records
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `audit_records` | `(pk, sk)` | `DispatchAuditRecord` | One row per dispatch attempt |
//!
//! Keys sort by partition first, so every record of one order is a
//! contiguous range starting at `(pk, "")`.

use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use serde::Serialize;
use shared::audit::{self, AnnotatedRecord, DispatchAuditRecord, RecordKind};
use thiserror::Error;

/// Audit records: key = (partition key, sort key), value = JSON-serialized record
const AUDIT_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("audit_records");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage task failed: {0}")]
    Task(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Record counts by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub metadata: u64,
}

/// Audit record store backed by redb
#[derive(Clone)]
pub struct AuditStore {
    db: Arc<Database>,
}

impl AuditStore {
    /// Open or create the database at the given path
    ///
    /// redb commits are durable as soon as `commit()` returns, so a record
    /// written before the response is sent survives a crash.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(AUDIT_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    // ========== Point Operations ==========

    /// Insert or overwrite a record under its own `(pk, sk)`
    pub fn put(&self, record: &DispatchAuditRecord) -> StorageResult<()> {
        let bytes = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT_TABLE)?;
            table.insert((record.pk.as_str(), record.sk.as_str()), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Insert only if `(pk, sk)` is free; returns false (and writes nothing) otherwise
    pub fn insert_new(&self, record: &DispatchAuditRecord) -> StorageResult<bool> {
        let bytes = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(AUDIT_TABLE)?;
            let key = (record.pk.as_str(), record.sk.as_str());
            if table.get(key)?.is_some() {
                false
            } else {
                table.insert(key, bytes.as_slice())?;
                true
            }
        };
        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    /// Insert a record, or merge it into the one already under `(pk, sk)`
    ///
    /// The read and the write share one write transaction, so concurrent
    /// writers to the same key see each other's result.
    pub fn upsert(
        &self,
        mut record: DispatchAuditRecord,
        merge: impl FnOnce(&mut DispatchAuditRecord, DispatchAuditRecord),
    ) -> StorageResult<DispatchAuditRecord> {
        let pk = record.pk.clone();
        let sk = record.sk.clone();
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT_TABLE)?;
            let existing: Option<DispatchAuditRecord> = match table.get((pk.as_str(), sk.as_str()))? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            if let Some(existing) = existing {
                merge(&mut record, existing);
            }
            let bytes = serde_json::to_vec(&record)?;
            table.insert((pk.as_str(), sk.as_str()), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(record)
    }

    pub fn get(&self, pk: &str, sk: &str) -> StorageResult<Option<DispatchAuditRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_TABLE)?;
        match table.get((pk, sk))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Delete one record, returning whether it existed
    pub fn delete(&self, pk: &str, sk: &str) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(AUDIT_TABLE)?;
            table.remove((pk, sk))?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// The success record of an order, if it was dispatched
    pub fn get_success(&self, order_id: &str) -> StorageResult<Option<DispatchAuditRecord>> {
        self.get(
            &audit::partition_key(order_id),
            &audit::success_sort_key(order_id),
        )
    }

    // ========== Range Queries ==========

    /// Every record (success, failures, metadata) of one order, in key order
    pub fn records_for_order(&self, order_id: &str) -> StorageResult<Vec<DispatchAuditRecord>> {
        let pk = audit::partition_key(order_id);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_TABLE)?;

        let mut records = Vec::new();
        for result in table.range((pk.as_str(), "")..)? {
            let (key, value) = result?;
            if key.value().0 != pk {
                break;
            }
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// Full scan. Rows that fail to decode are logged and skipped.
    pub fn scan_all(&self) -> StorageResult<Vec<DispatchAuditRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_TABLE)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            match serde_json::from_slice::<DispatchAuditRecord>(value.value()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    let (pk, sk) = key.value();
                    tracing::warn!(pk, sk, error = %e, "Skipping undecodable audit record");
                }
            }
        }
        Ok(records)
    }

    /// Records annotated with their kind, newest first
    ///
    /// `date` matches the stored location-local day exactly.
    pub fn list(&self, date: Option<&str>, limit: Option<usize>) -> StorageResult<Vec<AnnotatedRecord>> {
        let mut records: Vec<_> = self
            .scan_all()?
            .into_iter()
            .filter(|r| date.is_none_or(|d| r.date.as_deref() == Some(d)))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records.into_iter().map(AnnotatedRecord::from).collect())
    }

    pub fn stats(&self) -> StorageResult<AuditStats> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_TABLE)?;

        let mut stats = AuditStats {
            total: table.len()?,
            ..Default::default()
        };
        for result in table.iter()? {
            let (key, _) = result?;
            match RecordKind::from_sort_key(key.value().1) {
                RecordKind::Success => stats.success += 1,
                RecordKind::Error => stats.error += 1,
                RecordKind::Metadata => stats.metadata += 1,
            }
        }
        Ok(stats)
    }
}
