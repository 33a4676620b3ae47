//! Snow summary persistence
//!
//! Two backends behind one trait:
//! - [`RedbSummaryStore`]: single redb file, values are JSON-encoded summaries
//! - [`MemorySummaryStore`]: `DashMap`-backed, for tests and dry runs

use crate::models::{SnowSummary, SummaryKey};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

// redb table definition
const SUMMARIES_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("snow_summaries");

/// Errors raised by a summary backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open summary database: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("summary transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("summary table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("summary storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("failed to commit summary: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("failed to encode summary: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("failed to create store directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("summary store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence for [`SnowSummary`], keyed by location and elevation
pub trait SummaryStore: Send + Sync {
    /// Stored summary, if any
    fn get(&self, key: &SummaryKey) -> Result<Option<SnowSummary>, StoreError>;

    fn put(&self, key: &SummaryKey, summary: &SnowSummary) -> Result<(), StoreError>;

    /// All stored summaries, ordered by key
    fn list(&self) -> Result<Vec<(String, SnowSummary)>, StoreError>;

    /// Stored summary, or a fresh one (written back) on first access
    fn get_or_create(&self, key: &SummaryKey, now: DateTime<Utc>) -> Result<SnowSummary, StoreError> {
        if let Some(summary) = self.get(key)? {
            return Ok(summary);
        }
        let summary = SnowSummary::new(now);
        self.put(key, &summary)?;
        debug!("Created snow summary for {}", key);
        Ok(summary)
    }

    /// Apply the manual season reset and persist it
    fn reset_season(&self, key: &SummaryKey, now: DateTime<Utc>) -> Result<SnowSummary, StoreError> {
        let prev = self.get_or_create(key, now)?;
        let reset = super::reset_season(&prev, now);
        self.put(key, &reset)?;
        Ok(reset)
    }
}

/// redb-backed store
pub struct RedbSummaryStore {
    db: redb::Database,
    path: PathBuf,
}

impl RedbSummaryStore {
    /// Open or create the database file at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = redb::Database::create(path)?;
        debug!("Opened summary store at {}", path.display());
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SummaryStore for RedbSummaryStore {
    fn get(&self, key: &SummaryKey) -> Result<Option<SnowSummary>, StoreError> {
        let read_txn = self.db.begin_read()?;

        // Fresh database: the table is created on first write
        let table = match read_txn.open_table(SUMMARIES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let encoded = key.encode();
        match table.get(encoded.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &SummaryKey, summary: &SnowSummary) -> Result<(), StoreError> {
        let value = serde_json::to_vec(summary)?;
        let encoded = key.encode();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SUMMARIES_TABLE)?;
            table.insert(encoded.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<(String, SnowSummary)>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(SUMMARIES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for item in table.range::<&str>(..)? {
            let (key, value) = item?;
            let summary: SnowSummary = serde_json::from_slice(value.value())?;
            out.push((key.value().to_string(), summary));
        }
        Ok(out)
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemorySummaryStore {
    entries: DashMap<String, SnowSummary>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SummaryStore for MemorySummaryStore {
    fn get(&self, key: &SummaryKey) -> Result<Option<SnowSummary>, StoreError> {
        Ok(self.entries.get(&key.encode()).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &SummaryKey, summary: &SnowSummary) -> Result<(), StoreError> {
        self.entries.insert(key.encode(), summary.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<(String, SnowSummary)>, StoreError> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn get_or_create(&self, key: &SummaryKey, now: DateTime<Utc>) -> Result<SnowSummary, StoreError> {
        Ok(self
            .entries
            .entry(key.encode())
            .or_insert_with(|| SnowSummary::new(now))
            .value()
            .clone())
    }
}
