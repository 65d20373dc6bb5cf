//! Persistence of harvested records.
//!
//! The pipeline talks to storage only through [`RecordStore`], which keeps
//! the extraction logic independent of the backing technology.
//!
//! # Submodules
//!
//! - [`jsonl`]: append-only JSON-lines file, the store used by the binary
//! - `memory`: in-memory store for tests
//!
//! # Consistency
//!
//! A store must answer [`RecordStore::find_existing_hrefs`] with every record
//! previously accepted by [`RecordStore::create`] in the same process. The
//! deduplication of repeated runs depends on it.

use crate::models::NewsRecord;
use std::collections::HashSet;
use thiserror::Error;

pub mod jsonl;
#[cfg(test)]
pub mod memory;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("record store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("corrupt record on line {line} of {path}: {source}")]
    Corrupt {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("record for {sub} already stored: {href}")]
    Duplicate { sub: String, href: String },
}

/// Durable storage of [`NewsRecord`]s, keyed by `(sub, href)`.
pub trait RecordStore {
    /// The subset of `candidates` already stored for source `sub`.
    async fn find_existing_hrefs(
        &self,
        sub: &str,
        candidates: &[String],
    ) -> Result<HashSet<String>, PersistenceError>;

    /// Persist a new record. Fails with [`PersistenceError::Duplicate`] if
    /// `(sub, href)` is already stored.
    async fn create(&self, record: &NewsRecord) -> Result<(), PersistenceError>;
}
