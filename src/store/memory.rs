//! In-memory [`RecordStore`] for pipeline tests.

use std::collections::HashSet;
use std::sync::Mutex;

use super::{PersistenceError, RecordStore};
use crate::models::NewsRecord;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<NewsRecord>>,
    /// Reject the create call with this zero-based index.
    fail_on_create: Option<usize>,
    creates: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `nth` create call fails with an I/O error.
    pub fn failing_on(nth: usize) -> Self {
        Self {
            fail_on_create: Some(nth),
            ..Self::default()
        }
    }

    pub fn with_records(records: Vec<NewsRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<NewsRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordStore for MemoryStore {
    async fn find_existing_hrefs(
        &self,
        sub: &str,
        candidates: &[String],
    ) -> Result<HashSet<String>, PersistenceError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.sub == sub && candidates.contains(&r.href))
            .map(|r| r.href.clone())
            .collect())
    }

    async fn create(&self, record: &NewsRecord) -> Result<(), PersistenceError> {
        let call = {
            let mut creates = self.creates.lock().unwrap();
            *creates += 1;
            *creates - 1
        };
        if self.fail_on_create == Some(call) {
            return Err(std::io::Error::other("store unavailable").into());
        }

        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.sub == record.sub && r.href == record.href)
        {
            return Err(PersistenceError::Duplicate {
                sub: record.sub.clone(),
                href: record.href.clone(),
            });
        }
        records.push(record.clone());
        Ok(())
    }
}
