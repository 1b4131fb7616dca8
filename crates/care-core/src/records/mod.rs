use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use thiserror::Error;
use tracing::info;

use crate::models::PatientRecord;

mod sqlite;

pub use sqlite::SqliteRecordStore;

pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<PatientRecord>, RecordStoreError>> + Send + 'a>>;
pub type NamesFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<String>, RecordStoreError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to read patient records: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed patient-record lookup. `lookup` is trimmed and case-insensitive; `Ok(None)`
/// is a plain miss.
pub trait RecordStore: Send + Sync {
    fn lookup<'a>(&'a self, name: &'a str) -> LookupFuture<'a>;

    /// Known patient names in the store's listing order.
    fn list_names(&self) -> NamesFuture<'_>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Vec<PatientRecord>,
}

impl InMemoryRecordStore {
    pub fn from_records(records: Vec<PatientRecord>) -> Self {
        Self { records }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RecordStoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let records = serde_json::from_str::<Vec<PatientRecord>>(&raw)
            .map_err(|err| RecordStoreError::InvalidData(err.to_string()))?;
        let store = Self::from_records(records);
        info!(
            path = %path.display(),
            records = store.len(),
            "loaded patient records"
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn find(&self, name: &str) -> Option<PatientRecord> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.records
            .iter()
            .find(|record| record.patient_name.trim().to_lowercase() == needle)
            .cloned()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn lookup<'a>(&'a self, name: &'a str) -> LookupFuture<'a> {
        Box::pin(async move { Ok(self.find(name)) })
    }

    fn list_names(&self) -> NamesFuture<'_> {
        Box::pin(async move {
            Ok(self
                .records
                .iter()
                .map(|record| record.patient_name.clone())
                .collect())
        })
    }
}
