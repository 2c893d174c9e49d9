//! JSON file record store
//!
//! The whole store is one pretty-printed JSON array. Every read loads the full
//! file; every append rewrites it. Appends within this process go through a
//! single writer lock, so two submissions finishing together cannot drop each
//! other's record. Separate processes sharing the file are not coordinated.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{distinct_classes, Record, RecordFilter};
use crate::Result;

/// Append-only store backed by a single JSON file
pub struct RecordStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and also reported as empty.
    pub async fn load(&self) -> Vec<Record> {
        match self.try_load().await {
            Ok(records) => records,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to read record store");
                Vec::new()
            }
        }
    }

    async fn try_load(&self) -> Result<Vec<Record>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Record store does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let records: Vec<Record> = serde_json::from_slice(&bytes)?;
        debug!(count = records.len(), "Loaded records");
        Ok(records)
    }

    /// Records matching `filter`, in insertion order
    pub async fn filter(&self, filter: &RecordFilter) -> Vec<Record> {
        let records: Vec<Record> = self
            .load()
            .await
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();

        debug!(
            class_name = ?filter.class_name,
            date = ?filter.date,
            matched = records.len(),
            "Filtered records"
        );
        records
    }

    /// Sorted distinct non-empty class names across all records
    pub async fn distinct_classes(&self) -> Vec<String> {
        distinct_classes(&self.load().await)
    }

    /// Append one record and rewrite the file
    pub async fn append(&self, record: Record) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load().await;
        let id = record.id.clone();
        records.push(record);
        self.write_all(&records).await?;

        info!(record_id = %id, total = records.len(), "Record saved");
        Ok(())
    }

    /// Replace the file contents with `records`
    pub async fn save(&self, records: &[Record]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_all(records).await
    }

    /// Write via temp file + rename so readers never see a half-written array
    async fn write_all(&self, records: &[Record]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}
