//! Persistence for evaluation records.
//!
//! Two backends: an in-memory store for tests and one-off runs, and an
//! append-only JSON lines file.

use crate::error::{BenchError, Result};
use crate::record::{EvaluationRecord, StoredRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// Durable home of evaluation records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record, returning it with its id and timestamps.
    async fn create(&self, record: EvaluationRecord) -> Result<StoredRecord>;

    /// Every stored record, in insertion order.
    async fn find(&self) -> Result<Vec<StoredRecord>>;
}

/// Store that keeps records in process memory.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, record: EvaluationRecord) -> Result<StoredRecord> {
        let stored = StoredRecord::stamp(record);
        self.records.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn find(&self) -> Result<Vec<StoredRecord>> {
        Ok(self.records.read().await.clone())
    }
}

/// Store that appends one JSON object per line to a file.
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordStore for JsonlStore {
    async fn create(&self, record: EvaluationRecord) -> Result<StoredRecord> {
        let stored = StoredRecord::stamp(record);
        let mut line = serde_json::to_string(&stored)
            .map_err(|e| BenchError::Serialization(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| BenchError::io(parent, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| BenchError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| BenchError::io(&self.path, e))?;
        file.flush().await.map_err(|e| BenchError::io(&self.path, e))?;

        Ok(stored)
    }

    async fn find(&self) -> Result<Vec<StoredRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| BenchError::io(&self.path, e))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(line_num, line)| {
                serde_json::from_str(line).map_err(|e| {
                    BenchError::Storage(format!(
                        "Corrupt record at {:?} line {}: {}",
                        self.path,
                        line_num + 1,
                        e
                    ))
                })
            })
            .collect()
    }
}
