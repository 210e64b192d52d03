//! In-memory index store, used by tests and dry validation runs.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{ChunkRecord, FileMetadata};
use crate::traits::IndexStore;

#[derive(Default)]
pub struct MemoryIndexStore {
    records: RwLock<Vec<ChunkRecord>>,
    /// Metadata snapshot per path, refreshed on upsert.
    files: RwLock<HashMap<String, FileMetadata>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn records(&self) -> Vec<ChunkRecord> {
        self.records.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn records_for(&self, path: &str) -> Vec<ChunkRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.source_path == path)
            .collect()
    }

    /// Seed the metadata listing directly, as if a previous run indexed
    /// these files.
    pub fn seed_files(&self, files: Vec<FileMetadata>) {
        let mut map = self.files.write().unwrap_or_else(|e| e.into_inner());
        for file in files {
            map.insert(file.path.clone(), file);
        }
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn list_indexed(&self) -> Result<Vec<FileMetadata>> {
        let map = self.files.read().unwrap_or_else(|e| e.into_inner());
        let mut files: Vec<FileMetadata> = map.values().cloned().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut store = self.records.write().unwrap_or_else(|e| e.into_inner());
        store.extend_from_slice(records);

        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        for record in records {
            files.insert(
                record.source_path.clone(),
                FileMetadata {
                    path: record.source_path.clone(),
                    file_name: record.file_name.clone(),
                    change_token: record.change_token.clone(),
                    file_type: record.file_type,
                    last_modified: Default::default(),
                },
            );
        }
        Ok(())
    }

    async fn delete_by_path(&self, path: &str) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|r| r.source_path != path);
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path);
        Ok(())
    }

    async fn delete_stale(&self, path: &str, keep_token: &str) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|r| r.source_path != path || r.change_token == keep_token);
        Ok(())
    }
}
