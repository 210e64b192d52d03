//! HTTP chunk-index client.
//!
//! REST contract against the vector-capable store:
//!
//! - `GET    {url}/collections/{collection}/files` — one entry per distinct
//!   indexed path with its stored change token
//! - `POST   {url}/collections/{collection}/records` — batch insert of
//!   chunk records (JSON array, embedding in `vector`)
//! - `DELETE {url}/collections/{collection}/records?path=..` — delete all
//!   records under a path; with `&keep_token=..`, delete only records whose
//!   token differs (the stale half of an insert-then-delete update)
//!
//! All calls use the standard retry/backoff policy from [`crate::http`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::http::{build_client, send_with_retry};
use crate::models::{ChunkRecord, FileMetadata, FileType};
use crate::traits::IndexStore;

pub struct HttpIndexStore {
    client: reqwest::Client,
    base: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct IndexedFile {
    path: String,
    file_name: String,
    change_token: String,
    file_type: FileType,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
}

/// Wire form of one chunk record; the embedding travels as `vector`.
#[derive(Serialize)]
struct RecordPayload<'a> {
    #[serde(flatten)]
    record: &'a ChunkRecord,
    vector: &'a [f32],
}

impl HttpIndexStore {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base: format!(
                "{}/collections/{}",
                config.url.trim_end_matches('/'),
                config.collection
            ),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl IndexStore for HttpIndexStore {
    async fn list_indexed(&self) -> Result<Vec<FileMetadata>> {
        let request = self.client.get(format!("{}/files", self.base));
        let response = send_with_retry(request, self.max_retries, "index listing").await?;
        let files: Vec<IndexedFile> = response.json().await?;

        Ok(files
            .into_iter()
            .map(|f| FileMetadata {
                path: f.path,
                file_name: f.file_name,
                change_token: f.change_token,
                file_type: f.file_type,
                last_modified: f.last_modified.unwrap_or_default(),
            })
            .collect())
    }

    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let payload: Vec<RecordPayload> = records
            .iter()
            .map(|r| RecordPayload {
                record: r,
                vector: &r.embedding,
            })
            .collect();

        let request = self
            .client
            .post(format!("{}/records", self.base))
            .json(&payload);
        send_with_retry(request, self.max_retries, "index upsert").await?;
        Ok(())
    }

    async fn delete_by_path(&self, path: &str) -> Result<()> {
        let request = self
            .client
            .delete(format!("{}/records", self.base))
            .query(&[("path", path)]);
        send_with_retry(request, self.max_retries, "index delete").await?;
        Ok(())
    }

    async fn delete_stale(&self, path: &str, keep_token: &str) -> Result<()> {
        let request = self
            .client
            .delete(format!("{}/records", self.base))
            .query(&[("path", path), ("keep_token", keep_token)]);
        send_with_retry(request, self.max_retries, "index delete").await?;
        Ok(())
    }
}
