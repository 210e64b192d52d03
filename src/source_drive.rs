//! Remote drive source store.
//!
//! Talks to a Graph-style drive API: folders are scanned recursively
//! through `/children` listings (following `@odata.nextLink` pages), and
//! each file's `eTag` serves as its change token. When the `production`
//! flag is set, folders whose name contains the staging marker are skipped
//! so staging content never reaches the production index.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::DriveSourceConfig;
use crate::http::{api_key_from_env, build_client, send_with_retry};
use crate::models::{FileMetadata, FileType};
use crate::traits::SourceStore;

pub struct DriveSource {
    client: reqwest::Client,
    base_url: String,
    root_folder: String,
    token: String,
    staging_marker: String,
    production: bool,
}

impl DriveSource {
    /// Retries for drive listing and download requests.
    const MAX_RETRIES: u32 = 3;

    pub fn new(config: &DriveSourceConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            root_folder: config.root_folder.trim_matches('/').to_string(),
            token: api_key_from_env(&config.token_env)?,
            staging_marker: config.staging_marker.clone(),
            production: config.production,
        })
    }

    fn children_url(&self, folder: &str) -> String {
        if folder.is_empty() {
            format!("{}/root/children", self.base_url)
        } else {
            format!("{}/root:/{}:/children", self.base_url, folder)
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let request = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token));
        let response = send_with_retry(request, Self::MAX_RETRIES, "drive").await?;
        Ok(response.json().await?)
    }

    fn skip_folder(&self, name: &str) -> bool {
        self.production && name.contains(&self.staging_marker)
    }
}

fn item_str<'a>(item: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(|v| v.as_str())
}

fn file_metadata(item: &serde_json::Value, folder: &str) -> Option<FileMetadata> {
    let name = item_str(item, "name")?;
    let file_type = name
        .rsplit_once('.')
        .and_then(|(_, ext)| FileType::from_extension(ext))?;

    let path = if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    };

    let last_modified = item_str(item, "lastModifiedDateTime")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();

    Some(FileMetadata {
        path,
        file_name: name.to_string(),
        change_token: item_str(item, "eTag").unwrap_or_default().to_string(),
        file_type,
        last_modified,
    })
}

#[async_trait]
impl SourceStore for DriveSource {
    async fn list_files(&self) -> Result<Vec<FileMetadata>> {
        let mut files = Vec::new();
        let mut folders = vec![self.root_folder.clone()];

        while let Some(folder) = folders.pop() {
            let mut next = Some(self.children_url(&folder));

            while let Some(url) = next.take() {
                let page = self.get_json(&url).await?;
                let items = page
                    .get("value")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| anyhow!("Invalid drive listing: missing value array"))?;

                for item in items {
                    let name = item_str(item, "name").unwrap_or_default();
                    if item.get("folder").is_some() {
                        if self.skip_folder(name) {
                            continue;
                        }
                        folders.push(if folder.is_empty() {
                            name.to_string()
                        } else {
                            format!("{}/{}", folder, name)
                        });
                    } else if let Some(meta) = file_metadata(item, &folder) {
                        files.push(meta);
                    }
                }

                next = item_str(&page, "@odata.nextLink").map(|s| s.to_string());
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/root:/{}:/content", self.base_url, path);
        let request = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token));
        let response = send_with_retry(request, Self::MAX_RETRIES, "drive download").await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_items_map_to_metadata() {
        let item = serde_json::json!({
            "name": "guide.docx",
            "eTag": "\"{AAAA},3\"",
            "file": { "mimeType": "application/vnd.openxmlformats" },
            "lastModifiedDateTime": "2026-03-01T10:00:00Z",
        });
        let meta = file_metadata(&item, "handbook").unwrap();
        assert_eq!(meta.path, "handbook/guide.docx");
        assert_eq!(meta.file_name, "guide.docx");
        assert_eq!(meta.file_type, FileType::WordProcessor);
        assert_eq!(meta.change_token, "\"{AAAA},3\"");
    }

    #[test]
    fn unsupported_extensions_are_ignored() {
        let item = serde_json::json!({
            "name": "archive.tar.gz",
            "eTag": "\"x\"",
            "file": {},
        });
        assert!(file_metadata(&item, "").is_none());
    }

    #[test]
    fn missing_etag_yields_empty_token() {
        // Empty tokens are treated as always-changed by the planner.
        let item = serde_json::json!({ "name": "notes.md", "file": {} });
        let meta = file_metadata(&item, "").unwrap();
        assert_eq!(meta.change_token, "");
    }
}
