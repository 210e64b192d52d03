//! Filesystem source store.
//!
//! Walks a local directory tree and exposes every supported file as corpus
//! metadata. The change token is a SHA-256 over the file's length and
//! modification time, so touching a file's content reliably changes its
//! token without hashing the content itself.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::FilesystemSourceConfig;
use crate::models::{FileMetadata, FileType};
use crate::traits::SourceStore;

pub struct FilesystemSource {
    root: PathBuf,
    include_set: GlobSet,
    exclude_set: GlobSet,
    follow_symlinks: bool,
}

impl FilesystemSource {
    pub fn new(config: &FilesystemSourceConfig) -> Result<Self> {
        if !config.root.exists() {
            bail!("Source root does not exist: {}", config.root.display());
        }
        Ok(Self {
            root: config.root.clone(),
            include_set: build_globset(&config.include_globs)?,
            exclude_set: build_globset(&config.exclude_globs)?,
            follow_symlinks: config.follow_symlinks,
        })
    }

    fn file_metadata(&self, path: &Path, relative: &str) -> Result<Option<FileMetadata>> {
        let file_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FileType::from_extension)
        {
            Some(ft) => ft,
            None => return Ok(None),
        };

        let metadata = std::fs::metadata(path)?;
        let modified = metadata
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        let modified_secs = modified
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Some(FileMetadata {
            path: relative.to_string(),
            file_name,
            change_token: change_token(metadata.len(), modified_secs),
            file_type,
            last_modified: timestamp(modified_secs),
        }))
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn change_token(len: u64, modified_secs: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(len.to_le_bytes());
    hasher.update(modified_secs.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[async_trait]
impl SourceStore for FilesystemSource {
    async fn list_files(&self) -> Result<Vec<FileMetadata>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if self.exclude_set.is_match(&rel_str) {
                continue;
            }
            if !self.include_set.is_match(&rel_str) {
                continue;
            }

            if let Some(meta) = self.file_metadata(path, &rel_str)? {
                files.push(meta);
            }
        }

        // Deterministic ordering for plans and reports
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        Ok(std::fs::read(&full)?)
    }
}
