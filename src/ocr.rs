//! Remote structure extraction for PDFs.
//!
//! The extraction service accepts raw PDF bytes and returns the document
//! rendered as markdown, with [`PAGE_BREAK_MARKER`] between pages. The
//! marker is consumed by [`crate::parser_pdf`], which turns it into page
//! offsets and strips it from the canonical text.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::config::ServiceEndpoint;
use crate::http::{api_key_from_env, build_client, send_with_retry};
use crate::traits::StructureExtractor;

/// Page boundary marker emitted by the extraction service.
pub const PAGE_BREAK_MARKER: &str = "<!-- PageBreak -->";

/// HTTP client for the structure-extraction service.
///
/// `POST {url}` with `application/pdf` body; the response is JSON with a
/// `markdown` field.
pub struct RemoteExtractor {
    client: reqwest::Client,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl RemoteExtractor {
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self> {
        if endpoint.url.is_empty() {
            anyhow::bail!("services.ocr.url must be set for the remote PDF parser");
        }
        Ok(Self {
            client: build_client(endpoint.timeout_secs)?,
            url: endpoint.url.clone(),
            api_key: api_key_from_env(&endpoint.api_key_env)?,
            max_retries: endpoint.max_retries,
        })
    }
}

#[async_trait]
impl StructureExtractor for RemoteExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<String> {
        let request = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/pdf")
            .body(bytes.to_vec());

        let response = send_with_retry(request, self.max_retries, "structure extraction").await?;
        let json: serde_json::Value = response.json().await?;

        json.get("markdown")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Invalid extraction response: missing markdown field"))
    }
}
