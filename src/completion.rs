//! OpenAI-style chat completion client.
//!
//! One client backs both capabilities: plain completions (summaries,
//! rewrites, keywords) and image description via a base64 data URL in an
//! `image_url` content part.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;

use crate::config::ServiceEndpoint;
use crate::http::{api_key_from_env, build_client, send_with_retry};
use crate::traits::{CompletionService, ImageDescriber};

const IMAGE_PROMPT: &str = "Describe the content of this image in two or three sentences. \
    If it contains a chart or diagram, state what it shows.";

pub struct ChatClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    max_retries: u32,
}

impl ChatClient {
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self> {
        if endpoint.url.is_empty() {
            anyhow::bail!("services.completion.url must be set");
        }
        let model = endpoint
            .model
            .clone()
            .ok_or_else(|| anyhow!("services.completion.model required"))?;
        Ok(Self {
            client: build_client(endpoint.timeout_secs)?,
            url: endpoint.url.clone(),
            model,
            api_key: api_key_from_env(&endpoint.api_key_env)?,
            max_retries: endpoint.max_retries,
        })
    }

    async fn chat(&self, messages: serde_json::Value) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let request = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        let response = send_with_retry(request, self.max_retries, "completion").await?;
        let json: serde_json::Value = response.json().await?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("Invalid completion response: missing message content"))
    }
}

#[async_trait]
impl CompletionService for ChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.chat(serde_json::json!([
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ]))
        .await
    }
}

#[async_trait]
impl ImageDescriber for ChatClient {
    async fn describe(&self, image_bytes: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let data_url = format!("data:image/png;base64,{}", encoded);
        self.chat(serde_json::json!([
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": IMAGE_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            },
        ]))
        .await
    }
}
