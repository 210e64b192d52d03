//! OpenAI-style embeddings client.
//!
//! `POST {url}` with `{ model, input: [...] }`; the response carries one
//! `data[].embedding` array per input, in input order. Batch requests keep
//! that order, and the configured dimensionality is checked on every
//! vector so a misconfigured model fails loudly instead of writing
//! mis-sized vectors to the index.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::config::EmbeddingEndpoint;
use crate::http::{api_key_from_env, build_client, send_with_retry};
use crate::traits::EmbeddingService;

pub struct EmbeddingClient {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: Option<usize>,
    api_key: String,
    max_retries: u32,
}

impl EmbeddingClient {
    pub fn new(endpoint: &EmbeddingEndpoint) -> Result<Self> {
        if endpoint.url.is_empty() {
            anyhow::bail!("services.embedding.url must be set");
        }
        let model = endpoint
            .model
            .clone()
            .ok_or_else(|| anyhow!("services.embedding.model required"))?;
        Ok(Self {
            client: build_client(endpoint.timeout_secs)?,
            url: endpoint.url.clone(),
            model,
            dims: endpoint.dims,
            api_key: api_key_from_env(&endpoint.api_key_env)?,
            max_retries: endpoint.max_retries,
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let request = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        let response = send_with_retry(request, self.max_retries, "embedding").await?;
        let json: serde_json::Value = response.json().await?;

        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| anyhow!("Invalid embedding response: missing data array"))?;

        if data.len() != input.len() {
            bail!(
                "Embedding response has {} vectors for {} inputs",
                data.len(),
                input.len()
            );
        }

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| anyhow!("Invalid embedding response: missing embedding"))?;
            let vector: Vec<f32> = embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            if let Some(dims) = self.dims {
                if vector.len() != dims {
                    bail!(
                        "Embedding has {} dimensions, expected {}",
                        vector.len(),
                        dims
                    );
                }
            }
            vectors.push(vector);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingService for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let vectors = self.request(&input).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}
