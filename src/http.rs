//! Shared HTTP plumbing for the external service clients.
//!
//! Retry strategy (used by every client):
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

/// Build a client with the standard per-request timeout.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Read a bearer token from the named environment variable.
pub fn api_key_from_env(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

/// Send a request with retry/backoff, returning the first successful
/// response. `what` names the service for error messages.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
    what: &str,
) -> Result<reqwest::Response> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let req = request
            .try_clone()
            .ok_or_else(|| anyhow!("{} request is not retryable", what))?;

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow!("{} error {}: {}", what, status, body));
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                bail!("{} error {}: {}", what, status, body);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} failed after retries", what)))
}
