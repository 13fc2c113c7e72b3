//! HTTP transport.
//!
//! Endpoint: POST `<baseUrl>/<operation>`
//! Auth: Bearer token

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::Transport;
use crate::config::HttpConfig;

/// Capability provider reached over HTTP
pub struct HttpTransport {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, call_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    /// Create from config; the token is read from `tokenEnv`
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .with_context(|| format!("{} environment variable required", config.token_env))?;
        Self::new(
            &config.base_url,
            token,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url, operation)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn call(&self, operation: &str, request: Value) -> Result<Value> {
        let response = self
            .client
            .post(self.endpoint(operation))
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to call '{}'", operation))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Operation '{}' error ({}): {}", operation, status, text.trim());
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Operation '{}' returned invalid JSON", operation))
    }
}
