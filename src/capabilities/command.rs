//! Subprocess transport.
//!
//! Spawns `<program> <operation>`, writes the JSON request to stdin and reads
//! one JSON document from stdout.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::Transport;
use crate::config::CommandConfig;

/// Capability provider reached through a local program
pub struct CommandTransport {
    program: String,
    call_timeout: Duration,
}

impl CommandTransport {
    pub fn new(program: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            call_timeout,
        }
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(&config.program, Duration::from_secs(config.timeout_seconds))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Transport for CommandTransport {
    fn name(&self) -> &str {
        "command"
    }

    async fn call(&self, operation: &str, request: Value) -> Result<Value> {
        let input = serde_json::to_vec(&request).context("Failed to encode request")?;

        let mut child = Command::new(&self.program)
            .arg(operation)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!("Failed to spawn '{}' for operation '{}'", self.program, operation)
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .context("Failed to write request to stdin")?;
            // Dropping stdin signals EOF
        }

        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "Operation '{}' timed out after {:?}",
                    operation, self.call_timeout
                )
            })?
            .with_context(|| format!("Failed to wait for '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Operation '{}' failed with exit code {}: {}",
                operation,
                exit_code,
                stderr.trim()
            );
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Operation '{}' returned invalid JSON", operation))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trips_through_stdio() {
        // `cat -` echoes stdin
        let transport = CommandTransport::new("cat", Duration::from_secs(5));
        let reply = transport.call("-", json!({"ok": true})).await.unwrap();
        assert_eq!(reply, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let transport = CommandTransport::new("false", Duration::from_secs(5));
        let err = transport.call("search", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("failed with exit code"));
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let transport = CommandTransport::new("/nonexistent/outreach-capabilities", Duration::from_secs(1));
        let err = transport.call("search", json!({})).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to spawn"));
    }

    #[test]
    fn test_from_config() {
        let transport = CommandTransport::from_config(&CommandConfig::default());
        assert_eq!(transport.program(), "outreach-capabilities");
        assert_eq!(transport.call_timeout, Duration::from_secs(120));
        assert_eq!(transport.name(), "command");
    }
}
