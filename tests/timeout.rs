//! Timeout Integration Tests
//!
//! Tests for capability call timeouts and the run-level timeout.

mod common;

use std::time::{Duration, Instant};

use tempfile::TempDir;

use common::{candidate, test_config, Fakes, ScriptedDiscovery};
use outreach::config::paths::Workspace;
use outreach::core::{EventStore, RunController, RunOptions};
use outreach::domain::RunState;

#[tokio::test]
async fn test_run_timeout_stops_before_first_action() {
    let home = TempDir::new().unwrap();
    let mut config = test_config(home.path(), 5);
    config.budget.run_timeout_seconds = 0;

    let fakes = Fakes::new(ScriptedDiscovery::new(vec![vec![candidate("Acme", "acme.io")]]));
    let report = RunController::new(&config, fakes.capabilities(), RunOptions::default())
        .unwrap()
        .execute()
        .await;

    assert!(!report.success);
    assert!(report.error.as_deref().unwrap().contains("Run timeout"));
    assert!(fakes.discovery.requests().is_empty());

    let run = EventStore::open(&Workspace::new(home.path()), report.run_id)
        .await
        .unwrap()
        .load_run()
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(run.state, RunState::BudgetExceeded { .. }));
}

#[cfg(unix)]
mod command {
    use super::*;

    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    use outreach::capabilities::{
        AutoApprove, Capabilities, CommandTransport, RemoteCapabilities, Transport,
    };

    /// Write an executable script that ignores its arguments and sleeps
    fn sleeping_program(dir: &TempDir, seconds: u32) -> String {
        let path = dir.path().join("slow-capabilities");
        std::fs::write(&path, format!("#!/bin/sh\nsleep {}\n", seconds)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn test_command_call_times_out() {
        let dir = TempDir::new().unwrap();
        let transport =
            CommandTransport::new(sleeping_program(&dir, 10), Duration::from_millis(200));

        let start = Instant::now();
        let result = transport.call("discover", serde_json::json!({})).await;

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_slow_discovery_fails_run() {
        let home = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();

        let remote = Arc::new(RemoteCapabilities::new(CommandTransport::new(
            sleeping_program(&bin, 10),
            Duration::from_millis(200),
        )));
        let capabilities = Capabilities::from_remote(remote, Arc::new(AutoApprove));

        let report = RunController::new(
            &test_config(home.path(), 5),
            capabilities,
            RunOptions::default(),
        )
        .unwrap()
        .execute()
        .await;

        assert!(!report.success);
        let error = report.error.unwrap();
        assert!(error.contains("discover"));
        assert!(error.contains("timed out"));
    }
}
