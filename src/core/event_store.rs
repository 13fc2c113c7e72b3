//! Append-only run log with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL) in
//! `runs/<run_id>/events.jsonl` for simplicity and easy inspection. Appends
//! take an exclusive file lock so concurrent writers never interleave lines.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use super::error::PipelineError;
use crate::config::paths::Workspace;
use crate::domain::{Event, EventType, Run};

/// Name of the run log file inside a run directory
pub const EVENTS_FILE: &str = "events.jsonl";

/// File-based event store for one run
#[derive(Debug, Clone)]
pub struct EventStore {
    /// Directory containing the run
    run_dir: PathBuf,

    /// Path to the events.jsonl file
    events_path: PathBuf,
}

impl EventStore {
    /// Create or open the run log for a run in a workspace
    pub async fn open(workspace: &Workspace, run_id: Uuid) -> Result<Self, PipelineError> {
        Self::at(workspace.run_dir(run_id)).await
    }

    /// Create or open a run log in an explicit directory
    pub async fn at(run_dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let run_dir = run_dir.into();

        fs::create_dir_all(&run_dir).await.map_err(|e| {
            PipelineError::Persistence(format!(
                "Failed to create run directory {}: {}",
                run_dir.display(),
                e
            ))
        })?;

        let events_path = run_dir.join(EVENTS_FILE);
        Ok(Self {
            run_dir,
            events_path,
        })
    }

    /// Get the path to the events file
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Get the run directory
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Append an event to the log under an exclusive file lock
    pub async fn append(&self, event: &Event) -> Result<(), PipelineError> {
        let json = serde_json::to_string(event)
            .map_err(|e| PipelineError::Persistence(format!("Failed to serialize event: {}", e)))?;
        let path = self.events_path.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.lock_exclusive()?;
            writeln!(file, "{}", json)?;
            file.flush()?;
            // Lock is released when file is dropped
            Ok(())
        })
        .await
        .map_err(|e| PipelineError::Persistence(format!("Event write task failed: {}", e)))?
        .map_err(|e| {
            PipelineError::Persistence(format!(
                "Failed to append to {}: {}",
                self.events_path.display(),
                e
            ))
        })
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<Event>, PipelineError> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path).await.map_err(|e| {
            PipelineError::Persistence(format!(
                "Failed to open events file {}: {}",
                self.events_path.display(),
                e
            ))
        })?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line).map_err(|e| {
                PipelineError::Persistence(format!("Failed to parse event: {}: {}", e, line))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    /// Reconstruct the run from its log (`None` if nothing was logged)
    pub async fn load_run(&self) -> Result<Option<Run>, PipelineError> {
        Ok(Run::from_events(&self.replay().await?))
    }

    /// Get the last event of a specific type
    pub async fn last_event_of_type(
        &self,
        event_type: EventType,
    ) -> Result<Option<Event>, PipelineError> {
        let events = self.replay().await?;
        Ok(events.into_iter().rev().find(|e| e.event_type == event_type))
    }

    /// List all run IDs under a runs directory
    pub async fn list_runs(runs_dir: &Path) -> Result<Vec<Uuid>, PipelineError> {
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(runs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RunState, Stage};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn create_test_store() -> (EventStore, Uuid, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let run_id = Uuid::new_v4();
        let store = EventStore::open(&Workspace::new(temp_dir.path()), run_id)
            .await
            .unwrap();
        (store, run_id, temp_dir)
    }

    #[tokio::test]
    async fn test_event_append_and_replay() {
        let (store, run_id, _temp) = create_test_store().await;

        store
            .append(&Event::new(run_id, None, EventType::RunStarted, "Run started"))
            .await
            .unwrap();
        store
            .append(&Event::new(
                run_id,
                Some(Stage::Discovery),
                EventType::StageStarted,
                "Discovery started",
            ))
            .await
            .unwrap();

        let events = store.replay().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::RunStarted);
        assert_eq!(events[1].stage, Some(Stage::Discovery));
    }

    #[tokio::test]
    async fn test_load_run_and_last_event() {
        let (store, run_id, _temp) = create_test_store().await;
        assert!(store.load_run().await.unwrap().is_none());

        store
            .append(&Event::new(run_id, None, EventType::RunStarted, "Run started"))
            .await
            .unwrap();
        store
            .append(
                &Event::new(run_id, None, EventType::RunFailed, "Run failed")
                    .with_error("discovery unavailable"),
            )
            .await
            .unwrap();

        let run = store.load_run().await.unwrap().unwrap();
        assert_eq!(
            run.state,
            RunState::Failed {
                error: "discovery unavailable".to_string()
            }
        );

        let last = store
            .last_event_of_type(EventType::RunFailed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.summary, "Run failed");
        assert!(store
            .last_event_of_type(EventType::RunCompleted)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_whole_lines() {
        let (store, run_id, _temp) = create_test_store().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .append(&Event::new(
                            run_id,
                            Some(Stage::Processing),
                            EventType::CompanyCompleted,
                            format!("company {} done", i),
                        ))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.replay().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_list_runs_ignores_non_uuid_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());
        let run_id = Uuid::new_v4();

        EventStore::open(&workspace, run_id).await.unwrap();
        std::fs::create_dir_all(workspace.runs_dir().join("scratch")).unwrap();

        let runs = EventStore::list_runs(&workspace.runs_dir()).await.unwrap();
        assert_eq!(runs, vec![run_id]);

        let missing = EventStore::list_runs(&temp_dir.path().join("nope")).await.unwrap();
        assert!(missing.is_empty());
    }
}
