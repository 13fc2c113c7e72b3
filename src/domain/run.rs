//! Run state, statistics and reconstruction from the run log.
//!
//! A Run represents one discovery → review → processing execution.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{Event, EventType, Stage};

/// A run, as reconstructed from its event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Current state of the run
    pub state: RunState,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished (if applicable)
    pub completed_at: Option<DateTime<Utc>>,

    /// Most recent stage that started
    pub current_stage: Option<Stage>,

    /// Number of answered review rounds
    pub review_rounds: u32,

    /// Number of send phases that completed for this run
    pub sends_completed: u32,
}

impl Run {
    /// Create a new running run
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: RunState::Running,
            started_at: Utc::now(),
            completed_at: None,
            current_stage: None,
            review_rounds: 0,
            sends_completed: 0,
        }
    }

    /// Reconstruct run state from a sequence of events
    pub fn from_events(events: &[Event]) -> Option<Self> {
        let first_event = events.first()?;

        let mut run = Self::new(first_event.run_id);
        run.started_at = first_event.timestamp;

        for event in events {
            run.apply_event(event);
        }

        Some(run)
    }

    /// Apply a single event to update run state
    pub fn apply_event(&mut self, event: &Event) {
        match event.event_type {
            EventType::RunStarted => {
                self.state = RunState::Running;
                self.started_at = event.timestamp;
            }
            EventType::StageStarted => {
                self.current_stage = event.stage;
            }
            EventType::InterruptRaised => {
                self.state = RunState::AwaitingApproval;
            }
            EventType::ReviewResolved => {
                self.review_rounds += 1;
                if self.state == RunState::AwaitingApproval {
                    self.state = RunState::Running;
                }
            }
            EventType::BudgetExceeded => {
                self.state = RunState::BudgetExceeded {
                    limit: event.error.clone().unwrap_or_default(),
                };
                self.completed_at = Some(event.timestamp);
            }
            EventType::RunCompleted => {
                self.state = RunState::Completed;
                self.completed_at = Some(event.timestamp);
            }
            EventType::RunFailed => {
                // A budget stop is more specific than the generic failure that follows it
                if !matches!(self.state, RunState::BudgetExceeded { .. }) {
                    self.state = RunState::Failed {
                        error: event.error.clone().unwrap_or_default(),
                    };
                }
                self.completed_at = Some(event.timestamp);
            }
            EventType::SendCompleted => {
                self.sends_completed += 1;
            }
            EventType::StageCompleted
            | EventType::CompanyCompleted
            | EventType::CompanyFailed
            | EventType::RegistryUpdated
            | EventType::SendStarted => {}
        }
    }

    /// Check if the run is still in progress
    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running | RunState::AwaitingApproval)
    }

    /// Check if the run has finished (successfully or not)
    pub fn is_finished(&self) -> bool {
        !self.is_running()
    }
}

/// State of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Currently executing
    Running,

    /// Paused on a human review
    AwaitingApproval,

    /// Completed successfully
    Completed,

    /// Failed with error
    Failed { error: String },

    /// The action budget or run timeout was reached
    BudgetExceeded { limit: String },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Running
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::AwaitingApproval => write!(f, "awaiting-approval"),
            Self::Completed => write!(f, "completed"),
            Self::Failed { .. } => write!(f, "failed"),
            Self::BudgetExceeded { .. } => write!(f, "budget-exceeded"),
        }
    }
}

/// Figures computed by re-reading a run's artifacts from disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub companies_selected: u32,
    pub companies_researched: u32,
    pub companies_failed: u32,
    pub contacts_found: u32,
    pub drafts_generated: u32,
}

/// Outcome of one `run` invocation
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub run_dir: PathBuf,
    pub success: bool,
    pub error: Option<String>,
    pub dry_run: bool,
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(run_id: Uuid, stage: Option<Stage>, event_type: EventType) -> Event {
        Event::new(run_id, stage, event_type, "test")
    }

    #[test]
    fn test_run_creation() {
        let run_id = Uuid::new_v4();
        let run = Run::new(run_id);

        assert_eq!(run.id, run_id);
        assert!(run.is_running());
        assert_eq!(run.review_rounds, 0);
    }

    #[test]
    fn test_run_from_events() {
        let run_id = Uuid::new_v4();

        let events = vec![
            event(run_id, None, EventType::RunStarted),
            event(run_id, Some(Stage::Discovery), EventType::StageStarted),
            event(run_id, Some(Stage::Review), EventType::InterruptRaised),
            event(run_id, Some(Stage::Review), EventType::ReviewResolved),
            event(run_id, Some(Stage::Review), EventType::InterruptRaised),
            event(run_id, Some(Stage::Review), EventType::ReviewResolved),
            event(run_id, Some(Stage::Processing), EventType::StageStarted),
            event(run_id, None, EventType::RunCompleted),
        ];

        let run = Run::from_events(&events).unwrap();

        assert_eq!(run.id, run_id);
        assert_eq!(run.state, RunState::Completed);
        assert_eq!(run.current_stage, Some(Stage::Processing));
        assert_eq!(run.review_rounds, 2);
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn test_awaiting_approval_while_interrupted() {
        let run_id = Uuid::new_v4();
        let events = vec![
            event(run_id, None, EventType::RunStarted),
            event(run_id, Some(Stage::Review), EventType::InterruptRaised),
        ];

        let run = Run::from_events(&events).unwrap();
        assert_eq!(run.state, RunState::AwaitingApproval);
        assert!(run.is_running());
    }

    #[test]
    fn test_budget_exceeded_survives_run_failed() {
        let run_id = Uuid::new_v4();
        let events = vec![
            event(run_id, None, EventType::RunStarted),
            event(run_id, None, EventType::BudgetExceeded).with_error("max actions"),
            event(run_id, None, EventType::RunFailed).with_error("budget exceeded"),
        ];

        let run = Run::from_events(&events).unwrap();
        assert_eq!(
            run.state,
            RunState::BudgetExceeded {
                limit: "max actions".to_string()
            }
        );
    }

    #[test]
    fn test_empty_events() {
        assert!(Run::from_events(&[]).is_none());
    }
}
