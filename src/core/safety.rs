//! Action budget and run timeout enforcement.
//!
//! Prevents runaway runs (for example an endless reject/re-propose loop)
//! through configurable limits on:
//! - Number of capability calls issued by the core
//! - Total run duration

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Budget limits for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBudget {
    /// Maximum number of capability calls per run (default: 500)
    #[serde(default = "default_max_actions")]
    pub max_actions: u32,

    /// Total run timeout in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
}

fn default_max_actions() -> u32 {
    500
}
fn default_run_timeout() -> u64 {
    3600
} // 1 hour

impl Default for ActionBudget {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            run_timeout_seconds: default_run_timeout(),
        }
    }
}

impl ActionBudget {
    /// Start tracking a run against this budget
    pub fn start(&self) -> Arc<BudgetTracker> {
        Arc::new(BudgetTracker::new(self.clone()))
    }
}

/// Shared across every worker of a run
#[derive(Debug)]
pub struct BudgetTracker {
    limits: ActionBudget,
    actions: AtomicU32,
    started_at: Instant,
}

impl BudgetTracker {
    pub fn new(limits: ActionBudget) -> Self {
        Self {
            limits,
            actions: AtomicU32::new(0),
            started_at: Instant::now(),
        }
    }

    /// Reserve one action. The caller must not perform the action on error.
    pub fn charge(&self, action: &str) -> Result<(), SafetyViolation> {
        let elapsed = self.started_at.elapsed();
        if elapsed >= Duration::from_secs(self.limits.run_timeout_seconds) {
            return Err(SafetyViolation::RunTimeout {
                elapsed_seconds: elapsed.as_secs(),
                limit_seconds: self.limits.run_timeout_seconds,
            });
        }

        let limit = self.limits.max_actions;
        self.actions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < limit).then_some(used + 1)
            })
            .map_err(|_| {
                tracing::debug!(action, limit, "Action refused by budget");
                SafetyViolation::MaxActions { limit }
            })?;

        Ok(())
    }

    /// Number of actions charged so far
    pub fn actions_used(&self) -> u32 {
        self.actions.load(Ordering::Acquire)
    }

    /// Get elapsed time in seconds
    pub fn elapsed_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Budget violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("Maximum actions reached: {limit}")]
    MaxActions { limit: u32 },

    #[error("Run timeout: {elapsed_seconds}s >= {limit_seconds}s")]
    RunTimeout {
        elapsed_seconds: u64,
        limit_seconds: u64,
    },
}
