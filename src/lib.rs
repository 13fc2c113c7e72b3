//! outreach - Staged outreach pipeline orchestrator
//!
//! Discovers companies that match a target description, pauses for a human
//! to approve the proposal, then researches every approved company and its
//! people concurrently and writes one personalized draft per contact.
//!
//! # Architecture
//!
//! - Every artifact is a JSON collection under the workspace home, written
//!   atomically under a per-collection lock
//! - A cross-run registry keeps contacted domains from being proposed again
//! - Run progress is recorded as an append-only event log per run
//! - Reasoning, search, contact lookup and delivery are external capabilities
//!
//! # Modules
//!
//! - `capabilities`: External capability interfaces and transports
//! - `core`: Orchestration logic (store, broker, workers, controller)
//! - `domain`: Data structures (companies, contacts, drafts, events)
//! - `config`: Configuration and workspace layout
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run with the configured target
//! outreach run
//!
//! # Review only, nothing is researched
//! outreach run --prompt "Series A devtools in Berlin" --dry-run
//!
//! # Send the drafts of a finished run
//! outreach send <run-id>
//! ```

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{PipelineError, RunController, RunOptions, SendPhase, WorkspaceStore};
pub use crate::domain::{CompanyRecord, ContactRecord, DraftRecord, Event, EventType, Run, RunReport, RunState};
