//! Core orchestration logic.
//!
//! This module contains:
//! - WorkspaceStore: Locked, atomic JSON collections
//! - DedupGate: Cross-run domain exclusion
//! - DiscoveryStream / InterruptResumeBroker: Proposal and review loop
//! - CompanyWorkerPool / ContactPersonalizationWorker: Parallel processing
//! - EventStore: Append-only run log
//! - Safety: Action budget and run timeout
//! - RunController: Stage sequencing and final statistics
//! - SendPhase: Hand-off of finished drafts to the message transport

pub mod broker;
pub mod controller;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod event_store;
pub mod personalize;
pub mod safety;
pub mod send;
pub mod store;
pub mod workers;

// Re-export commonly used types
pub use broker::{
    interrupt_id, BrokerState, EventSource, Interrupt, InterruptResumeBroker, PipelineEvent,
    ReviewOutcome,
};
pub use controller::{collect_stats, RunController, RunOptions};
pub use dedup::DedupGate;
pub use discovery::DiscoveryStream;
pub use error::PipelineError;
pub use event_store::EventStore;
pub use personalize::{classify, ContactPersonalizationWorker, Grounding};
pub use safety::{ActionBudget, BudgetTracker, SafetyViolation};
pub use send::{SendPhase, SendReport};
pub use store::WorkspaceStore;
pub use workers::{CompanyWorkerPool, PoolSummary, WorkerContext, NO_CONTACTS_FOUND};
