//! Domain types for the outreach orchestrator.
//!
//! This module contains the core data structures:
//! - Company, Contact, Draft: per-run artifacts
//! - Contacted: cross-run dedup registry entries
//! - Review: transient human decisions
//! - Events and Run: the run log and state derived from it

pub mod company;
pub mod contact;
pub mod contacted;
pub mod draft;
pub mod events;
pub mod review;
pub mod run;

// Re-export commonly used types
pub use company::{normalize_domain, slugify, CompanyRecord, CompanyRef, CompanyStatus};
pub use contact::ContactRecord;
pub use contacted::ContactedEntry;
pub use draft::{
    derive_draft_id, disambiguate_id, DraftRecord, DraftStatus, PersonalizationNotes, SourceTier,
};
pub use events::{Event, EventType, Stage};
pub use review::{ReviewDecision, ReviewRound};
pub use run::{Run, RunReport, RunState, RunStats};
