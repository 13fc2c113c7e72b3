//! Send phase.
//!
//! Hands every draft still in `draft` status to the message transport, one at
//! a time, and persists each outcome before moving on. A delivered draft moves
//! to `sent`. A transport failure records the error but leaves the draft in
//! `draft`, so re-running the send retries it. Only a draft with no usable
//! address moves to `failed`. Drafts that already left `draft` are never
//! resent.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::PipelineError;
use super::event_store::EventStore;
use super::store::WorkspaceStore;
use crate::capabilities::MessageSender;
use crate::config::paths::drafts_key;
use crate::domain::{DraftRecord, Event, EventType, Stage};

/// Outcome of one send phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub attempted: u32,
    pub sent: u32,
    pub failed: u32,
    /// Failures that were permanent; the rest stay pending for the next send
    pub undeliverable: u32,
}

/// What happened to one draft
enum SendOutcome {
    Sent(String),
    /// Transport failure; the draft stays in `draft` with the error recorded
    Retryable(String),
    /// The draft can never be delivered and moves to `failed`
    Undeliverable(String),
}

pub struct SendPhase {
    store: Arc<WorkspaceStore>,
    sender: Arc<dyn MessageSender>,
}

impl SendPhase {
    pub fn new(store: Arc<WorkspaceStore>, sender: Arc<dyn MessageSender>) -> Self {
        Self { store, sender }
    }

    /// Number of drafts a send would attempt
    pub async fn pending(&self, run_id: Uuid) -> Result<usize, PipelineError> {
        self.ensure_run(run_id)?;
        let drafts: Vec<DraftRecord> = self.store.load(&drafts_key(run_id)).await?;
        Ok(drafts.iter().filter(|d| d.is_pending_send()).count())
    }

    pub async fn send_run(&self, run_id: Uuid) -> Result<SendReport, PipelineError> {
        self.ensure_run(run_id)?;

        let events = EventStore::open(self.store.workspace(), run_id).await?;
        let key = drafts_key(run_id);

        let pending: Vec<DraftRecord> = self
            .store
            .load::<DraftRecord>(&key)
            .await?
            .into_iter()
            .filter(DraftRecord::is_pending_send)
            .collect();

        events
            .append(&Event::new(
                run_id,
                Some(Stage::Send),
                EventType::SendStarted,
                format!("Sending {} drafts", pending.len()),
            ))
            .await?;

        let mut report = SendReport::default();

        for draft in pending {
            report.attempted += 1;

            let outcome = if !draft.contact.is_reachable() {
                SendOutcome::Undeliverable(format!(
                    "No deliverable address for {}",
                    draft.contact.name
                ))
            } else {
                match self.sender.send_message(&draft).await {
                    Ok(receipt) if receipt.success => SendOutcome::Sent(
                        receipt.message_id.unwrap_or_else(|| "unknown".to_string()),
                    ),
                    Ok(receipt) => SendOutcome::Retryable(
                        receipt
                            .error
                            .unwrap_or_else(|| "transport reported failure".to_string()),
                    ),
                    Err(e) => SendOutcome::Retryable(format!("{:#}", e)),
                }
            };

            match &outcome {
                SendOutcome::Sent(message_id) => {
                    report.sent += 1;
                    info!(draft = %draft.id, %message_id, "Draft sent");
                }
                SendOutcome::Retryable(error) => {
                    report.failed += 1;
                    warn!(draft = %draft.id, %error, "Draft send failed; left pending for retry");
                }
                SendOutcome::Undeliverable(error) => {
                    report.failed += 1;
                    report.undeliverable += 1;
                    warn!(draft = %draft.id, %error, "Draft marked failed");
                }
            }

            let draft_id = draft.id.clone();
            let applied = self
                .store
                .mutate(&key, move |drafts: &mut Vec<DraftRecord>| {
                    match drafts.iter_mut().find(|d| d.id == draft_id) {
                        Some(stored) => match outcome {
                            SendOutcome::Sent(message_id) => stored.mark_sent(message_id),
                            SendOutcome::Retryable(error) => stored.record_send_error(error),
                            SendOutcome::Undeliverable(error) => stored.mark_failed(error),
                        },
                        None => false,
                    }
                })
                .await?;

            if !applied {
                warn!(draft = %draft.id, "Draft changed during send; stored record left untouched");
            }
        }

        events
            .append(&Event::new(
                run_id,
                Some(Stage::Send),
                EventType::SendCompleted,
                format!(
                    "{} attempted, {} sent, {} failed",
                    report.attempted, report.sent, report.failed
                ),
            ))
            .await?;

        info!(
            %run_id,
            attempted = report.attempted,
            sent = report.sent,
            failed = report.failed,
            "Send phase finished"
        );
        Ok(report)
    }

    fn ensure_run(&self, run_id: Uuid) -> Result<(), PipelineError> {
        if self.store.workspace().run_dir(run_id).is_dir() {
            Ok(())
        } else {
            Err(PipelineError::Configuration(format!("Unknown run: {}", run_id)))
        }
    }
}
