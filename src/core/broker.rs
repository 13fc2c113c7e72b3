//! Interrupt/resume broker for the human review loop.
//!
//! The broker drains an [`EventSource`]. When the source raises an interrupt
//! carrying a proposed company list, the broker presents it through the
//! approval prompt, then delivers exactly one decision back into the source
//! and keeps streaming. The loop ends when the source runs dry.
//!
//! ```text
//! Streaming --interrupt--> AwaitingApproval --answer--> Resuming --resume--> Streaming
//!     |
//!     +--source exhausted--> Done
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::PipelineError;
use super::event_store::EventStore;
use crate::capabilities::{ApprovalPrompt, PromptResponse};
use crate::domain::{CompanyRecord, Event, EventType, ReviewDecision, ReviewRound, Stage};

/// A proposed company list awaiting a human decision
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupt {
    pub id: String,
    pub companies: Vec<CompanyRecord>,
}

impl Interrupt {
    pub fn new(companies: Vec<CompanyRecord>) -> Self {
        Self {
            id: interrupt_id(&companies),
            companies,
        }
    }
}

/// First 16 hex chars of SHA-256 over the proposal's domains joined by newlines
pub fn interrupt_id(companies: &[CompanyRecord]) -> String {
    let joined = companies
        .iter()
        .map(|c| c.domain.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// One item yielded by an event source
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress { message: String },
    Interrupt(Interrupt),
}

/// A resumable stream of pipeline events
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the source has completed
    async fn next_event(&mut self) -> Result<Option<PipelineEvent>, PipelineError>;

    /// Deliver the decision for the pending interrupt
    async fn resume(&mut self, decision: ReviewDecision) -> Result<(), PipelineError>;
}

/// Broker state
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerState {
    Streaming,
    AwaitingApproval(Interrupt),
    Resuming(ReviewDecision),
    Done,
}

/// Result of a completed review loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewOutcome {
    /// Companies of the last approved interrupt (empty if none was approved)
    pub approved: Vec<CompanyRecord>,
    pub rounds: Vec<ReviewRound>,
}

pub struct InterruptResumeBroker {
    prompt: Arc<dyn ApprovalPrompt>,
    run_log: Option<(EventStore, Uuid)>,
}

impl InterruptResumeBroker {
    pub fn new(prompt: Arc<dyn ApprovalPrompt>) -> Self {
        Self {
            prompt,
            run_log: None,
        }
    }

    /// Record interrupts and answers in a run log
    pub fn with_run_log(mut self, events: EventStore, run_id: Uuid) -> Self {
        self.run_log = Some((events, run_id));
        self
    }

    /// Drive the source until it completes, answering every interrupt once
    pub async fn run(&self, source: &mut dyn EventSource) -> Result<ReviewOutcome, PipelineError> {
        let mut outcome = ReviewOutcome::default();
        let mut state = BrokerState::Streaming;

        loop {
            state = match state {
                BrokerState::Streaming => match source.next_event().await? {
                    None => BrokerState::Done,
                    Some(PipelineEvent::Progress { message }) => {
                        info!(%message, "Discovery progress");
                        BrokerState::Streaming
                    }
                    Some(PipelineEvent::Interrupt(interrupt)) => {
                        if interrupt.companies.is_empty() {
                            return Err(PipelineError::Protocol(format!(
                                "interrupt {} carries no companies",
                                interrupt.id
                            )));
                        }

                        self.log(
                            EventType::InterruptRaised,
                            format!(
                                "Proposal {} with {} companies awaiting approval",
                                interrupt.id,
                                interrupt.companies.len()
                            ),
                        )
                        .await?;
                        BrokerState::AwaitingApproval(interrupt)
                    }
                },

                BrokerState::AwaitingApproval(interrupt) => {
                    let (decision, round) = self.ask(&interrupt).await?;
                    if decision.approved {
                        outcome.approved = interrupt.companies;
                    }

                    self.log(EventType::ReviewResolved, describe_round(&round))
                        .await?;
                    outcome.rounds.push(round);
                    BrokerState::Resuming(decision)
                }

                BrokerState::Resuming(decision) => {
                    source.resume(decision).await?;
                    BrokerState::Streaming
                }

                BrokerState::Done => return Ok(outcome),
            };
        }
    }

    async fn ask(
        &self,
        interrupt: &Interrupt,
    ) -> Result<(ReviewDecision, ReviewRound), PipelineError> {
        let response = self
            .prompt
            .request_approval(&interrupt.companies)
            .await
            .map_err(|e| PipelineError::Protocol(format!("approval prompt failed: {}", e)))?;

        let (decision, implicit) = match response {
            PromptResponse::Approved => (ReviewDecision::approve(&interrupt.id), false),
            PromptResponse::Aborted => {
                warn!(interrupt = %interrupt.id, "Approval prompt aborted; treating as approval");
                (ReviewDecision::approve(&interrupt.id), true)
            }
            PromptResponse::Rejected { feedback } => {
                (ReviewDecision::reject(&interrupt.id, feedback), false)
            }
        };

        let round = ReviewRound {
            interrupt_id: interrupt.id.clone(),
            companies_proposed: interrupt.companies.len(),
            approved: decision.approved,
            feedback: decision.feedback.clone(),
            implicit,
        };

        Ok((decision, round))
    }

    async fn log(&self, event_type: EventType, summary: String) -> Result<(), PipelineError> {
        if let Some((events, run_id)) = &self.run_log {
            events
                .append(&Event::new(*run_id, Some(Stage::Review), event_type, summary))
                .await?;
        }
        Ok(())
    }
}

fn describe_round(round: &ReviewRound) -> String {
    match (round.approved, round.implicit, &round.feedback) {
        (true, false, _) => format!("Proposal {} approved", round.interrupt_id),
        (true, true, _) => format!("Proposal {} approved implicitly (prompt aborted)", round.interrupt_id),
        (false, _, Some(feedback)) => format!(
            "Proposal {} rejected with feedback: {}",
            round.interrupt_id, feedback
        ),
        (false, _, None) => format!("Proposal {} rejected", round.interrupt_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::PromptError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of events and records decisions
    struct ScriptedSource {
        events: VecDeque<PipelineEvent>,
        decisions: Vec<ReviewDecision>,
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn next_event(&mut self) -> Result<Option<PipelineEvent>, PipelineError> {
            Ok(self.events.pop_front())
        }

        async fn resume(&mut self, decision: ReviewDecision) -> Result<(), PipelineError> {
            self.decisions.push(decision);
            Ok(())
        }
    }

    struct ScriptedPrompt(Mutex<VecDeque<PromptResponse>>);

    #[async_trait]
    impl ApprovalPrompt for ScriptedPrompt {
        async fn request_approval(
            &self,
            _companies: &[CompanyRecord],
        ) -> Result<PromptResponse, PromptError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| PromptError::Other("no scripted answer".to_string()))
        }
    }

    fn broker(answers: Vec<PromptResponse>) -> InterruptResumeBroker {
        InterruptResumeBroker::new(Arc::new(ScriptedPrompt(Mutex::new(answers.into()))))
    }

    fn proposal(domains: &[&str]) -> PipelineEvent {
        PipelineEvent::Interrupt(Interrupt::new(
            domains.iter().map(|d| CompanyRecord::new(*d, d)).collect(),
        ))
    }

    #[test]
    fn test_interrupt_id_is_stable() {
        let a = Interrupt::new(vec![CompanyRecord::new("Y", "y.com"), CompanyRecord::new("Z", "z.com")]);
        let b = Interrupt::new(vec![CompanyRecord::new("Y Inc", "y.com"), CompanyRecord::new("Z", "z.com")]);
        let c = Interrupt::new(vec![CompanyRecord::new("Z", "z.com"), CompanyRecord::new("Y", "y.com")]);

        assert_eq!(a.id.len(), 16);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[tokio::test]
    async fn test_source_without_interrupt_completes() {
        let mut source = ScriptedSource {
            events: vec![PipelineEvent::Progress {
                message: "nothing new".to_string(),
            }]
            .into(),
            decisions: vec![],
        };

        let outcome = broker(vec![]).run(&mut source).await.unwrap();
        assert!(outcome.approved.is_empty());
        assert!(outcome.rounds.is_empty());
    }

    #[tokio::test]
    async fn test_each_interrupt_answered_once() {
        let mut source = ScriptedSource {
            events: vec![proposal(&["a.io"]), proposal(&["b.io"])].into(),
            decisions: vec![],
        };

        let outcome = broker(vec![
            PromptResponse::Rejected {
                feedback: Some("bigger".to_string()),
            },
            PromptResponse::Approved,
        ])
        .run(&mut source)
        .await
        .unwrap();

        assert_eq!(source.decisions.len(), 2);
        assert!(!source.decisions[0].approved);
        assert_eq!(source.decisions[0].feedback.as_deref(), Some("bigger"));
        assert!(source.decisions[1].approved);
        assert_eq!(outcome.approved[0].domain, "b.io");
        assert_eq!(outcome.rounds.len(), 2);
    }

    #[tokio::test]
    async fn test_abort_is_implicit_approval() {
        let mut source = ScriptedSource {
            events: vec![proposal(&["a.io", "b.io"])].into(),
            decisions: vec![],
        };

        let outcome = broker(vec![PromptResponse::Aborted])
            .run(&mut source)
            .await
            .unwrap();

        assert_eq!(outcome.approved.len(), 2);
        assert!(outcome.rounds[0].implicit);
        assert!(source.decisions[0].approved);
    }

    #[tokio::test]
    async fn test_empty_interrupt_is_protocol_error() {
        let mut source = ScriptedSource {
            events: vec![PipelineEvent::Interrupt(Interrupt::new(vec![]))].into(),
            decisions: vec![],
        };

        let result = broker(vec![PromptResponse::Approved]).run(&mut source).await;
        assert!(matches!(result, Err(PipelineError::Protocol(_))));
        assert!(source.decisions.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_failure_is_protocol_error() {
        let mut source = ScriptedSource {
            events: vec![proposal(&["a.io"])].into(),
            decisions: vec![],
        };

        let result = broker(vec![]).run(&mut source).await;
        assert!(matches!(result, Err(PipelineError::Protocol(_))));
    }
}
