//! Discovery as a resumable event source.
//!
//! Each proposal round asks the discovery capability for companies, drops
//! anything the dedup gate excludes, caps the list and raises it as an
//! interrupt. A rejection feeds the reviewer's feedback into the next round;
//! an approval completes the stream.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::broker::{EventSource, Interrupt, PipelineEvent};
use super::dedup::DedupGate;
use super::error::PipelineError;
use super::safety::BudgetTracker;
use crate::capabilities::{DiscoveryAgent, DiscoveryRequest};
use crate::domain::{CompanyRecord, ReviewDecision};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Propose,
    AwaitingDecision { interrupt_id: String },
    Approved,
    Finished,
}

pub struct DiscoveryStream {
    agent: Arc<dyn DiscoveryAgent>,
    gate: DedupGate,
    budget: Arc<BudgetTracker>,
    instruction: String,
    max_companies: u32,

    /// Feedback from every rejection so far, oldest first
    feedback: Vec<String>,
    rounds: u32,
    phase: Phase,
}

impl DiscoveryStream {
    pub fn new(
        agent: Arc<dyn DiscoveryAgent>,
        gate: DedupGate,
        budget: Arc<BudgetTracker>,
        instruction: impl Into<String>,
        max_companies: u32,
    ) -> Self {
        Self {
            agent,
            gate,
            budget,
            instruction: instruction.into(),
            max_companies,
            feedback: Vec::new(),
            rounds: 0,
            phase: Phase::Propose,
        }
    }

    /// Number of proposal rounds issued so far
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    async fn propose(&mut self) -> Result<PipelineEvent, PipelineError> {
        self.budget.charge("discover")?;
        self.rounds += 1;

        let request = DiscoveryRequest {
            instruction: self.instruction.clone(),
            max_companies: self.max_companies,
            excluded_domains: self.gate.known_domains(),
            feedback: self.feedback.clone(),
        };

        let candidates = self
            .agent
            .discover(&request)
            .await
            .map_err(|e| PipelineError::capability("discover", format!("{:#}", e)))?;

        let returned = candidates.len();
        let companies = self.shortlist(candidates.into_iter().map(CompanyRecord::from).collect());

        info!(
            round = self.rounds,
            returned,
            proposed = companies.len(),
            "Discovery round finished"
        );

        if companies.is_empty() {
            self.phase = Phase::Finished;
            return Ok(PipelineEvent::Progress {
                message: format!(
                    "Discovery returned no new companies ({} candidates were filtered out)",
                    returned
                ),
            });
        }

        let interrupt = Interrupt::new(companies);
        self.phase = Phase::AwaitingDecision {
            interrupt_id: interrupt.id.clone(),
        };
        Ok(PipelineEvent::Interrupt(interrupt))
    }

    /// Drop empty and repeated domains, apply the gate, then cap
    fn shortlist(&self, companies: Vec<CompanyRecord>) -> Vec<CompanyRecord> {
        let mut seen = HashSet::new();
        let unique: Vec<CompanyRecord> = companies
            .into_iter()
            .filter(|c| {
                if c.domain.is_empty() {
                    debug!(name = %c.name, "Dropping candidate without a domain");
                    return false;
                }
                seen.insert(c.domain.clone())
            })
            .collect();

        let mut kept = self.gate.filter(unique);
        kept.truncate(self.max_companies as usize);
        kept
    }
}

#[async_trait]
impl EventSource for DiscoveryStream {
    async fn next_event(&mut self) -> Result<Option<PipelineEvent>, PipelineError> {
        match &self.phase {
            Phase::Propose => self.propose().await.map(Some),
            Phase::AwaitingDecision { interrupt_id } => Err(PipelineError::Protocol(format!(
                "next event requested while interrupt {} is unanswered",
                interrupt_id
            ))),
            Phase::Approved => {
                self.phase = Phase::Finished;
                Ok(Some(PipelineEvent::Progress {
                    message: format!("Proposal approved after {} round(s)", self.rounds),
                }))
            }
            Phase::Finished => Ok(None),
        }
    }

    async fn resume(&mut self, decision: ReviewDecision) -> Result<(), PipelineError> {
        let Phase::AwaitingDecision { interrupt_id } = &self.phase else {
            return Err(PipelineError::Protocol(format!(
                "decision for {} delivered with no pending interrupt",
                decision.interrupt_id
            )));
        };

        if *interrupt_id != decision.interrupt_id {
            return Err(PipelineError::Protocol(format!(
                "decision for {} does not match pending interrupt {}",
                decision.interrupt_id, interrupt_id
            )));
        }

        if decision.approved {
            self.phase = Phase::Approved;
        } else {
            if let Some(feedback) = decision.feedback {
                self.feedback.push(feedback);
            }
            self.phase = Phase::Propose;
        }
        Ok(())
    }
}
