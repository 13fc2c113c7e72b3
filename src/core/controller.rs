//! Run controller.
//!
//! Drives one run through its stages in order:
//!
//! 0. load the contacted registry
//! 1. discovery, with the human review loop
//! 2. concurrent per-company processing
//! 3. registry update
//!
//! Every stage boundary is written to the run log. Final statistics are read
//! back from the artifacts on disk, never accumulated in memory, so they stay
//! correct for runs that died halfway.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::broker::InterruptResumeBroker;
use super::dedup::DedupGate;
use super::discovery::DiscoveryStream;
use super::error::PipelineError;
use super::event_store::EventStore;
use super::safety::ActionBudget;
use super::store::WorkspaceStore;
use super::workers::{CompanyWorkerPool, WorkerContext};
use crate::capabilities::Capabilities;
use crate::config::paths::{companies_key, contacts_dir_key, drafts_key, Workspace};
use crate::config::{Preferences, ResolvedConfig};
use crate::domain::{
    CompanyRecord, CompanyStatus, ContactRecord, DraftRecord, Event, EventType, RunReport,
    RunStats, Stage,
};

/// Per-invocation options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Discovery instruction overriding `preferences.target`
    pub prompt: Option<String>,

    /// Stop after the review loop
    pub dry_run: bool,
}

pub struct RunController {
    store: Arc<WorkspaceStore>,
    capabilities: Capabilities,
    preferences: Preferences,
    budget: ActionBudget,
    instruction: String,
    dry_run: bool,
}

impl RunController {
    /// Validate configuration and options; nothing is written on failure
    pub fn new(
        config: &ResolvedConfig,
        capabilities: Capabilities,
        options: RunOptions,
    ) -> Result<Self, PipelineError> {
        let prompt = options
            .prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        config.validate(prompt.as_deref())?;

        let instruction = prompt.unwrap_or_else(|| config.preferences.target.trim().to_string());

        Ok(Self {
            store: Arc::new(WorkspaceStore::new(Workspace::new(&config.home))),
            capabilities,
            preferences: config.preferences.clone(),
            budget: config.budget.clone(),
            instruction,
            dry_run: options.dry_run,
        })
    }

    pub fn store(&self) -> &Arc<WorkspaceStore> {
        &self.store
    }

    /// Execute a new run. Failures are reported, not returned.
    #[instrument(skip(self), fields(dry_run = self.dry_run))]
    pub async fn execute(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let run_dir = self.store.workspace().run_dir(run_id);
        info!(%run_id, "Starting run");

        let result = match EventStore::open(self.store.workspace(), run_id).await {
            Ok(events) => {
                let result = self.run_stages(run_id, &events).await;
                self.finish(run_id, &events, &result).await;
                result
            }
            Err(e) => Err(e),
        };

        let stats = self.collect_stats(run_id).await;

        match result {
            Ok(()) => RunReport {
                run_id,
                run_dir,
                success: true,
                error: None,
                dry_run: self.dry_run,
                stats,
            },
            Err(e) => {
                error!(%run_id, error = %e, "Run failed");
                RunReport {
                    run_id,
                    run_dir,
                    success: false,
                    error: Some(e.to_string()),
                    dry_run: self.dry_run,
                    stats,
                }
            }
        }
    }

    async fn run_stages(&self, run_id: Uuid, events: &EventStore) -> Result<(), PipelineError> {
        let budget = self.budget.start();

        events
            .append(&Event::new(
                run_id,
                None,
                EventType::RunStarted,
                if self.dry_run {
                    "Run started (dry run)"
                } else {
                    "Run started"
                },
            ))
            .await?;

        // Stage 0: dedup registry
        let started = self.stage_started(events, run_id, Stage::LoadRegistry).await?;
        let gate = DedupGate::load(&self.store, &self.preferences.excluded_domains).await?;
        self.stage_completed(
            events,
            run_id,
            Stage::LoadRegistry,
            started,
            format!("{} domains already contacted", gate.len()),
        )
        .await?;

        // Stage 1 + 1.5: discovery with review
        let started = self.stage_started(events, run_id, Stage::Discovery).await?;
        let mut stream = DiscoveryStream::new(
            Arc::clone(&self.capabilities.discovery),
            gate,
            Arc::clone(&budget),
            &self.instruction,
            self.preferences.max_outreach_per_run,
        );
        let broker = InterruptResumeBroker::new(Arc::clone(&self.capabilities.prompt))
            .with_run_log(events.clone(), run_id);
        let outcome = broker.run(&mut stream).await?;
        self.stage_completed(
            events,
            run_id,
            Stage::Discovery,
            started,
            format!(
                "{} proposal rounds, {} reviews",
                stream.rounds(),
                outcome.rounds.len()
            ),
        )
        .await?;

        // Persist the selection before anything can fail on it
        let started = self.stage_started(events, run_id, Stage::Review).await?;
        let approved: Vec<CompanyRecord> = outcome
            .approved
            .into_iter()
            .map(|mut company| {
                company.selected = true;
                company.status = CompanyStatus::Pending;
                company
            })
            .collect();
        if !approved.is_empty() {
            self.store
                .replace(&companies_key(run_id), approved.clone())
                .await?;
        }
        self.stage_completed(
            events,
            run_id,
            Stage::Review,
            started,
            format!("{} companies approved", approved.len()),
        )
        .await?;

        if approved.is_empty() {
            info!(%run_id, "Nothing approved; run finished without processing");
            return Ok(());
        }

        if self.dry_run {
            info!(%run_id, companies = approved.len(), "Dry run: skipping processing");
            return Ok(());
        }

        // Stage 2: per-company processing
        let started = self.stage_started(events, run_id, Stage::Processing).await?;
        let ctx = WorkerContext {
            run_id,
            store: Arc::clone(&self.store),
            capabilities: self.capabilities.clone(),
            budget: Arc::clone(&budget),
            contact_limit: self.preferences.contact_limit(),
            events: Some(events.clone()),
        };
        let summary = CompanyWorkerPool::new(Arc::new(ctx))
            .process(approved)
            .await?;
        self.stage_completed(
            events,
            run_id,
            Stage::Processing,
            started,
            format!(
                "{} succeeded, {} failed, {} drafts",
                summary.succeeded, summary.failed, summary.drafts_generated
            ),
        )
        .await?;

        // Stage 3: registry update from what is on disk
        let started = self.stage_started(events, run_id, Stage::RegistryUpdate).await?;
        let companies: Vec<CompanyRecord> = self.store.load(&companies_key(run_id)).await?;
        let added = DedupGate::record_successes(&self.store, run_id, &companies).await?;
        events
            .append(&Event::new(
                run_id,
                Some(Stage::RegistryUpdate),
                EventType::RegistryUpdated,
                format!("{} domains added to the contacted registry", added),
            ))
            .await?;
        self.stage_completed(
            events,
            run_id,
            Stage::RegistryUpdate,
            started,
            format!("{} registry entries added", added),
        )
        .await?;

        info!(
            %run_id,
            actions = budget.actions_used(),
            elapsed_seconds = budget.elapsed_seconds(),
            "Run stages finished"
        );
        Ok(())
    }

    async fn stage_started(
        &self,
        events: &EventStore,
        run_id: Uuid,
        stage: Stage,
    ) -> Result<Instant, PipelineError> {
        info!(%stage, "Stage started");
        events
            .append(&Event::new(
                run_id,
                Some(stage),
                EventType::StageStarted,
                format!("Stage '{}' started", stage),
            ))
            .await?;
        Ok(Instant::now())
    }

    async fn stage_completed(
        &self,
        events: &EventStore,
        run_id: Uuid,
        stage: Stage,
        started: Instant,
        summary: String,
    ) -> Result<(), PipelineError> {
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(%stage, duration_ms, %summary, "Stage completed");
        events
            .append(
                &Event::new(run_id, Some(stage), EventType::StageCompleted, summary)
                    .with_duration(duration_ms),
            )
            .await
    }

    /// Record the final outcome in the run log (best effort)
    async fn finish(&self, run_id: Uuid, events: &EventStore, result: &Result<(), PipelineError>) {
        let mut final_events = Vec::new();

        match result {
            Ok(()) => final_events.push(Event::new(
                run_id,
                None,
                EventType::RunCompleted,
                "Run completed",
            )),
            Err(e) => {
                if let PipelineError::BudgetExceeded(violation) = e {
                    final_events.push(
                        Event::new(run_id, None, EventType::BudgetExceeded, "Action budget exhausted")
                            .with_error(violation.to_string()),
                    );
                }
                final_events.push(
                    Event::new(run_id, None, EventType::RunFailed, "Run failed")
                        .with_error(e.to_string()),
                );
            }
        }

        for event in final_events {
            if let Err(e) = events.append(&event).await {
                warn!(error = %e, "Could not record run outcome");
            }
        }
    }

    /// Recompute statistics from the artifacts on disk
    pub async fn collect_stats(&self, run_id: Uuid) -> RunStats {
        collect_stats(&self.store, run_id).await
    }
}

/// Statistics of a run, read from its artifacts. Unreadable artifacts count as zero.
pub async fn collect_stats(store: &WorkspaceStore, run_id: Uuid) -> RunStats {
    let mut stats = RunStats::default();

    match store.load::<CompanyRecord>(&companies_key(run_id)).await {
        Ok(companies) => {
            for company in &companies {
                if company.selected {
                    stats.companies_selected += 1;
                }
                match company.status {
                    CompanyStatus::Success => stats.companies_researched += 1,
                    CompanyStatus::Failed => stats.companies_failed += 1,
                    CompanyStatus::Pending => {}
                }
            }
        }
        Err(e) => warn!(error = %e, "Could not read companies"),
    }

    match store.list(&contacts_dir_key(run_id)).await {
        Ok(keys) => {
            for key in keys {
                match store.load::<ContactRecord>(&key).await {
                    Ok(contacts) => stats.contacts_found += contacts.len() as u32,
                    Err(e) => warn!(%key, error = %e, "Could not read contacts"),
                }
            }
        }
        Err(e) => warn!(error = %e, "Could not list contacts"),
    }

    match store.load::<DraftRecord>(&drafts_key(run_id)).await {
        Ok(drafts) => stats.drafts_generated = drafts.len() as u32,
        Err(e) => warn!(error = %e, "Could not read drafts"),
    }

    stats
}
