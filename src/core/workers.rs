//! Company worker pool.
//!
//! Every approved company gets its own spawned task. A task researches the
//! company, looks up its people, persists them, then fans out one
//! personalization worker per contact and waits for all of them before
//! marking the company SUCCESS. Capability failures stay inside the company
//! that hit them; fatal errors are collected and returned once every task has
//! been joined.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::PipelineError;
use super::event_store::EventStore;
use super::personalize::{truncate_chars, ContactPersonalizationWorker};
use super::safety::BudgetTracker;
use super::store::WorkspaceStore;
use crate::capabilities::{is_search_failure, Capabilities, SearchTopic};
use crate::config::paths::{companies_key, contacts_key};
use crate::domain::{CompanyRecord, ContactRecord, Event, EventType, Stage};

/// Longest company description kept from research
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Failure reason for companies without reachable contacts
pub const NO_CONTACTS_FOUND: &str = "No contacts found";

/// Results requested for a company description search
const COMPANY_SEARCH_RESULTS: u32 = 3;

/// Everything a worker needs, shared read-only across all workers of a run
pub struct WorkerContext {
    pub run_id: Uuid,
    pub store: Arc<WorkspaceStore>,
    pub capabilities: Capabilities,
    pub budget: Arc<BudgetTracker>,

    /// Contacts requested per company, already clamped
    pub contact_limit: u32,

    pub events: Option<EventStore>,
}

impl WorkerContext {
    async fn log(&self, event: Event) -> Result<(), PipelineError> {
        if let Some(events) = &self.events {
            events.append(&event).await?;
        }
        Ok(())
    }
}

/// Aggregate of one processing stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSummary {
    pub succeeded: u32,
    pub failed: u32,
    pub drafts_generated: u32,
}

/// How one company worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum CompanyOutcome {
    Succeeded { drafts: u32 },
    Failed,
}

pub struct CompanyWorkerPool {
    ctx: Arc<WorkerContext>,
}

impl CompanyWorkerPool {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Process every company concurrently and wait for all of them
    pub async fn process(&self, companies: Vec<CompanyRecord>) -> Result<PoolSummary, PipelineError> {
        info!(companies = companies.len(), "Dispatching company workers");

        let (pending, handles): (Vec<_>, Vec<_>) = companies
            .into_iter()
            .map(|company| {
                let ctx = Arc::clone(&self.ctx);
                let snapshot = company.clone();
                let handle = tokio::spawn(async move { process_company(&ctx, company).await });
                (snapshot, handle)
            })
            .unzip();

        let results = join_all(handles).await;

        let mut summary = PoolSummary::default();
        let mut first_fatal: Option<PipelineError> = None;

        for (company, result) in pending.into_iter().zip(results) {
            match result {
                Ok(Ok(CompanyOutcome::Succeeded { drafts })) => {
                    summary.succeeded += 1;
                    summary.drafts_generated += drafts;
                }
                Ok(Ok(CompanyOutcome::Failed)) => summary.failed += 1,
                Ok(Err(fatal)) => {
                    error!(domain = %company.domain, error = %fatal, "Company worker hit a fatal error");
                    summary.failed += 1;
                    self.record_abandoned(company, &fatal.to_string()).await;
                    first_fatal.get_or_insert(fatal);
                }
                Err(join_error) => {
                    error!(domain = %company.domain, error = %join_error, "Company worker panicked");
                    summary.failed += 1;
                    self.record_abandoned(company, &format!("worker panicked: {}", join_error))
                        .await;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            drafts = summary.drafts_generated,
            "Company workers finished"
        );

        match first_fatal {
            Some(fatal) => Err(fatal),
            None => Ok(summary),
        }
    }

    /// Best-effort FAILED record for a worker that never reached a terminal status
    async fn record_abandoned(&self, mut company: CompanyRecord, reason: &str) {
        if !company.fail(reason) {
            return;
        }
        if let Err(e) = upsert_company(&self.ctx, company).await {
            warn!(error = %e, "Could not record abandoned company");
        }
    }
}

async fn process_company(
    ctx: &WorkerContext,
    mut company: CompanyRecord,
) -> Result<CompanyOutcome, PipelineError> {
    if company.description.is_none() {
        ctx.budget.charge("search")?;
        let text = ctx
            .capabilities
            .researcher
            .search(
                &format!("{} {} company overview", company.name, company.domain),
                COMPANY_SEARCH_RESULTS,
                SearchTopic::General,
            )
            .await;

        if is_search_failure(&text) {
            warn!(domain = %company.domain, %text, "Company research failed");
        } else if !text.trim().is_empty() {
            company.description = Some(truncate_chars(text.trim(), MAX_DESCRIPTION_CHARS));
        }
    }

    ctx.budget.charge("lookup_contacts")?;
    let response = match ctx
        .capabilities
        .lookup
        .lookup_contacts(&company.domain, ctx.contact_limit)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            let failure = PipelineError::capability("lookup_contacts", format!("{:#}", e));
            return fail_company(ctx, company, &failure.to_string()).await;
        }
    };

    if !response.success {
        warn!(
            domain = %company.domain,
            reason = %response.failure_summary(),
            "Contact lookup unsuccessful"
        );
    }

    let mut contacts = response.contacts();
    let limit = ctx.contact_limit as usize;
    if contacts.len() > limit {
        debug!(
            domain = %company.domain,
            returned = contacts.len(),
            limit,
            "Lookup returned more contacts than requested"
        );
        contacts.truncate(limit);
    }
    if contacts.is_empty() {
        return fail_company(ctx, company, NO_CONTACTS_FOUND).await;
    }

    ctx.store
        .replace(&contacts_key(ctx.run_id, &company.domain), contacts.clone())
        .await?;

    let contacts_found = contacts.len() as u32;
    let drafts = personalize_all(ctx, &company, contacts).await?;

    company.complete(contacts_found, drafts);
    upsert_company(ctx, company.clone()).await?;

    info!(domain = %company.domain, contacts_found, drafts, "Company processed");
    ctx.log(Event::new(
        ctx.run_id,
        Some(Stage::Processing),
        EventType::CompanyCompleted,
        format!(
            "{}: {} contacts, {} drafts",
            company.domain, contacts_found, drafts
        ),
    ))
    .await?;

    Ok(CompanyOutcome::Succeeded { drafts })
}

/// Run every contact worker of one company together; returns drafts written
async fn personalize_all(
    ctx: &WorkerContext,
    company: &CompanyRecord,
    contacts: Vec<ContactRecord>,
) -> Result<u32, PipelineError> {
    let worker = ContactPersonalizationWorker::new(ctx, company);
    let results = join_all(contacts.into_iter().map(|contact| worker.run(contact))).await;

    let mut drafts = 0;
    let mut first_fatal = None;

    for result in results {
        match result {
            Ok(_) => drafts += 1,
            Err(e) if !e.is_fatal() => {
                warn!(domain = %company.domain, error = %e, "Personalization failed");
            }
            Err(e) => {
                first_fatal.get_or_insert(e);
            }
        }
    }

    match first_fatal {
        Some(fatal) => Err(fatal),
        None => Ok(drafts),
    }
}

async fn fail_company(
    ctx: &WorkerContext,
    mut company: CompanyRecord,
    reason: &str,
) -> Result<CompanyOutcome, PipelineError> {
    warn!(domain = %company.domain, reason, "Company failed");
    company.fail(reason);
    let domain = company.domain.clone();
    upsert_company(ctx, company).await?;

    ctx.log(
        Event::new(
            ctx.run_id,
            Some(Stage::Processing),
            EventType::CompanyFailed,
            format!("{} failed", domain),
        )
        .with_error(reason),
    )
    .await?;

    Ok(CompanyOutcome::Failed)
}

/// Insert or replace the record for this domain, never leaving a terminal status
async fn upsert_company(ctx: &WorkerContext, record: CompanyRecord) -> Result<bool, PipelineError> {
    let domain = record.domain.clone();

    let applied = ctx
        .store
        .mutate(&companies_key(ctx.run_id), move |records: &mut Vec<CompanyRecord>| {
            match records.iter_mut().find(|r| r.domain == record.domain) {
                Some(existing) if existing.is_terminal() => false,
                Some(existing) => {
                    *existing = record;
                    true
                }
                None => {
                    records.push(record);
                    true
                }
            }
        })
        .await?;

    if !applied {
        warn!(%domain, "Refusing to overwrite a company that already finished");
    }
    Ok(applied)
}
