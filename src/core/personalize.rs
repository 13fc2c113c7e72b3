//! Per-contact personalization.
//!
//! One research call, one compose call, one draft. What the message may say
//! about the person depends on what the research actually verified:
//!
//! | Tier | When | Material handed to compose |
//! |------|------|----------------------------|
//! | `verified_search` | search text names the contact | search text |
//! | `title_based` | otherwise, contact has a title | title only |
//! | `company_based` | otherwise | company only |

use tracing::{debug, info};

use super::error::PipelineError;
use super::workers::WorkerContext;
use crate::capabilities::{is_search_failure, ComposeRequest, SearchTopic};
use crate::config::paths::drafts_key;
use crate::domain::{
    derive_draft_id, disambiguate_id, CompanyRecord, CompanyRef, ContactRecord, DraftRecord,
    DraftStatus, PersonalizationNotes, SourceTier,
};

/// Longest evidence excerpt stored with a draft
pub const MAX_EVIDENCE_CHARS: usize = 280;

/// Results requested per contact search
const CONTACT_SEARCH_RESULTS: u32 = 5;

/// What a draft is allowed to be grounded on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grounding {
    pub tier: SourceTier,
    pub evidence: String,

    /// Research text, present only for `verified_search`
    pub research: Option<String>,
}

impl Grounding {
    /// Framing rule handed to the composer
    pub fn guidance(&self) -> &'static str {
        match self.tier {
            SourceTier::VerifiedSearch => {
                "Reference only facts stated in the research text. Make no other claims about the person."
            }
            SourceTier::TitleBased => {
                "Frame the message around the contact's role. Make no claims about the person beyond their title."
            }
            SourceTier::CompanyBased => {
                "Frame the message around the company. Make no claims about the person."
            }
        }
    }
}

/// Pick the strongest tier the material supports
pub fn classify(contact: &ContactRecord, company: &CompanyRecord, search_text: &str) -> Grounding {
    let name = contact.name.trim().to_lowercase();

    if !name.is_empty() && !is_search_failure(search_text) {
        let mention = search_text
            .lines()
            .map(str::trim)
            .find(|line| line.to_lowercase().contains(&name));

        if let Some(line) = mention {
            return Grounding {
                tier: SourceTier::VerifiedSearch,
                evidence: truncate_chars(line, MAX_EVIDENCE_CHARS),
                research: Some(search_text.to_string()),
            };
        }
    }

    let title = contact.title.trim();
    if !title.is_empty() {
        return Grounding {
            tier: SourceTier::TitleBased,
            evidence: title.to_string(),
            research: None,
        };
    }

    Grounding {
        tier: SourceTier::CompanyBased,
        evidence: company
            .description
            .as_deref()
            .map(|d| truncate_chars(d, MAX_EVIDENCE_CHARS))
            .unwrap_or_else(|| company.name.clone()),
        research: None,
    }
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Researches one contact and appends one draft to the run's drafts
pub struct ContactPersonalizationWorker<'a> {
    ctx: &'a WorkerContext,
    company: &'a CompanyRecord,
}

impl<'a> ContactPersonalizationWorker<'a> {
    pub fn new(ctx: &'a WorkerContext, company: &'a CompanyRecord) -> Self {
        Self { ctx, company }
    }

    pub async fn run(&self, contact: ContactRecord) -> Result<DraftRecord, PipelineError> {
        let company = self.company;

        self.ctx.budget.charge("search")?;
        let query = format!("\"{}\" {} {}", contact.name, contact.title, company.name);
        let search_text = self
            .ctx
            .capabilities
            .researcher
            .search(query.trim(), CONTACT_SEARCH_RESULTS, SearchTopic::General)
            .await;

        let grounding = classify(&contact, company, &search_text);
        debug!(
            domain = %company.domain,
            contact = %contact.name,
            tier = %grounding.tier,
            "Personalization tier selected"
        );

        let request = ComposeRequest {
            contact: contact.clone(),
            company: CompanyRef::from(company),
            company_description: company.description.clone(),
            source_tier: grounding.tier,
            research: grounding.research.clone(),
            guidance: grounding.guidance().to_string(),
        };

        self.ctx.budget.charge("compose")?;
        let composed = self
            .ctx
            .capabilities
            .composer
            .compose(&request)
            .await
            .map_err(|e| PipelineError::capability("compose", format!("{:#}", e)))?;

        if composed.subject.trim().is_empty() || composed.body.trim().is_empty() {
            return Err(PipelineError::capability(
                "compose",
                "returned an empty subject or body",
            ));
        }

        let base_id = derive_draft_id(&company.domain, &contact);
        let mut draft = DraftRecord {
            id: base_id.clone(),
            contact,
            company: CompanyRef::from(company),
            subject: composed.subject,
            body: composed.body,
            personalization_notes: PersonalizationNotes {
                source_tier: grounding.tier,
                evidence: grounding.evidence,
                approach: composed.approach,
            },
            status: DraftStatus::Draft,
            sent_at: None,
            message_id: None,
            error: None,
        };

        let stored = self
            .ctx
            .store
            .mutate(&drafts_key(self.ctx.run_id), |drafts: &mut Vec<DraftRecord>| {
                draft.id = disambiguate_id(&base_id, drafts.iter().map(|d| d.id.as_str()));
                drafts.push(draft.clone());
                draft
            })
            .await?;

        info!(
            draft = %stored.id,
            tier = %stored.personalization_notes.source_tier,
            "Draft written"
        );
        Ok(stored)
    }
}
