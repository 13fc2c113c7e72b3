//! Outreach drafts produced by personalization workers.
//!
//! A draft is created in `draft` status and moves exactly once to `sent` or
//! `failed` during the send phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::company::{slugify, CompanyRef};
use super::contact::ContactRecord;

/// A personalized message for one contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    /// Unique within a run, derived from company and contact
    pub id: String,

    pub contact: ContactRecord,

    pub company: CompanyRef,

    pub subject: String,

    pub body: String,

    pub personalization_notes: PersonalizationNotes,

    #[serde(default)]
    pub status: DraftStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DraftRecord {
    /// Mark the draft as sent. Returns false if it already left `draft`.
    pub fn mark_sent(&mut self, message_id: impl Into<String>) -> bool {
        if self.status != DraftStatus::Draft {
            return false;
        }
        self.status = DraftStatus::Sent;
        self.message_id = Some(message_id.into());
        self.sent_at = Some(Utc::now());
        self.error = None;
        true
    }

    /// Record a delivery attempt that did not go through. The draft stays
    /// in `draft` so the next send retries it. Returns false if it already
    /// left `draft`.
    pub fn record_send_error(&mut self, error: impl Into<String>) -> bool {
        if self.status != DraftStatus::Draft {
            return false;
        }
        self.error = Some(error.into());
        true
    }

    /// Mark the draft as permanently undeliverable. Returns false if it
    /// already left `draft`.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        if self.status != DraftStatus::Draft {
            return false;
        }
        self.status = DraftStatus::Failed;
        self.error = Some(error.into());
        true
    }

    pub fn is_pending_send(&self) -> bool {
        self.status == DraftStatus::Draft
    }
}

/// Delivery status of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Sent,
    Failed,
}

impl Default for DraftStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// What the personalization was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationNotes {
    pub source_tier: SourceTier,

    /// Material supporting the tier (search excerpt, title, or company facts)
    pub evidence: String,

    /// Angle the message takes, as reported by content generation
    pub approach: String,
}

/// Grounding tiers, strongest first.
///
/// Only `VerifiedSearch` may reference facts about the person; the other
/// tiers frame the message around the role or the company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// A search result that names the contact
    VerifiedSearch,

    /// The contact's job title
    TitleBased,

    /// Company-level facts only
    CompanyBased,
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VerifiedSearch => write!(f, "verified_search"),
            Self::TitleBased => write!(f, "title_based"),
            Self::CompanyBased => write!(f, "company_based"),
        }
    }
}

/// Derive the base draft id: `<domain-slug>--<contact-slug>`.
///
/// Falls back to the email local part, then to `contact`, when the name has
/// no usable characters.
pub fn derive_draft_id(domain: &str, contact: &ContactRecord) -> String {
    let mut contact_slug = slugify(&contact.name);
    if contact_slug.is_empty() {
        contact_slug = slugify(contact.email_local_part());
    }
    if contact_slug.is_empty() {
        contact_slug = "contact".to_string();
    }
    format!("{}--{}", slugify(domain), contact_slug)
}

/// Return `base` if unused, otherwise the first free `base-2`, `base-3`, ...
pub fn disambiguate_id<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: std::collections::HashSet<&str> = existing.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }

    let mut suffix = 2u32;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}
