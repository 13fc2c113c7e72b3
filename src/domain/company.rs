//! Company records tracked through a run.
//!
//! A company enters a run as a PENDING proposal and leaves it as either
//! SUCCESS or FAILED. The terminal transition is made exactly once by the
//! worker that owns the company's domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A company proposed by discovery and processed by a company worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    /// Display name
    pub name: String,

    /// Normalized domain (unique key within a run)
    pub domain: String,

    /// Short description, filled by research when discovery left it empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Why discovery considers this company a good fit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_good_fit: Option<String>,

    /// Whether the human approved this company for processing
    #[serde(default)]
    pub selected: bool,

    /// Processing status
    #[serde(default)]
    pub status: CompanyStatus,

    /// Number of contacts the lookup returned
    #[serde(default)]
    pub contacts_found: u32,

    /// Number of drafts written for this company
    #[serde(default)]
    pub drafts_generated: u32,

    /// When the worker reached a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,

    /// Why the company failed (FAILED only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl CompanyRecord {
    /// Create a pending, unselected record
    pub fn new(name: impl Into<String>, domain: &str) -> Self {
        Self {
            name: name.into(),
            domain: normalize_domain(domain),
            description: None,
            why_good_fit: None,
            selected: false,
            status: CompanyStatus::Pending,
            contacts_found: 0,
            drafts_generated: 0,
            processed_at: None,
            failure_reason: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_why_good_fit(mut self, why: impl Into<String>) -> Self {
        self.why_good_fit = Some(why.into());
        self
    }

    /// Mark the record SUCCESS with aggregated counts.
    ///
    /// Returns false (and leaves the record untouched) if it is already terminal.
    pub fn complete(&mut self, contacts_found: u32, drafts_generated: u32) -> bool {
        if !self.status.can_transition_to(CompanyStatus::Success) {
            return false;
        }
        self.status = CompanyStatus::Success;
        self.contacts_found = contacts_found;
        self.drafts_generated = drafts_generated;
        self.processed_at = Some(Utc::now());
        self.failure_reason = None;
        true
    }

    /// Mark the record FAILED with a reason.
    ///
    /// Returns false (and leaves the record untouched) if it is already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if !self.status.can_transition_to(CompanyStatus::Failed) {
            return false;
        }
        self.status = CompanyStatus::Failed;
        self.processed_at = Some(Utc::now());
        self.failure_reason = Some(reason.into());
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Processing status of a company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    /// Approved but not yet processed
    Pending,

    /// Contacts found and personalization finished
    Success,

    /// Lookup or research failed
    Failed,
}

impl Default for CompanyStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl CompanyStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Only PENDING -> SUCCESS and PENDING -> FAILED are allowed
    pub fn can_transition_to(self, next: CompanyStatus) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Reference to a company embedded in other records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub name: String,
    pub domain: String,
}

impl From<&CompanyRecord> for CompanyRef {
    fn from(record: &CompanyRecord) -> Self {
        Self {
            name: record.name.clone(),
            domain: record.domain.clone(),
        }
    }
}

/// Normalize a domain for use as a dedup and record key.
///
/// `https://www.Example.com/about` -> `example.com`
pub fn normalize_domain(raw: &str) -> String {
    let mut domain = raw.trim().to_lowercase();

    for scheme in ["https://", "http://"] {
        if let Some(rest) = domain.strip_prefix(scheme) {
            domain = rest.to_string();
            break;
        }
    }

    if let Some(end) = domain.find(|c| matches!(c, '/' | '?' | '#')) {
        domain.truncate(end);
    }

    if let Some(rest) = domain.strip_prefix("www.") {
        domain = rest.to_string();
    }

    domain.trim_end_matches('.').to_string()
}

/// Lowercase slug with runs of non-alphanumerics collapsed to `-`
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
