//! Interfaces to the external capabilities the pipeline consumes.
//!
//! The core never reasons, searches, looks people up or delivers mail
//! itself. It calls these traits and persists what comes back. Concrete
//! implementations speak JSON over a [`Transport`] (subprocess or HTTP); the
//! approval prompt talks to the terminal.

pub mod command;
pub mod http;
pub mod prompt;
pub mod remote;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Backend, ResolvedConfig};
use crate::domain::{CompanyRecord, CompanyRef, ContactRecord, DraftRecord, SourceTier};

pub use command::CommandTransport;
pub use http::HttpTransport;
pub use prompt::{AutoApprove, PromptError, PromptResponse, TerminalPrompt};
pub use remote::RemoteCapabilities;

/// Search replies that start with this prefix describe a failure
pub const SEARCH_FAILURE_PREFIX: &str = "Search failed:";

/// Whether a search reply is a failure description rather than results
pub fn is_search_failure(text: &str) -> bool {
    text.trim_start().starts_with(SEARCH_FAILURE_PREFIX)
}

/// Search topic hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTopic {
    General,
    News,
}

/// Input to the discovery capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequest {
    /// What kind of companies to look for
    pub instruction: String,

    /// How many companies the run will review
    pub max_companies: u32,

    /// Domains discovery should not return
    pub excluded_domains: Vec<String>,

    /// Reviewer feedback from earlier rejected proposals, oldest first
    pub feedback: Vec<String>,
}

/// A company as returned by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyCandidate {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub why_good_fit: Option<String>,
}

impl From<CompanyCandidate> for CompanyRecord {
    fn from(candidate: CompanyCandidate) -> Self {
        let mut record = CompanyRecord::new(candidate.name, &candidate.domain);
        record.description = candidate.description.filter(|d| !d.trim().is_empty());
        record.why_good_fit = candidate.why_good_fit.filter(|w| !w.trim().is_empty());
        record
    }
}

/// A person returned by contact lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupPerson {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Reply of the contact lookup capability.
///
/// `{success: true, people, organization, domain}` or
/// `{success: false, error, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LookupResponse {
    pub success: bool,
    #[serde(default)]
    pub people: Vec<LookupPerson>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl LookupResponse {
    /// Reachable contacts (with an email); empty for unsuccessful lookups
    pub fn contacts(&self) -> Vec<ContactRecord> {
        if !self.success {
            return Vec::new();
        }

        self.people
            .iter()
            .map(|p| {
                ContactRecord::new(
                    p.name.trim(),
                    p.title.as_deref().unwrap_or_default().trim(),
                    p.email.as_deref().unwrap_or_default().trim(),
                )
            })
            .filter(ContactRecord::is_reachable)
            .collect()
    }

    /// Failure description for logs
    pub fn failure_summary(&self) -> String {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => format!("{}: {}", error, message),
            (Some(error), None) => error.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "no people returned".to_string(),
        }
    }
}

/// Input to the content generation capability.
///
/// `research` is only populated for the verified-search tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeRequest {
    pub contact: ContactRecord,
    pub company: CompanyRef,
    pub company_description: Option<String>,
    pub source_tier: SourceTier,
    pub research: Option<String>,

    /// Framing rule the message must follow for this tier
    pub guidance: String,
}

/// Reply of the content generation capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedDraft {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub approach: String,
}

/// Reply of the message transport for one draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub success: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Web/news search. Never fails: errors come back as `Search failed: ...` text.
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn search(&self, query: &str, max_results: u32, topic: SearchTopic) -> String;
}

/// People lookup for a company domain
#[async_trait]
pub trait ContactLookup: Send + Sync {
    async fn lookup_contacts(&self, domain: &str, limit: u32) -> Result<LookupResponse>;
}

/// Company discovery
#[async_trait]
pub trait DiscoveryAgent: Send + Sync {
    async fn discover(&self, request: &DiscoveryRequest) -> Result<Vec<CompanyCandidate>>;
}

/// Content generation for one draft
#[async_trait]
pub trait DraftComposer: Send + Sync {
    async fn compose(&self, request: &ComposeRequest) -> Result<ComposedDraft>;
}

/// Message delivery, one draft per call
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, draft: &DraftRecord) -> Result<SendReceipt>;
}

/// Human approval of a proposed company list
#[async_trait]
pub trait ApprovalPrompt: Send + Sync {
    async fn request_approval(
        &self,
        companies: &[CompanyRecord],
    ) -> std::result::Result<PromptResponse, PromptError>;
}

/// JSON request/reply channel to a capability provider
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Invoke one operation
    async fn call(&self, operation: &str, request: Value) -> Result<Value>;
}

/// Everything a run needs from the outside world
#[derive(Clone)]
pub struct Capabilities {
    pub discovery: Arc<dyn DiscoveryAgent>,
    pub researcher: Arc<dyn Researcher>,
    pub lookup: Arc<dyn ContactLookup>,
    pub composer: Arc<dyn DraftComposer>,
    pub prompt: Arc<dyn ApprovalPrompt>,
}

impl Capabilities {
    /// Serve every capability except the prompt from one remote provider
    pub fn from_remote<T>(remote: Arc<RemoteCapabilities<T>>, prompt: Arc<dyn ApprovalPrompt>) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            discovery: remote.clone(),
            researcher: remote.clone(),
            lookup: remote.clone(),
            composer: remote,
            prompt,
        }
    }
}

/// Build run capabilities and the message sender from configuration
pub fn from_config(
    config: &ResolvedConfig,
    prompt: Arc<dyn ApprovalPrompt>,
) -> Result<(Capabilities, Arc<dyn MessageSender>)> {
    match config.capabilities.backend {
        Backend::Command => {
            let remote = Arc::new(RemoteCapabilities::new(CommandTransport::from_config(
                &config.capabilities.command,
            )));
            Ok((Capabilities::from_remote(remote.clone(), prompt), remote))
        }
        Backend::Http => {
            let remote = Arc::new(RemoteCapabilities::new(HttpTransport::from_config(
                &config.capabilities.http,
            )?));
            Ok((Capabilities::from_remote(remote.clone(), prompt), remote))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_failure_detection() {
        assert!(is_search_failure("Search failed: rate limited"));
        assert!(is_search_failure("  Search failed: timeout"));
        assert!(!is_search_failure("Jane Doe joined Acme as CTO"));
    }

    #[test]
    fn test_lookup_contacts_drops_unreachable() {
        let response: LookupResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "people": [
                {"name": "Jane Doe", "title": "CTO", "email": "jane@acme.io"},
                {"name": "No Email", "title": "CEO"},
                {"name": "Bob", "email": "bob@acme.io"}
            ],
            "organization": "Acme",
            "domain": "acme.io"
        }))
        .unwrap();

        let contacts = response.contacts();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0], ContactRecord::new("Jane Doe", "CTO", "jane@acme.io"));
        assert_eq!(contacts[1].title, "");
    }

    #[test]
    fn test_unsuccessful_lookup_has_no_contacts() {
        let response: LookupResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "error": "not_found",
            "message": "No organization for y.com"
        }))
        .unwrap();

        assert!(response.contacts().is_empty());
        assert_eq!(response.failure_summary(), "not_found: No organization for y.com");
    }

    #[test]
    fn test_candidate_into_record() {
        let candidate = CompanyCandidate {
            name: "Acme".to_string(),
            domain: "https://www.Acme.io/".to_string(),
            description: Some("  ".to_string()),
            why_good_fit: Some("Hiring platform engineers".to_string()),
        };

        let record = CompanyRecord::from(candidate);
        assert_eq!(record.domain, "acme.io");
        assert_eq!(record.description, None);
        assert_eq!(record.why_good_fit.as_deref(), Some("Hiring platform engineers"));
        assert!(!record.selected);
    }
}
