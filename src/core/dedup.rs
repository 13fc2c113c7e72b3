//! Cross-run dedup gate.
//!
//! Domains in the contacted registry, and domains matching a configured
//! exclusion pattern, are never proposed for review. After processing, only
//! SUCCESS companies are added to the registry so failed companies stay
//! eligible for a later run.

use std::collections::HashSet;

use glob::Pattern;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::PipelineError;
use super::store::WorkspaceStore;
use crate::config::paths::CONTACTED;
use crate::domain::{normalize_domain, CompanyRecord, CompanyStatus, ContactedEntry};

/// Exclusion filter built from the contacted registry and config patterns
#[derive(Debug, Clone, Default)]
pub struct DedupGate {
    contacted: HashSet<String>,
    excluded: Vec<Pattern>,
}

impl DedupGate {
    /// Load the contacted registry from the workspace
    pub async fn load(
        store: &WorkspaceStore,
        excluded_patterns: &[String],
    ) -> Result<Self, PipelineError> {
        let entries: Vec<ContactedEntry> = store.load(CONTACTED).await?;
        let gate = Self::from_parts(entries.into_iter().map(|e| e.domain), excluded_patterns)?;

        info!(
            contacted = gate.contacted.len(),
            patterns = gate.excluded.len(),
            "Dedup registry loaded"
        );
        Ok(gate)
    }

    /// Build a gate from known domains and glob patterns
    pub fn from_parts<I>(contacted: I, excluded_patterns: &[String]) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = String>,
    {
        let excluded = excluded_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    PipelineError::Configuration(format!("Invalid domain pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            contacted: contacted
                .into_iter()
                .map(|d| normalize_domain(&d))
                .filter(|d| !d.is_empty())
                .collect(),
            excluded,
        })
    }

    /// Whether a domain must not be proposed
    pub fn is_excluded(&self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        self.contacted.contains(&domain) || self.excluded.iter().any(|p| p.matches(&domain))
    }

    /// Drop excluded companies, keeping the order of the rest
    pub fn filter(&self, companies: Vec<CompanyRecord>) -> Vec<CompanyRecord> {
        companies
            .into_iter()
            .filter(|company| {
                let excluded = self.is_excluded(&company.domain);
                if excluded {
                    debug!(domain = %company.domain, "Dropping previously contacted or excluded domain");
                }
                !excluded
            })
            .collect()
    }

    /// Registry domains, sorted, for handing to discovery
    pub fn known_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.contacted.iter().cloned().collect();
        domains.sort();
        domains
    }

    pub fn len(&self) -> usize {
        self.contacted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacted.is_empty()
    }

    /// Append one registry entry per SUCCESS company not yet registered.
    ///
    /// Reads the registry fresh under the store lock; first write wins on
    /// domain. Returns the number of entries added.
    pub async fn record_successes(
        store: &WorkspaceStore,
        run_id: Uuid,
        companies: &[CompanyRecord],
    ) -> Result<usize, PipelineError> {
        let successes: Vec<&CompanyRecord> = companies
            .iter()
            .filter(|c| c.status == CompanyStatus::Success)
            .collect();

        if successes.is_empty() {
            return Ok(0);
        }

        let added = store
            .mutate(CONTACTED, |entries: &mut Vec<ContactedEntry>| {
                let mut known: HashSet<String> =
                    entries.iter().map(|e| normalize_domain(&e.domain)).collect();
                let before = entries.len();

                for company in &successes {
                    if known.insert(normalize_domain(&company.domain)) {
                        entries.push(ContactedEntry::from_company(company, run_id));
                    }
                }

                entries.len() - before
            })
            .await?;

        info!(%run_id, added, "Contacted registry updated");
        Ok(added)
    }
}
