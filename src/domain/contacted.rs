//! Entries in the cross-run contacted registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::company::CompanyRecord;

/// One successfully contacted company, keyed by domain.
///
/// Entries are only ever appended to `contacted.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactedEntry {
    pub domain: String,
    pub name: String,
    pub contacted_at: DateTime<Utc>,
    pub run_id: Uuid,
}

impl ContactedEntry {
    pub fn from_company(company: &CompanyRecord, run_id: Uuid) -> Self {
        Self {
            domain: company.domain.clone(),
            name: company.name.clone(),
            contacted_at: company.processed_at.unwrap_or_else(Utc::now),
            run_id,
        }
    }
}
