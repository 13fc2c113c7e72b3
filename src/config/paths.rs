//! Canonical workspace layout.
//!
//! Single source of truth - use these helpers instead of hardcoding paths.
//!
//! | Location | Contents |
//! |----------|----------|
//! | `<home>/contacted.json` | Cross-run dedup registry |
//! | `<home>/runs/<run_id>/companies.json` | Companies of one run |
//! | `<home>/runs/<run_id>/contacts/<domain-slug>-<hash>.json` | Contacts per company |
//! | `<home>/runs/<run_id>/drafts.json` | Drafts of one run |
//! | `<home>/runs/<run_id>/events.jsonl` | Run log |
//!
//! Collection keys are paths relative to the workspace home and are what the
//! store locks on.

use std::path::{Path, PathBuf};

use anyhow::Result;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::slugify;

/// Key of the cross-run contacted registry
pub const CONTACTED: &str = "contacted.json";

/// Directory (relative to home) holding one directory per run
pub const RUNS_DIR: &str = "runs";

/// A workspace rooted at a home directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    home: PathBuf,
}

impl Workspace {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Workspace from the resolved global configuration
    pub fn from_config() -> Result<Self> {
        Ok(Self::new(crate::config::outreach_home()?))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.home.join(RUNS_DIR)
    }

    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.runs_dir().join(run_id.to_string())
    }

    pub fn contacted_path(&self) -> PathBuf {
        self.home.join(CONTACTED)
    }

    /// Absolute path of a collection key
    pub fn resolve(&self, key: &str) -> PathBuf {
        self.home.join(key)
    }
}

/// `runs/<run_id>/companies.json`
pub fn companies_key(run_id: Uuid) -> String {
    format!("{}/{}/companies.json", RUNS_DIR, run_id)
}

/// `runs/<run_id>/drafts.json`
pub fn drafts_key(run_id: Uuid) -> String {
    format!("{}/{}/drafts.json", RUNS_DIR, run_id)
}

/// `runs/<run_id>/contacts`
pub fn contacts_dir_key(run_id: Uuid) -> String {
    format!("{}/{}/contacts", RUNS_DIR, run_id)
}

/// `runs/<run_id>/contacts/<domain-slug>-<hash>.json`
///
/// The slug alone is lossy (`my-site.io` and `my.site.io` both become
/// `my-site-io`), so the file name carries a short digest of the domain.
pub fn contacts_key(run_id: Uuid, domain: &str) -> String {
    let digest = hex::encode(Sha256::digest(domain.as_bytes()));
    format!(
        "{}/{}-{}.json",
        contacts_dir_key(run_id),
        slugify(domain),
        &digest[..8]
    )
}
