//! Contacts returned by the lookup capability.

use serde::{Deserialize, Serialize};

/// A person at a company, written once per company and never modified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,

    #[serde(default)]
    pub title: String,

    pub email: String,
}

impl ContactRecord {
    pub fn new(name: impl Into<String>, title: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            email: email.into(),
        }
    }

    /// Local part of the email address (`jane` for `jane@acme.io`)
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }

    /// A contact is usable only if it has somewhere to send to
    pub fn is_reachable(&self) -> bool {
        let email = self.email.trim();
        !email.is_empty() && email.contains('@')
    }
}
