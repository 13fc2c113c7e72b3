//! Capability traits served by a remote provider over a [`Transport`].
//!
//! Operation names and payloads:
//!
//! | Operation | Request | Reply |
//! |-----------|---------|-------|
//! | `discover` | `DiscoveryRequest` | `{companies: [...]}` |
//! | `search` | `{query, maxResults, topic}` | `{text}` |
//! | `lookup_contacts` | `{domain, limit}` | `LookupResponse` |
//! | `compose` | `ComposeRequest` | `ComposedDraft` |
//! | `send_message` | `{draft}` | `SendReceipt` |

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{
    CompanyCandidate, ComposeRequest, ComposedDraft, ContactLookup, DiscoveryAgent,
    DiscoveryRequest, DraftComposer, LookupResponse, MessageSender, Researcher, SearchTopic,
    SendReceipt, Transport, SEARCH_FAILURE_PREFIX,
};
use crate::config::clamp_contact_limit;
use crate::domain::DraftRecord;

/// All remote capabilities behind one transport
pub struct RemoteCapabilities<T> {
    transport: T,
}

#[derive(Debug, Deserialize)]
struct DiscoveryReply {
    #[serde(default)]
    companies: Vec<CompanyCandidate>,
}

#[derive(Debug, Deserialize)]
struct SearchReply {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs<'a> {
    query: &'a str,
    max_results: u32,
    topic: SearchTopic,
}

impl<T: Transport> RemoteCapabilities<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn invoke<R: DeserializeOwned>(&self, operation: &str, request: serde_json::Value) -> Result<R> {
        debug!(transport = self.transport.name(), operation, "Calling capability");
        let reply = self.transport.call(operation, request).await?;
        serde_json::from_value(reply)
            .with_context(|| format!("Unexpected reply shape from '{}'", operation))
    }
}

#[async_trait]
impl<T: Transport> DiscoveryAgent for RemoteCapabilities<T> {
    async fn discover(&self, request: &DiscoveryRequest) -> Result<Vec<CompanyCandidate>> {
        let reply: DiscoveryReply = self.invoke("discover", serde_json::to_value(request)?).await?;
        Ok(reply.companies)
    }
}

#[async_trait]
impl<T: Transport> Researcher for RemoteCapabilities<T> {
    async fn search(&self, query: &str, max_results: u32, topic: SearchTopic) -> String {
        let args = SearchArgs {
            query,
            max_results,
            topic,
        };

        let result = match serde_json::to_value(&args) {
            Ok(request) => self.invoke::<SearchReply>("search", request).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(reply) => reply.text,
            Err(e) => {
                warn!(query, error = %e, "Search failed");
                format!("{} {:#}", SEARCH_FAILURE_PREFIX, e)
            }
        }
    }
}

#[async_trait]
impl<T: Transport> ContactLookup for RemoteCapabilities<T> {
    async fn lookup_contacts(&self, domain: &str, limit: u32) -> Result<LookupResponse> {
        self.invoke(
            "lookup_contacts",
            json!({ "domain": domain, "limit": clamp_contact_limit(limit) }),
        )
        .await
    }
}

#[async_trait]
impl<T: Transport> DraftComposer for RemoteCapabilities<T> {
    async fn compose(&self, request: &ComposeRequest) -> Result<ComposedDraft> {
        self.invoke("compose", serde_json::to_value(request)?).await
    }
}

#[async_trait]
impl<T: Transport> MessageSender for RemoteCapabilities<T> {
    async fn send_message(&self, draft: &DraftRecord) -> Result<SendReceipt> {
        self.invoke("send_message", json!({ "draft": draft })).await
    }
}
