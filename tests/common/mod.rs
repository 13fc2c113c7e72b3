//! Shared fakes for integration tests.
//!
//! Every capability is an in-memory stand-in so runs are deterministic and
//! need no subprocess or network.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use outreach::capabilities::{
    ApprovalPrompt, Capabilities, CompanyCandidate, ComposeRequest, ComposedDraft, ContactLookup,
    DiscoveryAgent, DiscoveryRequest, DraftComposer, LookupPerson, LookupResponse, MessageSender,
    PromptError, PromptResponse, Researcher, SearchTopic, SendReceipt,
};
use outreach::config::{CapabilitiesConfig, Preferences, ResolvedConfig};
use outreach::core::ActionBudget;
use outreach::domain::{CompanyRecord, DraftRecord};

pub fn candidate(name: &str, domain: &str) -> CompanyCandidate {
    CompanyCandidate {
        name: name.to_string(),
        domain: domain.to_string(),
        description: Some(format!("{} builds developer tools", name)),
        why_good_fit: Some("Matches the target".to_string()),
    }
}

pub fn person(name: &str, title: &str, email: &str) -> LookupPerson {
    LookupPerson {
        name: name.to_string(),
        title: Some(title.to_string()),
        email: Some(email.to_string()),
    }
}

pub fn test_config(home: &Path, max_outreach_per_run: u32) -> ResolvedConfig {
    ResolvedConfig {
        home: home.to_path_buf(),
        config_file: None,
        preferences: Preferences {
            max_outreach_per_run,
            target: "Developer tooling startups".to_string(),
            ..Default::default()
        },
        capabilities: CapabilitiesConfig::default(),
        budget: ActionBudget::default(),
    }
}

/// Discovery agent that plays back scripted rounds and records every request
#[derive(Default)]
pub struct ScriptedDiscovery {
    rounds: Mutex<VecDeque<Result<Vec<CompanyCandidate>, String>>>,
    requests: Mutex<Vec<DiscoveryRequest>>,
}

impl ScriptedDiscovery {
    pub fn new(rounds: Vec<Vec<CompanyCandidate>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            rounds: Mutex::new(VecDeque::from([Err(message.to_string())])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<DiscoveryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscoveryAgent for ScriptedDiscovery {
    async fn discover(&self, request: &DiscoveryRequest) -> Result<Vec<CompanyCandidate>> {
        self.requests.lock().unwrap().push(request.clone());
        match self.rounds.lock().unwrap().pop_front() {
            Some(Ok(candidates)) => Ok(candidates),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Researcher answering with the first scripted text whose needle is in the query
#[derive(Default)]
pub struct FakeResearcher {
    answers: Vec<(String, String)>,
    queries: Mutex<Vec<String>>,
}

impl FakeResearcher {
    pub fn with_answer(mut self, needle: &str, text: &str) -> Self {
        self.answers.push((needle.to_string(), text.to_string()));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Researcher for FakeResearcher {
    async fn search(&self, query: &str, _max_results: u32, _topic: SearchTopic) -> String {
        self.queries.lock().unwrap().push(query.to_string());
        self.answers
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, text)| text.clone())
            .unwrap_or_default()
    }
}

/// Contact lookup keyed by domain; unknown domains get two generic people
#[derive(Default)]
pub struct FakeLookup {
    responses: HashMap<String, LookupResponse>,
    errors: HashSet<String>,
    ignore_limit: bool,
    requested: Mutex<Vec<String>>,
}

impl FakeLookup {
    pub fn with_people(mut self, domain: &str, people: Vec<LookupPerson>) -> Self {
        self.responses.insert(
            domain.to_string(),
            LookupResponse {
                success: true,
                people,
                domain: Some(domain.to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_unsuccessful(mut self, domain: &str) -> Self {
        self.responses.insert(
            domain.to_string(),
            LookupResponse {
                success: false,
                error: Some("not_found".to_string()),
                message: Some("Organization not found".to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_error(mut self, domain: &str) -> Self {
        self.errors.insert(domain.to_string());
        self
    }

    /// Return every scripted person regardless of the requested limit
    pub fn ignoring_limit(mut self) -> Self {
        self.ignore_limit = true;
        self
    }

    /// Domains looked up, in call order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContactLookup for FakeLookup {
    async fn lookup_contacts(&self, domain: &str, limit: u32) -> Result<LookupResponse> {
        self.requested.lock().unwrap().push(domain.to_string());
        if self.errors.contains(domain) {
            return Err(anyhow!("lookup service unavailable"));
        }

        let mut response = self.responses.get(domain).cloned().unwrap_or_else(|| LookupResponse {
            success: true,
            people: vec![
                person("Ada Lovelace", "CTO", &format!("ada@{}", domain)),
                person("Grace Hopper", "VP Engineering", &format!("grace@{}", domain)),
            ],
            domain: Some(domain.to_string()),
            ..Default::default()
        });
        if !self.ignore_limit {
            response.people.truncate(limit as usize);
        }
        Ok(response)
    }
}

/// Composer that fails for scripted contact emails and records every request
#[derive(Default)]
pub struct FakeComposer {
    fail_for: HashSet<String>,
    requests: Mutex<Vec<ComposeRequest>>,
}

impl FakeComposer {
    pub fn failing_for(mut self, email: &str) -> Self {
        self.fail_for.insert(email.to_string());
        self
    }

    pub fn requests(&self) -> Vec<ComposeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DraftComposer for FakeComposer {
    async fn compose(&self, request: &ComposeRequest) -> Result<ComposedDraft> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_for.contains(&request.contact.email) {
            return Err(anyhow!("model refused"));
        }

        Ok(ComposedDraft {
            subject: format!("Quick question for {}", request.company.name),
            body: format!("Hi {},\n\nA short note.", request.contact.name),
            approach: request.source_tier.to_string(),
        })
    }
}

/// Sender that fails for scripted draft ids and counts every call
#[derive(Default)]
pub struct FakeSender {
    fail_for: Mutex<HashSet<String>>,
    calls: AtomicU32,
}

impl FakeSender {
    pub fn failing_for(self, draft_id: &str) -> Self {
        self.fail_for.lock().unwrap().insert(draft_id.to_string());
        self
    }

    pub fn heal(&self) {
        self.fail_for.lock().unwrap().clear();
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send_message(&self, draft: &DraftRecord) -> Result<SendReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.lock().unwrap().contains(&draft.id) {
            return Ok(SendReceipt {
                success: false,
                message_id: None,
                error: Some("mailbox full".to_string()),
            });
        }

        Ok(SendReceipt {
            success: true,
            message_id: Some(format!("msg-{}", draft.id)),
            error: None,
        })
    }
}

/// Prompt that plays back scripted answers and records each list it was shown
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<PromptResponse>>,
    shown: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPrompt {
    pub fn new(answers: Vec<PromptResponse>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn approving() -> Self {
        Self::new(Vec::new())
    }

    /// Domains of every proposal shown, in order
    pub fn shown(&self) -> Vec<Vec<String>> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApprovalPrompt for ScriptedPrompt {
    async fn request_approval(
        &self,
        companies: &[CompanyRecord],
    ) -> std::result::Result<PromptResponse, PromptError> {
        self.shown
            .lock()
            .unwrap()
            .push(companies.iter().map(|c| c.domain.clone()).collect());
        Ok(self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PromptResponse::Approved))
    }
}

/// Handles to every fake, kept so tests can inspect them after a run
pub struct Fakes {
    pub discovery: Arc<ScriptedDiscovery>,
    pub researcher: Arc<FakeResearcher>,
    pub lookup: Arc<FakeLookup>,
    pub composer: Arc<FakeComposer>,
    pub prompt: Arc<ScriptedPrompt>,
}

impl Fakes {
    pub fn new(discovery: ScriptedDiscovery) -> Self {
        Self {
            discovery: Arc::new(discovery),
            researcher: Arc::new(FakeResearcher::default()),
            lookup: Arc::new(FakeLookup::default()),
            composer: Arc::new(FakeComposer::default()),
            prompt: Arc::new(ScriptedPrompt::approving()),
        }
    }

    pub fn researcher(mut self, researcher: FakeResearcher) -> Self {
        self.researcher = Arc::new(researcher);
        self
    }

    pub fn lookup(mut self, lookup: FakeLookup) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    pub fn composer(mut self, composer: FakeComposer) -> Self {
        self.composer = Arc::new(composer);
        self
    }

    pub fn prompt(mut self, prompt: ScriptedPrompt) -> Self {
        self.prompt = Arc::new(prompt);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            discovery: self.discovery.clone(),
            researcher: self.researcher.clone(),
            lookup: self.lookup.clone(),
            composer: self.composer.clone(),
            prompt: self.prompt.clone(),
        }
    }
}
