//! Worker Pool Integration Tests
//!
//! Tests for concurrent company processing against a shared workspace.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use common::{person, FakeLookup, FakeResearcher, Fakes, ScriptedDiscovery};
use outreach::config::paths::{companies_key, contacts_dir_key, contacts_key, drafts_key, Workspace};
use outreach::core::{ActionBudget, CompanyWorkerPool, WorkerContext, WorkspaceStore};
use outreach::domain::{CompanyRecord, CompanyStatus, ContactRecord, DraftRecord, SourceTier};

fn context(home: &TempDir, fakes: &Fakes) -> Arc<WorkerContext> {
    Arc::new(WorkerContext {
        run_id: Uuid::new_v4(),
        store: Arc::new(WorkspaceStore::new(Workspace::new(home.path()))),
        capabilities: fakes.capabilities(),
        budget: ActionBudget::default().start(),
        contact_limit: 5,
        events: None,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_twenty_companies_write_twenty_records() {
    let home = TempDir::new().unwrap();
    let fakes = Fakes::new(ScriptedDiscovery::default());
    let ctx = context(&home, &fakes);
    let run_id = ctx.run_id;
    let store = Arc::clone(&ctx.store);

    let companies: Vec<CompanyRecord> = (0..20)
        .map(|i| {
            CompanyRecord::new(format!("Company {}", i), &format!("company{}.io", i))
                .with_description("Developer tools")
        })
        .collect();

    let summary = CompanyWorkerPool::new(ctx).process(companies).await.unwrap();
    assert_eq!(summary.succeeded, 20);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.drafts_generated, 40);

    // Every concurrent read-modify-write survived
    let stored: Vec<CompanyRecord> = store.load(&companies_key(run_id)).await.unwrap();
    assert_eq!(stored.len(), 20);
    assert!(stored.iter().all(|c| c.status == CompanyStatus::Success));
    assert!(stored.iter().all(|c| c.processed_at.is_some()));

    let drafts: Vec<DraftRecord> = store.load(&drafts_key(run_id)).await.unwrap();
    assert_eq!(drafts.len(), 40);
    let ids: HashSet<&str> = drafts.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids.len(), 40);

    let contact_files = store.list(&contacts_dir_key(run_id)).await.unwrap();
    assert_eq!(contact_files.len(), 20);
}

#[tokio::test]
async fn test_verified_search_grounds_draft_in_research() {
    let home = TempDir::new().unwrap();
    let fakes = Fakes::new(ScriptedDiscovery::default())
        .researcher(FakeResearcher::default().with_answer(
            "\"Jane Doe\"",
            "Acme raises Series B\nJane Doe joined Acme as CTO in 2023 after leading infra at Beta.",
        ))
        .lookup(FakeLookup::default().with_people(
            "acme.io",
            vec![
                person("Jane Doe", "CTO", "jane@acme.io"),
                person("John Roe", "CFO", "john@acme.io"),
            ],
        ));
    let ctx = context(&home, &fakes);
    let run_id = ctx.run_id;
    let store = Arc::clone(&ctx.store);

    let company = CompanyRecord::new("Acme", "acme.io").with_description("Billing APIs");
    CompanyWorkerPool::new(ctx).process(vec![company]).await.unwrap();

    let drafts: Vec<DraftRecord> = store.load(&drafts_key(run_id)).await.unwrap();
    assert_eq!(drafts.len(), 2);

    let jane = drafts.iter().find(|d| d.contact.name == "Jane Doe").unwrap();
    assert_eq!(jane.personalization_notes.source_tier, SourceTier::VerifiedSearch);
    assert!(jane.personalization_notes.evidence.starts_with("Jane Doe joined Acme"));

    // No research mentions John, so only his title may be used
    let john = drafts.iter().find(|d| d.contact.name == "John Roe").unwrap();
    assert_eq!(john.personalization_notes.source_tier, SourceTier::TitleBased);
    assert_eq!(john.personalization_notes.evidence, "CFO");

    let requests = fakes.composer.requests();
    let john_request = requests
        .iter()
        .find(|r| r.contact.name == "John Roe")
        .unwrap();
    assert!(john_request.research.is_none());
}

#[tokio::test]
async fn test_failed_search_is_not_evidence() {
    let home = TempDir::new().unwrap();
    let fakes = Fakes::new(ScriptedDiscovery::default())
        .researcher(
            FakeResearcher::default()
                .with_answer("\"Jane Doe\"", "Search failed: Jane Doe query rate limited"),
        )
        .lookup(FakeLookup::default().with_people(
            "acme.io",
            vec![person("Jane Doe", "", "jane@acme.io")],
        ));
    let ctx = context(&home, &fakes);
    let run_id = ctx.run_id;
    let store = Arc::clone(&ctx.store);

    let company = CompanyRecord::new("Acme", "acme.io").with_description("Billing APIs");
    CompanyWorkerPool::new(ctx).process(vec![company]).await.unwrap();

    let drafts: Vec<DraftRecord> = store.load(&drafts_key(run_id)).await.unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(
        drafts[0].personalization_notes.source_tier,
        SourceTier::CompanyBased
    );
    assert_eq!(drafts[0].personalization_notes.evidence, "Billing APIs");
}

#[tokio::test]
async fn test_company_description_is_researched_when_missing() {
    let home = TempDir::new().unwrap();
    let fakes = Fakes::new(ScriptedDiscovery::default()).researcher(
        FakeResearcher::default().with_answer("company overview", "Acme builds billing APIs."),
    );
    let ctx = context(&home, &fakes);
    let run_id = ctx.run_id;
    let store = Arc::clone(&ctx.store);

    CompanyWorkerPool::new(ctx)
        .process(vec![CompanyRecord::new("Acme", "acme.io")])
        .await
        .unwrap();

    let stored: Vec<CompanyRecord> = store.load(&companies_key(run_id)).await.unwrap();
    assert_eq!(stored[0].description.as_deref(), Some("Acme builds billing APIs."));

    assert!(fakes
        .researcher
        .queries()
        .iter()
        .any(|q| q == "Acme acme.io company overview"));
}

#[tokio::test]
async fn test_duplicate_contact_names_get_distinct_ids() {
    let home = TempDir::new().unwrap();
    let fakes = Fakes::new(ScriptedDiscovery::default()).lookup(FakeLookup::default().with_people(
        "acme.io",
        vec![
            person("Alex Kim", "CTO", "alex@acme.io"),
            person("Alex Kim", "Designer", "alex.kim@acme.io"),
        ],
    ));
    let ctx = context(&home, &fakes);
    let run_id = ctx.run_id;
    let store = Arc::clone(&ctx.store);

    let company = CompanyRecord::new("Acme", "acme.io").with_description("Billing APIs");
    CompanyWorkerPool::new(ctx).process(vec![company]).await.unwrap();

    let drafts: Vec<DraftRecord> = store.load(&drafts_key(run_id)).await.unwrap();
    let mut ids: Vec<&str> = drafts.iter().map(|d| d.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["acme-io--alex-kim", "acme-io--alex-kim-2"]);
}

#[tokio::test]
async fn test_domains_with_same_slug_keep_separate_contacts() {
    let home = TempDir::new().unwrap();
    let fakes = Fakes::new(ScriptedDiscovery::default());
    let ctx = context(&home, &fakes);
    let run_id = ctx.run_id;
    let store = Arc::clone(&ctx.store);

    let companies = vec![
        CompanyRecord::new("Dashed", "my-site.io").with_description("Hosting"),
        CompanyRecord::new("Dotted", "my.site.io").with_description("Hosting"),
    ];
    let summary = CompanyWorkerPool::new(ctx).process(companies).await.unwrap();
    assert_eq!(summary.succeeded, 2);

    let contact_files = store.list(&contacts_dir_key(run_id)).await.unwrap();
    assert_eq!(contact_files.len(), 2);

    for domain in ["my-site.io", "my.site.io"] {
        let contacts: Vec<ContactRecord> = store.load(&contacts_key(run_id, domain)).await.unwrap();
        assert_eq!(contacts.len(), 2);
        assert!(contacts.iter().all(|c| c.email.ends_with(&format!("@{}", domain))));
    }
}
