//! Command-line interface for outreach.
//!
//! Provides commands for running the pipeline, sending drafts, checking run
//! status, listing runs and showing the resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::capabilities::{self, ApprovalPrompt, AutoApprove, MessageSender, TerminalPrompt};
use crate::config::{self, paths::Workspace, Backend};
use crate::core::{
    collect_stats, EventStore, RunController, RunOptions, SendPhase, WorkspaceStore,
};
use crate::domain::{Run, RunReport, RunState, RunStats};

/// outreach - Staged outreach pipeline with human review
#[derive(Parser, Debug)]
#[command(name = "outreach")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover, review and research companies, then write drafts
    Run {
        /// Discovery instruction (overrides preferences.target)
        #[arg(short, long)]
        prompt: Option<String>,

        /// Stop after the review; nothing is researched or drafted
        #[arg(long)]
        dry_run: bool,

        /// Send the drafts once the run succeeds
        #[arg(long)]
        send: bool,

        /// Approve proposals and sending without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Send the pending drafts of a run
    Send {
        /// Run ID (UUID)
        run_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check the status of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                prompt,
                dry_run,
                send,
                yes,
            } => run_outreach(prompt, dry_run, send, yes).await,
            Commands::Send { run_id, yes } => send_run(&run_id, yes).await,
            Commands::Status { run_id } => show_status(&run_id).await,
            Commands::Runs { limit } => list_runs(limit).await,
            Commands::Config => show_config(),
        }
    }
}

/// Run the pipeline once
async fn run_outreach(prompt: Option<String>, dry_run: bool, send: bool, yes: bool) -> Result<()> {
    let cfg = config::config()?;
    cfg.validate(prompt.as_deref())?;

    let approval: Arc<dyn ApprovalPrompt> = if yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalPrompt::stdio())
    };
    let (capabilities, sender) = capabilities::from_config(cfg, approval)?;

    let controller = RunController::new(cfg, capabilities, RunOptions { prompt, dry_run })?;
    let report = controller.execute().await;
    print_report(&report);

    if !report.success {
        std::process::exit(1);
    }

    if send {
        if dry_run {
            eprintln!("--send ignored for a dry run");
        } else {
            send_drafts(Arc::clone(controller.store()), sender, report.run_id, yes).await?;
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    let stats = &report.stats;

    println!();
    println!("Run:       {}", report.run_id);
    println!("Artifacts: {}", report.run_dir.display());
    print_stats(stats);

    match (&report.error, report.dry_run) {
        (Some(error), _) => eprintln!("\n[Run {} failed: {}]", report.run_id, error),
        (None, true) => eprintln!(
            "\n[Dry run {} finished: selection saved, nothing processed]",
            report.run_id
        ),
        (None, false) => eprintln!("\n[Run {} completed successfully]", report.run_id),
    }
}

fn print_stats(stats: &RunStats) {
    println!("Companies selected:   {}", stats.companies_selected);
    println!("Companies researched: {}", stats.companies_researched);
    println!("Companies failed:     {}", stats.companies_failed);
    println!("Contacts found:       {}", stats.contacts_found);
    println!("Drafts generated:     {}", stats.drafts_generated);
}

/// `send <run-id>`
async fn send_run(run_id_str: &str, yes: bool) -> Result<()> {
    let run_id = parse_run_id(run_id_str)?;
    let cfg = config::config()?;
    cfg.validate_capabilities()?;

    let (_, sender) = capabilities::from_config(cfg, Arc::new(AutoApprove))?;
    let store = Arc::new(WorkspaceStore::new(Workspace::new(&cfg.home)));

    send_drafts(store, sender, run_id, yes).await
}

async fn send_drafts(
    store: Arc<WorkspaceStore>,
    sender: Arc<dyn MessageSender>,
    run_id: Uuid,
    yes: bool,
) -> Result<()> {
    let phase = SendPhase::new(store, sender);
    let pending = phase.pending(run_id).await?;

    if pending > 0 && !yes {
        let question = format!("Send {} drafts from run {}?", pending, run_id);
        if !TerminalPrompt::stdio().confirm(&question)? {
            eprintln!("Send cancelled");
            return Ok(());
        }
    }

    let report = phase.send_run(run_id).await?;
    println!(
        "Attempted {}, sent {}, failed {}",
        report.attempted, report.sent, report.failed
    );

    if report.failed > 0 {
        let retryable = report.failed - report.undeliverable;
        if retryable > 0 {
            eprintln!("\n[{} drafts failed; run `outreach send {}` again to retry them]", retryable, run_id);
        }
        if report.undeliverable > 0 {
            eprintln!("[{} drafts have no deliverable address and were marked failed]", report.undeliverable);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Show the status of a run
async fn show_status(run_id_str: &str) -> Result<()> {
    let run_id = parse_run_id(run_id_str)?;
    let workspace = Workspace::from_config()?;

    let run = load_run(&workspace, run_id)
        .await?
        .with_context(|| format!("Run not found: {}", run_id))?;

    let store = WorkspaceStore::new(workspace);
    let stats = collect_stats(&store, run_id).await;

    println!("Run ID:        {}", run.id);
    println!("State:         {}", run.state);
    match &run.state {
        RunState::Failed { error } => println!("Error:         {}", error),
        RunState::BudgetExceeded { limit } => println!("Limit:         {}", limit),
        _ => {}
    }
    println!("Started:       {}", run.started_at);
    if let Some(completed) = run.completed_at {
        println!("Completed:     {}", completed);
    }
    if let Some(stage) = run.current_stage {
        println!("Current stage: {}", stage);
    }
    println!("Review rounds: {}", run.review_rounds);
    println!("Sends:         {}", run.sends_completed);
    println!();
    print_stats(&stats);

    Ok(())
}

/// List recent runs, most recent first
async fn list_runs(limit: usize) -> Result<()> {
    let workspace = Workspace::from_config()?;
    let ids = EventStore::list_runs(&workspace.runs_dir()).await?;

    let mut runs = Vec::new();
    for id in ids {
        if let Some(run) = load_run(&workspace, id).await? {
            runs.push(run);
        }
    }

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs.truncate(limit);

    println!("{:<38} {:<18} {:<17} {:<8}", "RUN ID", "STATE", "STARTED", "REVIEWS");
    println!("{}", "-".repeat(83));

    for run in runs {
        println!(
            "{:<38} {:<18} {:<17} {:<8}",
            run.id,
            run.state.to_string(),
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.review_rounds
        );
    }

    Ok(())
}

/// Replay a run log without creating anything for unknown runs
async fn load_run(workspace: &Workspace, run_id: Uuid) -> Result<Option<Run>> {
    let run_dir = workspace.run_dir(run_id);
    if !run_dir.is_dir() {
        return Ok(None);
    }

    let events = EventStore::at(run_dir).await?;
    Ok(events.load_run().await?)
}

fn parse_run_id(run_id_str: &str) -> Result<Uuid> {
    Uuid::parse_str(run_id_str).with_context(|| format!("Invalid run ID: {}", run_id_str))
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;
    let workspace = Workspace::new(&cfg.home);

    println!("Outreach Configuration");
    println!("{}", "=".repeat(60));
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Runs:      {}", workspace.runs_dir().display());
    println!("  Contacted: {}", workspace.contacted_path().display());
    println!();
    println!("Preferences:");
    println!("  Target:               {}", display_or_unset(&cfg.preferences.target));
    println!("  Max outreach per run: {}", cfg.preferences.max_outreach_per_run);
    println!("  Contacts per company: {}", cfg.preferences.contact_limit());
    if cfg.preferences.excluded_domains.is_empty() {
        println!("  Excluded domains:     (none)");
    } else {
        println!(
            "  Excluded domains:     {}",
            cfg.preferences.excluded_domains.join(", ")
        );
    }
    println!();
    println!("Capabilities:");
    match cfg.capabilities.backend {
        Backend::Command => {
            println!("  Backend: command");
            println!("  Program: {}", cfg.capabilities.command.program);
            println!("  Timeout: {}s", cfg.capabilities.command.timeout_seconds);
        }
        Backend::Http => {
            println!("  Backend:   http");
            println!("  Base URL:  {}", display_or_unset(&cfg.capabilities.http.base_url));
            println!("  Token env: {}", cfg.capabilities.http.token_env);
            println!("  Timeout:   {}s", cfg.capabilities.http.timeout_seconds);
        }
    }
    println!();
    println!("Safety limits:");
    println!("  Max actions: {}", cfg.budget.max_actions);
    println!("  Timeout:     {}s", cfg.budget.run_timeout_seconds);

    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.trim().is_empty() {
        "(unset)"
    } else {
        value
    }
}
