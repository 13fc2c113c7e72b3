//! Configuration for the outreach workspace.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (OUTREACH_HOME)
//! 2. Config file (.outreach/config.yaml)
//! 3. Defaults (~/.outreach)
//!
//! Config file discovery:
//! - Searches current directory and parents for .outreach/config.yaml
//! - `paths.home` is relative to the .outreach/ directory

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{ActionBudget, PipelineError};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Environment variable overriding the workspace home
pub const HOME_ENV: &str = "OUTREACH_HOME";

/// Upper bound on contacts requested per company
pub const MAX_CONTACTS_CEILING: u32 = 100;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    #[serde(default)]
    pub safety: ActionBudget,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Workspace home (relative to the .outreach/ directory)
    pub home: Option<String>,
}

/// What to look for and how much of it per run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Maximum companies proposed for review per run (default: 5)
    #[serde(default = "default_max_outreach")]
    pub max_outreach_per_run: u32,

    /// Contacts requested per company (default: 10, clamped to [1, 100])
    #[serde(default = "default_max_contacts")]
    pub max_contacts_per_company: u32,

    /// Ideal customer description handed to discovery
    #[serde(default)]
    pub target: String,

    /// Glob patterns for domains that must never be proposed
    #[serde(default)]
    pub excluded_domains: Vec<String>,
}

fn default_max_outreach() -> u32 {
    5
}
fn default_max_contacts() -> u32 {
    10
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            max_outreach_per_run: default_max_outreach(),
            max_contacts_per_company: default_max_contacts(),
            target: String::new(),
            excluded_domains: Vec::new(),
        }
    }
}

impl Preferences {
    /// Contact lookup limit, clamped to [1, 100]
    pub fn contact_limit(&self) -> u32 {
        clamp_contact_limit(self.max_contacts_per_company)
    }
}

pub fn clamp_contact_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_CONTACTS_CEILING)
}

/// Which transport serves the external capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Subprocess speaking JSON over stdin/stdout
    Command,

    /// HTTP endpoint speaking JSON
    Http,
}

impl Default for Backend {
    fn default() -> Self {
        Self::Command
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandConfig {
    /// Program invoked as `<program> <operation>`
    #[serde(default = "default_program")]
    pub program: String,

    /// Per-call timeout (default: 120)
    #[serde(default = "default_capability_timeout")]
    pub timeout_seconds: u64,
}

fn default_program() -> String {
    "outreach-capabilities".to_string()
}
fn default_capability_timeout() -> u64 {
    120
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_seconds: default_capability_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default)]
    pub base_url: String,

    /// Name of the environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_capability_timeout")]
    pub timeout_seconds: u64,
}

fn default_token_env() -> String {
    "OUTREACH_CAPABILITY_TOKEN".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_env: default_token_env(),
            timeout_seconds: default_capability_timeout(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the workspace home
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub preferences: Preferences,
    pub capabilities: CapabilitiesConfig,
    pub budget: ActionBudget,
}

impl ResolvedConfig {
    /// Check everything a run needs before any stage starts
    pub fn validate(&self, prompt_override: Option<&str>) -> Result<(), PipelineError> {
        let has_prompt = prompt_override.is_some_and(|p| !p.trim().is_empty());
        if self.preferences.target.trim().is_empty() && !has_prompt {
            return Err(PipelineError::Configuration(
                "preferences.target is empty; set it in config.yaml or pass --prompt".to_string(),
            ));
        }

        if self.preferences.max_outreach_per_run == 0 {
            return Err(PipelineError::Configuration(
                "preferences.maxOutreachPerRun must be at least 1".to_string(),
            ));
        }

        if self.budget.max_actions == 0 {
            return Err(PipelineError::Configuration(
                "safety.maxActions must be at least 1".to_string(),
            ));
        }

        for pattern in &self.preferences.excluded_domains {
            glob::Pattern::new(pattern).map_err(|e| {
                PipelineError::Configuration(format!(
                    "Invalid excludedDomains pattern '{}': {}",
                    pattern, e
                ))
            })?;
        }

        self.validate_capabilities()
    }

    /// Transport settings are needed by both `run` and `send`
    pub fn validate_capabilities(&self) -> Result<(), PipelineError> {
        match self.capabilities.backend {
            Backend::Command => {
                if self.capabilities.command.program.trim().is_empty() {
                    return Err(PipelineError::Configuration(
                        "capabilities.command.program is empty".to_string(),
                    ));
                }
            }
            Backend::Http => {
                let http = &self.capabilities.http;
                if http.base_url.trim().is_empty() {
                    return Err(PipelineError::Configuration(
                        "capabilities.http.baseUrl is empty".to_string(),
                    ));
                }
                if std::env::var(&http.token_env).map_or(true, |t| t.trim().is_empty()) {
                    return Err(PipelineError::Configuration(format!(
                        "{} environment variable required for the http backend",
                        http.token_env
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".outreach").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".outreach");

    let env_home = std::env::var(HOME_ENV).ok().map(PathBuf::from);
    let config_file = find_config_file();

    let Some(ref config_path) = config_file else {
        return Ok(ResolvedConfig {
            home: env_home.unwrap_or(default_home),
            config_file: None,
            preferences: Preferences::default(),
            capabilities: CapabilitiesConfig::default(),
            budget: ActionBudget::default(),
        });
    };

    let config = load_config_file(config_path)?;
    let outreach_dir = config_path.parent().unwrap_or(Path::new("."));

    let home = match (env_home, config.paths.home.as_deref()) {
        (Some(env_home), _) => env_home,
        (None, Some(home_path)) => resolve_path(outreach_dir, home_path),
        (None, None) => default_home,
    };

    Ok(ResolvedConfig {
        home,
        config_file: config_file.clone(),
        preferences: config.preferences,
        capabilities: config.capabilities,
        budget: config.safety,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the workspace home directory.
pub fn outreach_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}
