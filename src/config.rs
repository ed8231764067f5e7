use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible base URL, e.g. "http://localhost:11434/v1".
    pub base_url: String,
    /// Env var holding the API key; empty is fine for local servers.
    pub api_key_env: String,
    /// Model used when an exchange is pinned to the local tier.
    pub local_model: String,
    /// Model used for everything routed remote.
    pub remote_model: String,
    /// Task-label tier overrides, e.g. `classify = "local"`.
    pub routes: HashMap<String, String>,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key_env: "STEWARD_API_KEY".to_string(),
            local_model: "qwen2.5:7b".to_string(),
            remote_model: "gpt-4o-mini".to_string(),
            routes: HashMap::new(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "steward.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Saved OAuth token JSON for Gmail. Empty disables the mailbox tools.
    pub gmail_token_path: String,
    /// Saved OAuth token JSON for Google Calendar.
    pub calendar_token_path: String,
    /// Root directory the file tools may read under.
    pub files_root: String,
    pub max_file_bytes: u64,
    pub max_files_scanned: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            gmail_token_path: String::new(),
            calendar_token_path: String::new(),
            files_root: ".".to_string(),
            max_file_bytes: 256 * 1024,
            max_files_scanned: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub morning_digest_cron: String,
    pub afternoon_digest_cron: String,
    pub staleness_cron: String,
    /// Local hour (0-23) when notifications go quiet; the window may wrap
    /// past midnight.
    pub quiet_start_hour: u32,
    pub quiet_end_hour: u32,
    /// Days untouched before a task counts as stale.
    pub stale_task_days: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            morning_digest_cron: "0 8 * * *".to_string(),
            afternoon_digest_cron: "0 15 * * *".to_string(),
            staleness_cron: "30 9 * * *".to_string(),
            quiet_start_hour: 22,
            quiet_end_hour: 7,
            stale_task_days: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Persona file prepended to the system prompt; fallback text when absent.
    pub persona_path: String,
    /// Conversation turns loaded into each exchange.
    pub history_limit: i64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            persona_path: "PERSONA.md".to_string(),
            history_limit: 40,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// API key from the configured env var, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.provider.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }
}
