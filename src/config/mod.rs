//! Run configuration.
//!
//! `BotConfig` comes from TOML (`$BOT_CONFIG_PATH`, else `config/bot.toml` when present,
//! else built-in defaults). Environment variables are applied on top and win.
//! Every section is `#[serde(default)]`, so partial files are valid.

pub mod generator;
pub mod publisher;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analyze::filter::FilterConfig;
use crate::generate::adapter::AdapterSettings;
use crate::generate::clean::default_banned_phrases;
use crate::ingest::config::{parse_feed_list, FeedSpec, ENV_FEED_URLS};
use crate::orchestrator::OrchestratorSettings;
use crate::persona::{is_hashtag, PersonaRegistry, PersonaSpec};

pub use generator::{BackendConfig, Provider};
pub use publisher::{PublishConfig, TargetKind};

pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

pub const ENV_BOT_CONFIG_PATH: &str = "BOT_CONFIG_PATH";
pub const ENV_BOT_SEED: &str = "BOT_SEED";
pub const ENV_SEEN_STORE_PATH: &str = "SEEN_STORE_PATH";
pub const ENV_METRICS_TEXTFILE: &str = "METRICS_TEXTFILE";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HashtagConfig {
    pub general: Vec<String>,
    pub per_post_general: usize,
}

impl Default for HashtagConfig {
    fn default() -> Self {
        Self {
            general: ["#Tech", "#Gaming", "#Indie", "#Community"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            per_post_general: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub min_chars: usize,
    pub max_raw_chars: usize,
    pub neutral_voice: bool,
    pub banned_phrases: Vec<String>,
    pub max_candidates_per_state: usize,
    pub default_persona: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_attempts: 2,
            backoff_ms: 750,
            min_chars: 20,
            max_raw_chars: 600,
            neutral_voice: true,
            banned_phrases: default_banned_phrases(),
            max_candidates_per_state: 3,
            default_persona: None,
        }
    }
}

impl GenerationConfig {
    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
            min_chars: self.min_chars,
            max_raw_chars: self.max_raw_chars,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub max_len: usize,
    pub ellipsis: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_len: 280,
            ellipsis: "…".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub feeds: Vec<FeedSpec>,
    pub per_feed_limit: usize,
    pub politeness_delay_ms: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            per_feed_limit: 5,
            politeness_delay_ms: 500,
            fetch_timeout_secs: 15,
        }
    }
}

impl IngestConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub canned_posts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub filter: FilterConfig,
    pub personas: Vec<PersonaSpec>,
    pub hashtags: HashtagConfig,
    pub generation: GenerationConfig,
    pub output: OutputConfig,
    pub ingest: IngestConfig,
    pub fallback: FallbackConfig,
    pub backend: BackendConfig,
    pub publish: PublishConfig,
    /// RNG seed; random when absent.
    pub seed: Option<u64>,
    pub seen_store_path: Option<PathBuf>,
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            personas: PersonaRegistry::default_specs(),
            hashtags: HashtagConfig::default(),
            generation: GenerationConfig::default(),
            output: OutputConfig::default(),
            ingest: IngestConfig::default(),
            fallback: FallbackConfig::default(),
            backend: BackendConfig::default(),
            publish: PublishConfig::default(),
            seed: None,
            seen_store_path: None,
            metrics_textfile: None,
        }
    }
}

impl BotConfig {
    /// Resolve the file, apply process env, validate.
    pub fn load() -> Result<Self> {
        let get = |k: &str| std::env::var(k).ok();
        let mut cfg = match config_path(&get) {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::info!("no config file found; using built-in defaults");
                Self::default()
            }
        };
        cfg.apply_env_from(&get)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read bot config at {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid bot config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: BotConfig = toml::from_str(s)?;
        if cfg.personas.is_empty() {
            cfg.personas = PersonaRegistry::default_specs();
        }
        Ok(cfg)
    }

    /// Environment overrides; `get` looks a variable up.
    pub fn apply_env_from(&mut self, get: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = get(ENV_FEED_URLS) {
            let feeds = parse_feed_list(&raw);
            if !feeds.is_empty() {
                self.ingest.feeds = feeds;
            }
        }
        if let Some(raw) = get(ENV_BOT_SEED).filter(|v| !v.trim().is_empty()) {
            let seed = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{ENV_BOT_SEED} must be an unsigned integer, got `{raw}`"))?;
            self.seed = Some(seed);
        }
        if let Some(p) = get(ENV_SEEN_STORE_PATH).filter(|v| !v.trim().is_empty()) {
            self.seen_store_path = Some(PathBuf::from(p.trim()));
        }
        if let Some(p) = get(ENV_METRICS_TEXTFILE).filter(|v| !v.trim().is_empty()) {
            self.metrics_textfile = Some(PathBuf::from(p.trim()));
        }
        self.backend.apply_env_from(get)?;
        self.publish.apply_env_from(get)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.max_len < 40 {
            bail!("output.max_len must be at least 40 (got {})", self.output.max_len);
        }
        if self.output.ellipsis.chars().count() > 3 {
            bail!("output.ellipsis must be at most 3 chars");
        }
        if !(1..=2).contains(&self.hashtags.per_post_general) {
            bail!(
                "hashtags.per_post_general must be 1 or 2 (got {})",
                self.hashtags.per_post_general
            );
        }
        if let Some(bad) = self.hashtags.general.iter().find(|t| !is_hashtag(t.trim())) {
            bail!("hashtags.general: invalid hashtag `{bad}`");
        }
        if self.generation.max_candidates_per_state == 0 {
            bail!("generation.max_candidates_per_state must be at least 1");
        }
        self.registry().context("invalid persona configuration")?;
        Ok(())
    }

    pub fn registry(&self) -> Result<PersonaRegistry> {
        PersonaRegistry::new(self.personas.clone(), self.generation.default_persona.clone())
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_candidates_per_state: self.generation.max_candidates_per_state,
            canned_posts: self.fallback.canned_posts.clone(),
        }
    }
}

/// `$BOT_CONFIG_PATH` when set, else the default path if it exists.
fn config_path(get: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(p) = get(ENV_BOT_CONFIG_PATH).filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(p.trim()));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    default.exists().then_some(default)
}
