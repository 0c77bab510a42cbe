// src/config/publisher.rs
use serde::Deserialize;

use crate::publish::{
    DiscordWebhookPublisher, DryRunPublisher, MastodonPublisher, PublishTarget, XCredentials, XPublisher,
};

pub const ENV_PUBLISH_TARGET: &str = "PUBLISH_TARGET";
pub const ENV_DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
pub const ENV_MASTODON_BASE_URL: &str = "MASTODON_BASE_URL";
pub const ENV_MASTODON_ACCESS_TOKEN: &str = "MASTODON_ACCESS_TOKEN";
pub const ENV_X_API_KEY: &str = "X_API_KEY";
pub const ENV_X_API_SECRET: &str = "X_API_SECRET";
pub const ENV_X_ACCESS_TOKEN: &str = "X_ACCESS_TOKEN";
pub const ENV_X_ACCESS_TOKEN_SECRET: &str = "X_ACCESS_TOKEN_SECRET";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    DryRun,
    Discord,
    Mastodon,
    #[serde(alias = "twitter")]
    X,
}

impl TargetKind {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dry-run" | "dryrun" | "dry_run" => Ok(TargetKind::DryRun),
            "discord" => Ok(TargetKind::Discord),
            "mastodon" => Ok(TargetKind::Mastodon),
            "x" | "twitter" => Ok(TargetKind::X),
            other => anyhow::bail!("unsupported publish target `{other}`"),
        }
    }
}

/// `[publish]` section. Secrets come from the environment only.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub target: TargetKind,
    #[serde(skip)]
    pub discord_webhook_url: Option<String>,
    pub mastodon_base_url: Option<String>,
    #[serde(skip)]
    pub mastodon_access_token: Option<String>,
    #[serde(skip)]
    pub x: XCredentials,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            target: TargetKind::DryRun,
            discord_webhook_url: None,
            mastodon_base_url: None,
            mastodon_access_token: None,
            x: XCredentials::default(),
        }
    }
}

impl PublishConfig {
    pub fn apply_env_from(&mut self, get: &impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(t) = non_empty(ENV_PUBLISH_TARGET) {
            self.target = TargetKind::parse(&t)?;
        }
        if let Some(v) = non_empty(ENV_DISCORD_WEBHOOK_URL) {
            self.discord_webhook_url = Some(v);
        }
        if let Some(v) = non_empty(ENV_MASTODON_BASE_URL) {
            self.mastodon_base_url = Some(v);
        }
        if let Some(v) = non_empty(ENV_MASTODON_ACCESS_TOKEN) {
            self.mastodon_access_token = Some(v);
        }
        for (var, slot) in [
            (ENV_X_API_KEY, &mut self.x.api_key),
            (ENV_X_API_SECRET, &mut self.x.api_secret),
            (ENV_X_ACCESS_TOKEN, &mut self.x.access_token),
            (ENV_X_ACCESS_TOKEN_SECRET, &mut self.x.access_token_secret),
        ] {
            if let Some(v) = non_empty(var) {
                *slot = v;
            }
        }
        Ok(())
    }

    /// Build the configured target; a real target without credentials is a startup error.
    pub fn build_publisher(&self) -> anyhow::Result<Box<dyn PublishTarget>> {
        Ok(match self.target {
            TargetKind::DryRun => Box::new(DryRunPublisher::new()),
            TargetKind::Discord => {
                let url = self
                    .discord_webhook_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("Missing {ENV_DISCORD_WEBHOOK_URL} env var"))?;
                Box::new(DiscordWebhookPublisher::new(url))
            }
            TargetKind::Mastodon => {
                let base = self
                    .mastodon_base_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("Missing {ENV_MASTODON_BASE_URL}"))?;
                let token = self
                    .mastodon_access_token
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("Missing {ENV_MASTODON_ACCESS_TOKEN} env var"))?;
                Box::new(MastodonPublisher::new(base, token))
            }
            TargetKind::X => {
                if let Some(var) = self.x.missing() {
                    anyhow::bail!("Missing {var} env var");
                }
                Box::new(XPublisher::new(self.x.clone()))
            }
        })
    }
}
