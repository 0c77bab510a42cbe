// src/config/generator.rs
use serde::Deserialize;
use std::sync::Arc;

use crate::generate::backend::{DisabledBackend, DynBackend, GeminiBackend, OpenAiBackend, StaticBackend};

pub const ENV_GENERATOR_PROVIDER: &str = "GENERATOR_PROVIDER";
pub const ENV_GENERATOR_MODEL: &str = "GENERATOR_MODEL";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Text the `mock` provider returns for every prompt.
pub const MOCK_TEXT: &str =
    "Small tools, steady progress: the projects that ship are the ones that keep showing up.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Openai,
    Mock,
    Disabled,
}

impl Provider {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::Openai),
            "mock" => Ok(Provider::Mock),
            "disabled" | "none" | "off" => Ok(Provider::Disabled),
            other => anyhow::bail!("unsupported generator provider `{other}`"),
        }
    }
}

/// `[backend]` section. `api_key = "ENV"` (the default) reads the provider's key variable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            api_key: "ENV".to_string(),
            model: None,
        }
    }
}

impl BackendConfig {
    pub fn apply_env_from(&mut self, get: &impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(p) = get(ENV_GENERATOR_PROVIDER).filter(|v| !v.trim().is_empty()) {
            self.provider = Provider::parse(&p)?;
        }
        if let Some(m) = get(ENV_GENERATOR_MODEL).filter(|v| !v.trim().is_empty()) {
            self.model = Some(m.trim().to_string());
        }
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider {
                Provider::Gemini => get(ENV_GEMINI_API_KEY).unwrap_or_default(),
                Provider::Openai => get(ENV_OPENAI_API_KEY).unwrap_or_default(),
                Provider::Mock | Provider::Disabled => String::new(),
            };
        }
        Ok(())
    }

    /// A missing key degrades to the disabled backend so the run can still use canned posts.
    pub fn build_backend(&self) -> DynBackend {
        let key = self.api_key.trim().to_string();
        match self.provider {
            Provider::Gemini if !key.is_empty() => Arc::new(GeminiBackend::new(key, self.model.as_deref())),
            Provider::Openai if !key.is_empty() => Arc::new(OpenAiBackend::new(key, self.model.as_deref())),
            Provider::Mock => Arc::new(StaticBackend::new(MOCK_TEXT)),
            Provider::Gemini | Provider::Openai => {
                tracing::warn!(provider = ?self.provider, "no API key configured; generation disabled");
                Arc::new(DisabledBackend)
            }
            Provider::Disabled => Arc::new(DisabledBackend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn env_key_resolved_by_provider() {
        let mut c = BackendConfig::default();
        c.apply_env_from(&env(&[
            ("GENERATOR_PROVIDER", "OpenAI"),
            ("OPENAI_API_KEY", "sk-1"),
            ("GEMINI_API_KEY", "g-1"),
        ]))
        .unwrap();
        assert_eq!(c.provider, Provider::Openai);
        assert_eq!(c.api_key, "sk-1");
        assert_eq!(c.build_backend().name(), "openai");
    }

    #[test]
    fn missing_key_disables_generation() {
        let mut c = BackendConfig::default();
        c.apply_env_from(&env(&[])).unwrap();
        let b = c.build_backend();
        assert_eq!(b.name(), "disabled");
        assert!(!b.is_available());
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let mut c = BackendConfig::default();
        assert!(c.apply_env_from(&env(&[("GENERATOR_PROVIDER", "claude")])).is_err());
    }

    #[test]
    fn mock_provider_is_available_offline() {
        let mut c = BackendConfig::default();
        c.apply_env_from(&env(&[("GENERATOR_PROVIDER", "mock")])).unwrap();
        assert_eq!(c.build_backend().name(), "mock");
    }
}
