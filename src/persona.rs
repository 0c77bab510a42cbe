//! # Persona Registry
//!
//! Personas are static style/topic profiles loaded once per run:
//! - `keywords` drive exact matching against candidate text,
//! - `hashtags` is the persona-specific tag pool (ordered, first is the signature tag),
//! - `flexible` personas may adapt off-topic candidates,
//! - `priority` breaks ranking ties (lower is tried first).
//!
//! Profiles are validated on construction; the registry keeps them sorted by priority.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};

/// Raw persona entry as written in `[[personas]]`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PersonaSpec {
    pub name: String,
    pub style: String,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub flexible: bool,
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Also count a 4-digit year in the text as a match.
    #[serde(default)]
    pub date_pattern: bool,
}

fn default_priority() -> i32 {
    100
}

/// Validated, immutable persona profile.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaProfile {
    pub name: String,
    pub style_descriptor: String,
    pub focus: Option<String>,
    pub match_keywords: BTreeSet<String>,
    pub hashtag_pool: Vec<String>,
    pub flexible: bool,
    pub priority: i32,
    pub date_pattern: bool,
}

impl PersonaProfile {
    pub fn from_spec(spec: PersonaSpec) -> Result<Self> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            bail!("persona name must not be empty");
        }
        let style = spec.style.trim().to_string();
        if style.is_empty() {
            bail!("persona `{name}`: style must not be empty");
        }

        let match_keywords: BTreeSet<String> = spec
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let mut seen = HashSet::new();
        let mut hashtag_pool = Vec::with_capacity(spec.hashtags.len());
        for tag in spec.hashtags {
            let tag = tag.trim().to_string();
            if !is_hashtag(&tag) {
                bail!("persona `{name}`: invalid hashtag `{tag}`");
            }
            if seen.insert(tag.to_lowercase()) {
                hashtag_pool.push(tag);
            }
        }
        if hashtag_pool.is_empty() {
            bail!("persona `{name}`: hashtags must list at least one tag");
        }

        Ok(Self {
            name,
            style_descriptor: style,
            focus: spec.focus.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()),
            match_keywords,
            hashtag_pool,
            flexible: spec.flexible,
            priority: spec.priority,
            date_pattern: spec.date_pattern,
        })
    }
}

/// `#` followed by at least one letter/digit/underscore and nothing else.
pub fn is_hashtag(tag: &str) -> bool {
    let Some(rest) = tag.strip_prefix('#') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// All personas for a run, sorted by `(priority, name)`.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<PersonaProfile>,
    default_persona: Option<String>,
}

impl PersonaRegistry {
    pub fn new(specs: Vec<PersonaSpec>, default_persona: Option<String>) -> Result<Self> {
        if specs.is_empty() {
            bail!("at least one persona must be configured");
        }
        let mut personas = Vec::with_capacity(specs.len());
        let mut names = HashSet::new();
        for spec in specs {
            let p = PersonaProfile::from_spec(spec)?;
            if !names.insert(p.name.to_lowercase()) {
                bail!("duplicate persona name `{}`", p.name);
            }
            personas.push(p);
        }
        personas.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));

        if let Some(d) = default_persona.as_deref() {
            if !personas.iter().any(|p| p.name.eq_ignore_ascii_case(d)) {
                bail!("default persona `{d}` is not configured");
            }
        }
        Ok(Self {
            personas,
            default_persona,
        })
    }

    pub fn all(&self) -> &[PersonaProfile] {
        &self.personas
    }

    pub fn get(&self, name: &str) -> Option<&PersonaProfile> {
        self.personas.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Flexible personas in priority order.
    pub fn flexible(&self) -> impl Iterator<Item = &PersonaProfile> {
        self.personas.iter().filter(|p| p.flexible)
    }

    /// The configured default, else the highest-priority persona.
    pub fn default_persona(&self) -> &PersonaProfile {
        self.default_persona
            .as_deref()
            .and_then(|d| self.get(d))
            .unwrap_or(&self.personas[0])
    }

    /// Built-in personas used when no configuration file is present.
    pub fn default_specs() -> Vec<PersonaSpec> {
        #[allow(clippy::too_many_arguments)]
        fn spec(
            name: &str,
            style: &str,
            focus: &str,
            keywords: &[&str],
            hashtags: &[&str],
            flexible: bool,
            priority: i32,
            date_pattern: bool,
        ) -> PersonaSpec {
            PersonaSpec {
                name: name.to_string(),
                style: style.to_string(),
                focus: Some(focus.to_string()),
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
                hashtags: hashtags.iter().map(|s| s.to_string()).collect(),
                flexible,
                priority,
                date_pattern,
            }
        }
        vec![
            spec(
                "industry_insider",
                "insightful and grounded",
                "what a release or shift means for the people who build things",
                &["release", "engine", "studio", "developer", "launch", "update"],
                &["#GameDev", "#IndieDev"],
                true,
                10,
                false,
            ),
            spec(
                "data_driven",
                "analytical and stats-focused",
                "what the numbers reveal: benchmarks, sales figures, player counts",
                &["report", "study", "data", "percent", "million", "benchmark"],
                &["#Data", "#Analytics"],
                true,
                20,
                false,
            ),
            spec(
                "historian",
                "nostalgic and story-driven",
                "iconic moments, anniversaries, and how today echoes the past",
                &["anniversary", "classic", "retro", "history", "legacy"],
                &["#History", "#Throwback"],
                false,
                30,
                true,
            ),
            spec(
                "skeptical_analyst",
                "skeptical but constructive",
                "the tough questions everyone is thinking but not saying",
                &["layoffs", "controversy", "delay", "lawsuit", "criticism"],
                &["#TechTalk", "#Industry"],
                true,
                40,
                false,
            ),
        ]
    }
}
