// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use persona_poster::analyze::{ContentFilter, FilterConfig};
use persona_poster::config::HashtagConfig;
use persona_poster::error::{BackendError, PublishError, SourceFetchError};
use persona_poster::generate::backend::{BackendFuture, DynBackend, GenerativeBackend};
use persona_poster::generate::clean::{default_banned_phrases, TextCleaner};
use persona_poster::generate::{AdapterSettings, GeneratorAdapter, PromptBuilder};
use persona_poster::orchestrator::OrchestratorSettings;
use persona_poster::persona::{PersonaRegistry, PersonaSpec};
use persona_poster::validate::OutputValidator;
use persona_poster::{Bot, CandidateItem, ContentSource, Post, PublishReceipt, PublishTarget};

pub struct VecSource {
    pub label: String,
    pub items: Vec<CandidateItem>,
}

#[async_trait]
impl ContentSource for VecSource {
    async fn fetch(&self) -> Result<Vec<CandidateItem>, SourceFetchError> {
        Ok(self.items.clone())
    }
    fn label(&self) -> &str {
        &self.label
    }
}

pub struct FailingSource;

#[async_trait]
impl ContentSource for FailingSource {
    async fn fetch(&self) -> Result<Vec<CandidateItem>, SourceFetchError> {
        Err(SourceFetchError::new("Down", "connection refused"))
    }
    fn label(&self) -> &str {
        "Down"
    }
}

type Reply = dyn Fn(&str) -> Result<String, BackendError> + Send + Sync;

/// Answers through `reply` and records every prompt it sees.
pub struct ScriptedBackend {
    reply: Box<Reply>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(reply: impl Fn(&str) -> Result<String, BackendError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn always(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerativeBackend for ScriptedBackend {
    fn generate<'a>(&'a self, prompt: &'a str) -> BackendFuture<'a> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let out = (self.reply)(prompt);
        Box::pin(async move { out })
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub posts: Arc<Mutex<Vec<Post>>>,
    pub fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            posts: Arc::default(),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishTarget for RecordingPublisher {
    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PublishError> {
        if self.fail {
            return Err(PublishError::Rejected(503, "maintenance".into()));
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(post.clone());
        Ok(PublishReceipt {
            id: format!("rec-{}", posts.len()),
        })
    }
    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn item(title: &str, summary: &str) -> CandidateItem {
    let slug: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    CandidateItem::new(title, summary, Some(format!("https://feed.test/{slug}")), "Test").unwrap()
}

pub fn persona(name: &str, keywords: &[&str], hashtag: &str, priority: i32, flexible: bool) -> PersonaSpec {
    PersonaSpec {
        name: name.to_string(),
        style: format!("{name}-style"),
        focus: None,
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        hashtags: vec![hashtag.to_string()],
        flexible,
        priority,
        date_pattern: false,
    }
}

pub struct BotParts {
    pub sources: Vec<Box<dyn ContentSource>>,
    pub backend: DynBackend,
    pub personas: Vec<PersonaSpec>,
    pub general_tags: Vec<String>,
    pub canned: Vec<String>,
    pub publisher: RecordingPublisher,
    pub max_len: usize,
}

impl BotParts {
    pub fn new(backend: DynBackend, personas: Vec<PersonaSpec>) -> Self {
        Self {
            sources: Vec::new(),
            backend,
            personas,
            general_tags: vec!["#Gaming".into()],
            canned: Vec::new(),
            publisher: RecordingPublisher::default(),
            max_len: 280,
        }
    }

    pub fn with_items(mut self, items: Vec<CandidateItem>) -> Self {
        self.sources.push(Box::new(VecSource {
            label: "Test".into(),
            items,
        }));
        self
    }

    pub fn build(self) -> Bot {
        let filter = ContentFilter::new(&FilterConfig {
            min_topic_score: 0,
            ..FilterConfig::default()
        });
        Bot {
            sources: self.sources,
            filter: filter.clone(),
            registry: PersonaRegistry::new(self.personas, None).unwrap(),
            adapter: GeneratorAdapter::new(
                self.backend,
                AdapterSettings {
                    timeout: Duration::from_secs(2),
                    max_attempts: 2,
                    backoff: Duration::from_millis(1),
                    min_chars: 10,
                    max_raw_chars: 600,
                },
                TextCleaner::new(&default_banned_phrases(), true),
            )
            .with_off_topic_filter(filter),
            prompts: PromptBuilder::new(NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(), self.max_len, true),
            validator: OutputValidator::new(self.max_len, "…"),
            publisher: Box::new(self.publisher),
            hashtags: HashtagConfig {
                general: self.general_tags,
                per_post_general: 1,
            },
            orchestrator: OrchestratorSettings {
                max_candidates_per_state: 3,
                canned_posts: self.canned,
            },
            politeness_delay: Duration::ZERO,
            max_age_days: 3,
        }
    }
}
