//! Generator adapter: one logical generation call on top of a raw backend.
//!
//! Per call the adapter makes at most `max_attempts` backend requests. Each request
//! is bounded by `timeout`; an expired timeout counts as [`BackendError::Timeout`].
//! Transient backend errors and rejected output (empty, too short, too long, off topic)
//! are retried with linear backoff (`backoff * attempt`). Non-transient backend errors
//! (client errors, no candidates, unavailable) are returned immediately.

use std::time::Duration;

use tracing::{debug, warn};

use crate::analyze::filter::ContentFilter;
use crate::error::{BackendError, GenerationError};
use crate::generate::backend::DynBackend;
use crate::generate::clean::TextCleaner;

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub min_chars: usize,
    pub max_raw_chars: usize,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_attempts: 2,
            backoff: Duration::from_millis(750),
            min_chars: 20,
            max_raw_chars: 600,
        }
    }
}

pub struct GeneratorAdapter {
    backend: DynBackend,
    settings: AdapterSettings,
    cleaner: TextCleaner,
    off_topic: Option<ContentFilter>,
}

impl GeneratorAdapter {
    pub fn new(backend: DynBackend, settings: AdapterSettings, cleaner: TextCleaner) -> Self {
        Self {
            backend,
            settings,
            cleaner,
            off_topic: None,
        }
    }

    /// Reject generated text that hits one of the filter's spam keywords.
    pub fn with_off_topic_filter(mut self, filter: ContentFilter) -> Self {
        self.off_topic = Some(filter);
        self
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_traced(prompt).await.0
    }

    /// Like [`generate`](Self::generate), also returning the last raw backend text
    /// received, whether or not it was accepted.
    pub async fn generate_traced(&self, prompt: &str) -> (Result<String, GenerationError>, Option<String>) {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_raw = None;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (result, raw) = self.call_once(prompt).await;
            if raw.is_some() {
                last_raw = raw;
            }
            let err = match result {
                Ok(text) => return (Ok(text), last_raw),
                Err(e) => e,
            };

            let retryable = match &err {
                GenerationError::Backend(b) => b.is_transient(),
                _ => true,
            };
            if !retryable || attempt >= max_attempts {
                debug!(backend = self.backend.name(), attempt, error = %err, "generation failed");
                return (Err(err), last_raw);
            }

            let wait = self.settings.backoff * attempt;
            warn!(
                backend = self.backend.name(),
                attempt,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "generation attempt failed; retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn call_once(&self, prompt: &str) -> (Result<String, GenerationError>, Option<String>) {
        let raw = match tokio::time::timeout(self.settings.timeout, self.backend.generate(prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return (Err(e.into()), None),
            Err(_) => return (Err(BackendError::Timeout.into()), None),
        };
        (self.accept(&raw), Some(raw))
    }

    /// Clean raw text and apply the sanity checks.
    pub fn accept(&self, raw: &str) -> Result<String, GenerationError> {
        let text = self.cleaner.clean(raw);
        let len = text.chars().count();
        if len == 0 {
            return Err(GenerationError::Empty);
        }
        if len < self.settings.min_chars {
            return Err(GenerationError::TooShort {
                len,
                min: self.settings.min_chars,
            });
        }
        if len > self.settings.max_raw_chars {
            return Err(GenerationError::TooLong {
                len,
                max: self.settings.max_raw_chars,
            });
        }
        if let Some(filter) = &self.off_topic {
            if let Some(k) = filter.first_spam_hit(&text.to_lowercase()) {
                return Err(GenerationError::OffTopic(k.to_string()));
            }
        }
        Ok(text)
    }
}
