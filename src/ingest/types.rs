// src/ingest/types.rs
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::SourceFetchError;

/// A single fetched feed entry. Immutable once built.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub id: String, // sha256(link or title), 16 hex chars
    pub title: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_label: String, // e.g. "Ars Technica"
    pub link: Option<String>,
    pub media_url: Option<String>,
}

impl CandidateItem {
    /// Builds an item, deriving `id` from the link (or the title when no link exists).
    /// Returns `None` when the title is blank.
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        link: Option<String>,
        source_label: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return None;
        }
        let link = link
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        let id = derive_id(link.as_deref().unwrap_or(&title));
        Some(Self {
            id,
            title,
            summary: summary.into().trim().to_string(),
            published_at: None,
            source_label: source_label.into(),
            link,
            media_url: None,
        })
    }

    pub fn with_published_at(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.published_at = ts;
        self
    }

    pub fn with_media_url(mut self, url: Option<String>) -> Self {
        self.media_url = url;
        self
    }

    /// Lowercased `title + " " + summary`, the text every keyword rule runs against.
    pub fn match_text(&self) -> String {
        format!("{} {}", self.title, self.summary).to_lowercase()
    }

    /// Title cut to `max` chars for log lines.
    pub fn short_title(&self, max: usize) -> String {
        if self.title.chars().count() <= max {
            self.title.clone()
        } else {
            let mut s: String = self.title.chars().take(max).collect();
            s.push('…');
            s
        }
    }
}

/// Stable id for a source URL.
pub fn derive_id(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<CandidateItem>, SourceFetchError>;
    fn label(&self) -> &str;
}
