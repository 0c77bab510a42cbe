// src/ingest/config.rs
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::providers::rss::RssFeedSource;
use crate::ingest::types::ContentSource;

pub const ENV_FEED_URLS: &str = "FEED_URLS";

/// One configured feed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedSpec {
    pub url: String,
    /// Display label; defaults to the URL host.
    #[serde(default)]
    pub label: Option<String>,
}

impl FeedSpec {
    pub fn label(&self) -> String {
        self.label
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| host_of(&self.url))
    }
}

/// `https://www.example.com/feed` → `www.example.com`
fn host_of(url: &str) -> String {
    url.split("//")
        .last()
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

/// Parse a comma/newline separated list of feed URLs; blanks and duplicates are dropped.
pub fn parse_feed_list(raw: &str) -> Vec<FeedSpec> {
    let mut seen = std::collections::HashSet::new();
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(|s| FeedSpec {
            url: s.to_string(),
            label: None,
        })
        .collect()
}

/// Build HTTP-backed sources for the given feeds.
pub fn build_sources(
    feeds: &[FeedSpec],
    fetch_timeout: Duration,
    per_feed_limit: usize,
) -> Vec<Box<dyn ContentSource>> {
    feeds
        .iter()
        .map(|f| {
            Box::new(
                RssFeedSource::from_url(&f.label(), &f.url, fetch_timeout).with_limit(per_feed_limit),
            ) as Box<dyn ContentSource>
        })
        .collect()
}
