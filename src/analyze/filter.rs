//! Content filter: classifies a candidate as acceptable or rejected.
//!
//! Rules, applied to `lower(title + " " + summary)` in this order:
//! 1. Titles shorter than `min_title_chars` are rejected outright.
//! 2. Any `spam_keywords` hit rejects (promotional, political, meta/administrative).
//! 3. Any `price_markers` hit in the *title* rejects (`% off`, `$`, ...).
//! 4. Quality score = number of `topic_keywords` present; accepted only if
//!    `score >= min_topic_score`.
//!
//! Pure and deterministic: no state, no I/O.

use serde::Deserialize;

/// Keyword sets and thresholds. Deployment configuration, not code.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub spam_keywords: Vec<String>,
    pub topic_keywords: Vec<String>,
    pub price_markers: Vec<String>,
    pub min_topic_score: usize,
    pub min_title_chars: usize,
    pub max_age_days: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        fn list(v: &[&str]) -> Vec<String> {
            v.iter().map(|s| s.to_string()).collect()
        }
        Self {
            spam_keywords: list(&[
                // promotional
                "discount", "coupon", "promo code", "limited time", "buy now", "flash sale",
                "black friday", "cyber monday", "sponsored", "advertisement", "affiliate",
                "free trial", "sign up", "percent off", "special offer",
                // political
                "election", "senate", "congress", "democrat", "republican", "tariff",
                "president", "parliament", "campaign",
                // meta/administrative
                "weekly thread", "megathread", "daily discussion", "mod post", "announcement:",
            ]),
            topic_keywords: list(&[
                "analysis", "review", "guide", "tutorial", "news", "update", "release",
                "development", "design", "programming", "engine", "studio", "developer",
                "industry", "trend", "future", "technology", "innovation", "research", "study",
                "report", "interview", "behind the scenes", "post-mortem", "case study",
            ]),
            price_markers: list(&["% off", "$", "€", "£"]),
            min_topic_score: 1,
            min_title_chars: 15,
            max_age_days: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    TitleTooShort { len: usize, min: usize },
    Spam { keyword: String },
    PriceMarker { marker: String },
    LowQuality { score: usize, min: usize },
}

impl RejectReason {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::TitleTooShort { .. } => "title_too_short",
            RejectReason::Spam { .. } => "spam",
            RejectReason::PriceMarker { .. } => "price_marker",
            RejectReason::LowQuality { .. } => "low_quality",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::TitleTooShort { len, min } => write!(f, "title too short ({len} < {min})"),
            RejectReason::Spam { keyword } => write!(f, "spam keyword `{keyword}`"),
            RejectReason::PriceMarker { marker } => write!(f, "price marker `{marker}` in title"),
            RejectReason::LowQuality { score, min } => write!(f, "quality score {score} < {min}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept { score: usize },
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }
}

/// Stateless classifier over a prepared (lowercased) keyword set.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    spam: Vec<String>,
    topic: Vec<String>,
    price: Vec<String>,
    min_score: usize,
    min_title_chars: usize,
}

impl ContentFilter {
    pub fn new(cfg: &FilterConfig) -> Self {
        fn prep(v: &[String]) -> Vec<String> {
            v.iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        }
        Self {
            spam: prep(&cfg.spam_keywords),
            topic: prep(&cfg.topic_keywords),
            price: prep(&cfg.price_markers),
            min_score: cfg.min_topic_score,
            min_title_chars: cfg.min_title_chars,
        }
    }

    pub fn classify(&self, title: &str, summary: &str) -> Verdict {
        let title_len = title.trim().chars().count();
        if title_len < self.min_title_chars {
            return Verdict::Reject(RejectReason::TitleTooShort {
                len: title_len,
                min: self.min_title_chars,
            });
        }

        let text = format!("{title} {summary}").to_lowercase();
        if let Some(k) = self.first_spam_hit(&text) {
            return Verdict::Reject(RejectReason::Spam {
                keyword: k.to_string(),
            });
        }

        let title_lc = title.to_lowercase();
        if let Some(m) = self.price.iter().find(|m| title_lc.contains(m.as_str())) {
            return Verdict::Reject(RejectReason::PriceMarker { marker: m.clone() });
        }

        let score = self.topic.iter().filter(|k| text.contains(k.as_str())).count();
        if score < self.min_score {
            return Verdict::Reject(RejectReason::LowQuality {
                score,
                min: self.min_score,
            });
        }
        Verdict::Accept { score }
    }

    pub fn classify_item(&self, item: &crate::ingest::types::CandidateItem) -> Verdict {
        self.classify(&item.title, &item.summary)
    }

    /// First spam keyword found in already-lowercased `text`.
    pub fn first_spam_hit(&self, text: &str) -> Option<&str> {
        self.spam
            .iter()
            .find(|k| text.contains(k.as_str()))
            .map(String::as_str)
    }
}
