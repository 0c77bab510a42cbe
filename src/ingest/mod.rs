// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use crate::ingest::types::{CandidateItem, ContentSource};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use std::time::Duration;

/// Normalize text: decode entities, strip tags, collapse whitespace, strip stray punctuation.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Strip trailing sentence punctuation (keep quotes and question marks)
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    // 6) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Drop items published more than `max_age_days` before `now`. Undated items are kept.
pub fn drop_stale(
    now: DateTime<Utc>,
    items: Vec<CandidateItem>,
    max_age_days: i64,
) -> (Vec<CandidateItem>, usize) {
    let horizon = ChronoDuration::days(max_age_days.max(0));
    let before = items.len();
    let kept: Vec<CandidateItem> = items
        .into_iter()
        .filter(|it| match it.published_at {
            Some(ts) => now.signed_duration_since(ts) <= horizon,
            None => true,
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Result of one aggregation pass over all sources.
#[derive(Debug, Default)]
pub struct Collected {
    pub items: Vec<CandidateItem>,
    pub source_failures: usize,
    pub stale: usize,
}

/// Fetch every source in order, pausing `politeness_delay` between requests.
/// A failing source is logged and skipped; if all fail the result is just empty.
pub async fn collect_candidates(
    sources: &[Box<dyn ContentSource>],
    politeness_delay: Duration,
    max_age_days: i64,
    now: DateTime<Utc>,
) -> Collected {
    let mut raw = Vec::new();
    let mut failures = 0usize;

    for (i, src) in sources.iter().enumerate() {
        if i > 0 && !politeness_delay.is_zero() {
            tokio::time::sleep(politeness_delay).await;
        }
        match src.fetch().await {
            Ok(mut v) => {
                tracing::debug!(source = src.label(), items = v.len(), "source fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(error = %e, source = src.label(), "source error, skipping");
                counter!("ingest_source_errors_total").increment(1);
                failures += 1;
            }
        }
    }

    let (items, stale) = drop_stale(now, raw, max_age_days);
    counter!("ingest_items_total").increment(items.len() as u64);

    if failures > 0 && failures == sources.len() {
        tracing::warn!(sources = failures, "all sources failed; continuing with no candidates");
    }

    Collected {
        items,
        source_failures: failures,
        stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_ws_and_punct() {
        let s = "  Hello,&nbsp;&nbsp; world!!!  ";
        let out = normalize_text(s);
        assert_eq!(out, "Hello, world");
    }

    #[test]
    fn normalize_text_strips_tags_and_quotes() {
        let s = "<p>\u{201C}Quoted\u{201D}</p><br/>text";
        assert_eq!(normalize_text(s), "\"Quoted\" text");
    }

    #[test]
    fn stale_items_are_dropped_undated_kept() {
        let now = Utc::now();
        let fresh = CandidateItem::new("fresh", "", None, "X")
            .unwrap()
            .with_published_at(Some(now - ChronoDuration::hours(5)));
        let old = CandidateItem::new("old", "", None, "X")
            .unwrap()
            .with_published_at(Some(now - ChronoDuration::days(10)));
        let undated = CandidateItem::new("undated", "", None, "X").unwrap();

        let (kept, dropped) = drop_stale(now, vec![fresh, old, undated], 3);
        assert_eq!(dropped, 1);
        let titles: Vec<_> = kept.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh", "undated"]);
    }
}
