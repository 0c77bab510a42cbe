use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::error::SourceFetchError;
use crate::ingest::types::{CandidateItem, ContentSource};

const USER_AGENT: &str = "persona-poster/0.1 (+feed reader)";

static RE_IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"'>]+)["']"#).expect("img regex"));

/// RSS 2.0 / Atom feed reader.
pub struct RssFeedSource {
    label: String,
    per_feed_limit: usize,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
    },
}

impl RssFeedSource {
    /// Parses an in-memory document instead of fetching (tests, demo).
    pub fn from_fixture_str(label: &str, xml: &str) -> Self {
        Self {
            label: label.to_string(),
            per_feed_limit: usize::MAX,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(label: &str, url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            label: label.to_string(),
            per_feed_limit: usize::MAX,
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    pub fn with_limit(mut self, per_feed_limit: usize) -> Self {
        self.per_feed_limit = per_feed_limit.max(1);
        self
    }

    fn items_from_str(&self, xml: &str) -> Result<Vec<CandidateItem>, SourceFetchError> {
        let entries =
            parse_entries(xml).map_err(|e| SourceFetchError::new(&self.label, e))?;

        let mut out = Vec::new();
        for raw in entries.into_iter().take(self.per_feed_limit) {
            let decoded_summary = html_escape::decode_html_entities(&raw.summary).to_string();
            let media = raw.media.or_else(|| {
                RE_IMG_SRC
                    .captures(&decoded_summary)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
            });
            let title = crate::ingest::normalize_text(&raw.title);
            let summary = crate::ingest::normalize_text(&decoded_summary);
            let Some(item) = CandidateItem::new(title, summary, raw.link, &self.label) else {
                continue;
            };
            out.push(
                item.with_published_at(raw.published.as_deref().and_then(parse_timestamp))
                    .with_media_url(media),
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl ContentSource for RssFeedSource {
    async fn fetch(&self) -> Result<Vec<CandidateItem>, SourceFetchError> {
        match &self.mode {
            Mode::Fixture(s) => self.items_from_str(s),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| SourceFetchError::new(&self.label, e))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(SourceFetchError::new(
                        &self.label,
                        format!("HTTP {}", status.as_u16()),
                    ));
                }
                let body = resp
                    .text()
                    .await
                    .map_err(|e| SourceFetchError::new(&self.label, e))?;
                self.items_from_str(&body)
            }
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

// ------------------------------------------------------------
// Streaming parser (namespace-agnostic: matches on local names)
// ------------------------------------------------------------

#[derive(Debug, Default)]
struct RawEntry {
    title: String,
    link: Option<String>,
    summary: String,
    published: Option<String>,
    media: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Summary,
    Published,
}

fn field_for(local: &[u8]) -> Option<Field> {
    match local {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        b"description" | b"summary" | b"encoded" | b"content" => Some(Field::Summary),
        b"pubDate" | b"published" | b"updated" | b"date" => Some(Field::Published),
        _ => None,
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// `enclosure`, `media:content`, `media:thumbnail` and Atom `link` carry data in attributes.
fn apply_attributes(entry: &mut RawEntry, e: &BytesStart<'_>) {
    let local = e.local_name();
    match local.as_ref() {
        b"enclosure" | b"content" | b"thumbnail" => {
            let Some(url) = attr(e, b"url") else {
                return;
            };
            let kind = attr(e, b"type").or_else(|| attr(e, b"medium"));
            let is_image = kind
                .as_deref()
                .map(|k| k.starts_with("image"))
                .unwrap_or(local.as_ref() == b"thumbnail");
            if is_image && entry.media.is_none() {
                entry.media = Some(url);
            }
        }
        b"link" => {
            let Some(href) = attr(e, b"href") else {
                return;
            };
            match attr(e, b"rel").as_deref() {
                None | Some("alternate") => {
                    if entry.link.is_none() {
                        entry.link = Some(href);
                    }
                }
                Some("enclosure") => {
                    let is_image = attr(e, b"type")
                        .map(|t| t.starts_with("image"))
                        .unwrap_or(false);
                    if is_image && entry.media.is_none() {
                        entry.media = Some(href);
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
}

fn push_text(entry: &mut RawEntry, field: Field, text: &str) {
    match field {
        Field::Title => entry.title.push_str(text),
        Field::Summary => entry.summary.push_str(text),
        Field::Link => {
            let t = text.trim();
            if !t.is_empty() && entry.link.is_none() {
                entry.link = Some(t.to_string());
            }
        }
        Field::Published => {
            if entry.published.is_none() {
                entry.published = Some(text.trim().to_string());
            }
        }
    }
}

fn parse_entries(xml: &str) -> Result<Vec<RawEntry>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut current: Option<RawEntry> = None;
    // Field of the open direct child of the entry. Nested elements (`media:title`,
    // Atom `source/title`) never open a field of their own.
    let mut field: Option<Field> = None;
    let mut depth = 0usize;
    let mut summary_done = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                if local == b"item" || local == b"entry" {
                    current = Some(RawEntry::default());
                    depth = 0;
                    summary_done = false;
                    continue;
                }
                let Some(entry) = current.as_mut() else {
                    continue;
                };
                apply_attributes(entry, &e);
                let direct_child = depth == 0;
                depth += 1;
                if !direct_child {
                    continue;
                }
                if let Some(f) = field_for(&local) {
                    // first summary-like element wins; `content:encoded` often repeats `description`
                    if f == Field::Summary && (summary_done || attr(&e, b"url").is_some()) {
                        continue;
                    }
                    field = Some(f);
                }
            }
            Event::Empty(e) => {
                if let Some(entry) = current.as_mut() {
                    apply_attributes(entry, &e);
                }
            }
            Event::Text(t) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    push_text(entry, f, &String::from_utf8_lossy(&t));
                }
            }
            Event::CData(c) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    push_text(entry, f, &String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                if local.as_ref() == b"item" || local.as_ref() == b"entry" {
                    if let Some(entry) = current.take() {
                        out.push(entry);
                    }
                    field = None;
                    continue;
                }
                if current.is_none() {
                    continue;
                }
                depth = depth.saturating_sub(1);
                if depth == 0 && field.take() == Some(Field::Summary) {
                    summary_done = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// RFC 2822 (`pubDate`) first, then RFC 3339 (Atom `updated`/`published`, `dc:date`).
fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = OffsetDateTime::parse(ts, &Rfc2822) {
        return DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0);
    }
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
