//! One bot run: collect → screen → orchestrate → validate → publish.
//!
//! The run owns no global state. The caller passes in the [`SeenSet`] (possibly
//! loaded from a store) and the random source, and persists the set afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analyze::filter::{ContentFilter, Verdict};
use crate::config::{BotConfig, HashtagConfig};
use crate::dedupe::SeenSet;
use crate::error::RunError;
use crate::generate::clean::TextCleaner;
use crate::generate::{GeneratorAdapter, PromptBuilder};
use crate::ingest::collect_candidates;
use crate::ingest::config::build_sources;
use crate::ingest::types::{CandidateItem, ContentSource};
use crate::orchestrator::{FallbackOrchestrator, FallbackState, OrchestratorSettings, TextOrigin};
use crate::persona::PersonaRegistry;
use crate::publish::PublishTarget;
use crate::validate::{compose_hashtags, OutputValidator};

/// Collaborators for a run, built once from configuration.
pub struct Bot {
    pub sources: Vec<Box<dyn ContentSource>>,
    pub filter: ContentFilter,
    pub registry: PersonaRegistry,
    pub adapter: GeneratorAdapter,
    pub prompts: PromptBuilder,
    pub validator: OutputValidator,
    pub publisher: Box<dyn PublishTarget>,
    pub hashtags: HashtagConfig,
    pub orchestrator: OrchestratorSettings,
    pub politeness_delay: Duration,
    pub max_age_days: i64,
}

impl Bot {
    /// Wire HTTP sources, the configured backend and publish target.
    pub fn from_config(cfg: &BotConfig, today: NaiveDate) -> anyhow::Result<Self> {
        let sources = build_sources(
            &cfg.ingest.feeds,
            cfg.ingest.fetch_timeout(),
            cfg.ingest.per_feed_limit,
        );
        let filter = ContentFilter::new(&cfg.filter);
        let adapter = GeneratorAdapter::new(
            cfg.backend.build_backend(),
            cfg.generation.adapter_settings(),
            TextCleaner::new(&cfg.generation.banned_phrases, cfg.generation.neutral_voice),
        )
        .with_off_topic_filter(filter.clone());
        Ok(Self {
            sources,
            filter,
            registry: cfg.registry()?,
            adapter,
            prompts: PromptBuilder::new(today, cfg.output.max_len, cfg.generation.neutral_voice),
            validator: OutputValidator::new(cfg.output.max_len, cfg.output.ellipsis.clone()),
            publisher: cfg.publish.build_publisher()?,
            hashtags: cfg.hashtags.clone(),
            orchestrator: cfg.orchestrator_settings(),
            politeness_delay: cfg.ingest.politeness_delay(),
            max_age_days: cfg.filter.max_age_days,
        })
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub post_id: String,
    pub strategy: FallbackState,
    pub canned: bool,
    pub persona: String,
    pub candidate_id: Option<String>,
    pub text: String,
    pub attempts: usize,
    pub fetched: usize,
    pub accepted: usize,
    pub source_failures: usize,
}

/// Unseen, non-duplicate candidates that pass the content filter, in fetch order.
pub fn screen(items: Vec<CandidateItem>, seen: &SeenSet, filter: &ContentFilter) -> Vec<CandidateItem> {
    let mut batch = SeenSet::new();
    let mut accepted = Vec::new();
    for item in items {
        if seen.contains(&item.id) || batch.contains(&item.id) {
            debug!(candidate = %item.id, "already seen");
            continue;
        }
        if seen.is_near_duplicate(&item.title) || batch.is_near_duplicate(&item.title) {
            debug!(candidate = %item.id, title = %item.short_title(60), "near-duplicate title");
            continue;
        }
        batch.mark(&item.id, &item.title);
        match filter.classify_item(&item) {
            Verdict::Accept { score } => {
                debug!(candidate = %item.id, score, "accepted");
                accepted.push(item);
            }
            Verdict::Reject(reason) => {
                counter!("filter_rejected_total", "reason" => reason.label()).increment(1);
                debug!(candidate = %item.id, title = %item.short_title(60), %reason, "rejected");
            }
        }
    }
    accepted
}

pub async fn run_once<R: Rng + ?Sized>(
    bot: &Bot,
    seen: &mut SeenSet,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    let collected = collect_candidates(&bot.sources, bot.politeness_delay, bot.max_age_days, now).await;
    let fetched = collected.items.len() + collected.stale;
    let candidates = screen(collected.items, seen, &bot.filter);
    info!(
        fetched,
        stale = collected.stale,
        accepted = candidates.len(),
        source_failures = collected.source_failures,
        "candidates screened"
    );

    let orchestrator = FallbackOrchestrator::new(
        &bot.registry,
        &bot.adapter,
        &bot.prompts,
        bot.orchestrator.clone(),
    );
    let outcome = orchestrator.run(&candidates, seen, rng).await?;

    let tags = compose_hashtags(
        &outcome.persona,
        &bot.hashtags.general,
        bot.hashtags.per_post_general,
        rng,
    );
    let media = outcome.candidate.as_ref().and_then(|c| c.media_url.clone());
    let post = bot.validator.finalize(&outcome.text, &tags, media);

    let receipt = match bot.publisher.publish(&post).await {
        Ok(r) => {
            counter!("publish_total", "outcome" => "ok").increment(1);
            r
        }
        Err(e) => {
            counter!("publish_total", "outcome" => "error").increment(1);
            warn!(publisher = bot.publisher.name(), error = %e, "publish failed");
            return Err(e.into());
        }
    };

    info!(
        id = %receipt.id,
        publisher = bot.publisher.name(),
        strategy = %outcome.state,
        persona = %outcome.persona.name,
        chars = post.char_len(),
        "post published"
    );

    Ok(RunReport {
        post_id: receipt.id,
        strategy: outcome.state,
        canned: outcome.origin == TextOrigin::Canned,
        persona: outcome.persona.name.clone(),
        candidate_id: outcome.candidate.map(|c| c.id),
        text: post.text,
        attempts: outcome.attempts.len(),
        fetched,
        accepted: candidates.len(),
        source_failures: collected.source_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::filter::FilterConfig;

    fn item(title: &str, link: &str) -> CandidateItem {
        CandidateItem::new(title, "", Some(link.to_string()), "T").unwrap()
    }

    #[test]
    fn screen_drops_seen_near_duplicates_and_rejects() {
        let filter = ContentFilter::new(&FilterConfig::default());
        let mut seen = SeenSet::new();
        let old = item("Studio releases new engine update today", "https://a/old");
        seen.mark(&old.id, &old.title);

        let items = vec![
            old.clone(),
            item("Studio releases new engine update today!", "https://b/syndicated"),
            item("Developer interview on engine design choices", "https://a/1"),
            item("Developer interview on engine design choices", "https://a/1"),
            item("Huge coupon for engine fans this week", "https://a/2"),
            item("short", "https://a/3"),
        ];
        let out = screen(items, &seen, &filter);
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Developer interview on engine design choices"]);
    }
}
