//! Runs the whole pipeline offline: embedded RSS fixture, mock backend, dry-run publisher.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

use persona_poster::analyze::ContentFilter;
use persona_poster::config::generator::MOCK_TEXT;
use persona_poster::generate::backend::StaticBackend;
use persona_poster::generate::clean::TextCleaner;
use persona_poster::generate::{GeneratorAdapter, PromptBuilder};
use persona_poster::ingest::providers::rss::RssFeedSource;
use persona_poster::publish::DryRunPublisher;
use persona_poster::validate::OutputValidator;
use persona_poster::{init_tracing, run_once, Bot, BotConfig, ContentSource, SeenSet};

const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Demo</title>
<item>
  <title>Studio ships a major engine update for indie developers</title>
  <link>https://demo.test/engine-update</link>
  <description>The release focuses on faster builds and better tooling.</description>
  <enclosure url="https://demo.test/engine.png" type="image/png"/>
</item>
<item>
  <title>Limited time coupon on every bundle this weekend</title>
  <link>https://demo.test/coupon</link>
  <description>Buy now.</description>
</item>
<item>
  <title>Remembering the 1998 launch that changed the industry</title>
  <link>https://demo.test/retro</link>
  <description>A look back at a classic release.</description>
</item>
</channel></rss>"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cfg = BotConfig::default();
    let now = Utc::now();

    let filter = ContentFilter::new(&cfg.filter);
    let adapter = GeneratorAdapter::new(
        Arc::new(StaticBackend::new(MOCK_TEXT)),
        cfg.generation.adapter_settings(),
        TextCleaner::new(&cfg.generation.banned_phrases, cfg.generation.neutral_voice),
    )
    .with_off_topic_filter(filter.clone());

    let bot = Bot {
        sources: vec![Box::new(RssFeedSource::from_fixture_str("Demo", FEED)) as Box<dyn ContentSource>],
        filter,
        registry: cfg.registry()?,
        adapter,
        prompts: PromptBuilder::new(now.date_naive(), cfg.output.max_len, cfg.generation.neutral_voice),
        validator: OutputValidator::new(cfg.output.max_len, cfg.output.ellipsis.clone()),
        publisher: Box::new(DryRunPublisher::new()),
        hashtags: cfg.hashtags.clone(),
        orchestrator: cfg.orchestrator_settings(),
        politeness_delay: Duration::ZERO,
        max_age_days: cfg.filter.max_age_days,
    };

    let mut seen = SeenSet::new();
    let report = run_once(&bot, &mut seen, &mut StdRng::seed_from_u64(7), now).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
