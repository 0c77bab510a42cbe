// tests/pipeline_scenarios.rs
mod common;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{item, persona, BotParts, RecordingPublisher, ScriptedBackend};
use persona_poster::generate::backend::DisabledBackend;
use persona_poster::orchestrator::FallbackState;
use persona_poster::persona::PersonaSpec;
use persona_poster::{run_once, RunError, SeenSet};
use std::sync::Arc;

fn historian() -> PersonaSpec {
    PersonaSpec {
        date_pattern: true,
        ..persona("historian", &["retro"], "#History", 30, false)
    }
}

#[tokio::test]
async fn exact_match_on_historian_publishes_without_fallback() {
    let backend = ScriptedBackend::always("A launch that shaped a generation of players, still felt today.");
    let parts = BotParts::new(
        backend.clone(),
        vec![persona("gear", &["engine"], "#GameDev", 10, true), historian()],
    )
    .with_items(vec![
        item("Weather patterns shift across the northern coast", ""),
        item("Local bakery wins a regional bread award", ""),
        item("Looking back at the console launch of 1998", "Crowds queued overnight."),
    ]);
    let publisher = parts.publisher.clone();
    let bot = parts.build();

    let report = run_once(&bot, &mut SeenSet::new(), &mut StdRng::seed_from_u64(1), Utc::now())
        .await
        .unwrap();

    assert_eq!(report.strategy, FallbackState::TryExactMatch);
    assert_eq!(report.persona, "historian");
    assert_eq!(report.attempts, 1);
    assert_eq!(backend.calls(), 1);
    assert!(backend.prompts()[0].contains("console launch of 1998"));

    let posts = publisher.published();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].hashtags[0], "#History");
    assert!(posts[0].text.contains("#History"));
    assert_eq!(report.post_id, "rec-1");
}

#[tokio::test]
async fn no_keyword_match_falls_to_second_flexible_persona() {
    let backend = ScriptedBackend::new(|prompt| {
        if prompt.contains("alpha-style") {
            Ok(String::new())
        } else {
            Ok("Every story has an angle worth a second look today.".to_string())
        }
    });
    let parts = BotParts::new(
        backend.clone(),
        vec![
            persona("alpha", &["engine"], "#Alpha", 1, true),
            persona("beta", &["studio"], "#Beta", 2, true),
        ],
    )
    .with_items(
        [
            "Gardening tips for a bright spring",
            "Bakery opens a second downtown shop",
            "River cleanup draws hundreds of volunteers",
            "Museum restores an ancient tapestry",
            "Marathon route changes for runners",
        ]
        .iter()
        .map(|t| item(t, ""))
        .collect(),
    );
    let publisher = parts.publisher.clone();
    let bot = parts.build();

    let report = run_once(&bot, &mut SeenSet::new(), &mut StdRng::seed_from_u64(2), Utc::now())
        .await
        .unwrap();

    assert_eq!(report.strategy, FallbackState::TryFlexibleAdaptation);
    assert_eq!(report.persona, "beta");
    let prompts = backend.prompts();
    assert!(prompts.iter().all(|p| p.contains("reframes it")), "no exact prompts expected");
    assert_eq!(publisher.published()[0].hashtags[0], "#Beta");
}

#[tokio::test]
async fn empty_feeds_and_no_generator_publish_canned_post() {
    let mut parts = BotParts::new(Arc::new(DisabledBackend), vec![persona("gear", &["engine"], "#GameDev", 1, true)])
        .with_items(vec![]);
    parts.canned = vec!["Ship small, ship often.".into()];
    let publisher = parts.publisher.clone();
    let bot = parts.build();

    let report = run_once(&bot, &mut SeenSet::new(), &mut StdRng::seed_from_u64(3), Utc::now())
        .await
        .unwrap();

    assert_eq!(report.strategy, FallbackState::TryGenericFallback);
    assert!(report.canned);
    assert_eq!(report.fetched, 0);
    assert!(publisher.published()[0].text.starts_with("Ship small, ship often."));
}

#[tokio::test]
async fn empty_generations_everywhere_exhaust_and_publish_nothing() {
    let backend = ScriptedBackend::always("");
    let parts = BotParts::new(
        backend.clone(),
        vec![
            persona("alpha", &["engine"], "#Alpha", 1, true),
            persona("beta", &[], "#Beta", 2, true),
        ],
    )
    .with_items(
        [
            "New engine benchmark results are in",
            "Engine maker opens a research lab",
            "Open source engine hits version two",
            "Physics engine rewrite lands this week",
            "Engine tooling survey shows big shifts",
            "Rendering engine adds ray tracing",
            "Engine licensing terms get simpler",
            "Audio engine gets a spatial upgrade",
        ]
        .iter()
        .map(|t| item(t, ""))
        .collect(),
    );
    let publisher = parts.publisher.clone();
    let bot = parts.build();

    let err = run_once(&bot, &mut SeenSet::new(), &mut StdRng::seed_from_u64(4), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Exhausted(_)));
    assert_eq!(err.exit_code(), 2);
    assert!(publisher.published().is_empty());
    // exact 3 + adaptation 3 + generic 1, each with 2 tries in the adapter
    assert_eq!(backend.calls(), 14);
}

#[tokio::test]
async fn overlong_generation_is_truncated_with_hashtag_suffix_intact() {
    let long: String = "lorem ipsum dolor sit amet ".repeat(12).chars().take(310).collect();
    assert_eq!(long.chars().count(), 310);
    let backend = ScriptedBackend::always(&long);
    let mut parts = BotParts::new(backend, vec![persona("alpha", &["engine"], "#A", 1, true)])
        .with_items(vec![item("Engine news from the studio floor", "")]);
    parts.general_tags = vec!["#B".into()];
    let publisher = parts.publisher.clone();
    let bot = parts.build();

    run_once(&bot, &mut SeenSet::new(), &mut StdRng::seed_from_u64(5), Utc::now())
        .await
        .unwrap();

    let post = &publisher.published()[0];
    assert!(post.text.chars().count() <= 280);
    assert!(post.text.ends_with("… #A #B"), "{}", post.text);
    let body = post.text.trim_end_matches(" #A #B").trim_end_matches('…');
    assert!(long.starts_with(body));
    assert!(long[body.len()..].starts_with(' '), "cut mid-word");
}

#[tokio::test]
async fn publish_failure_is_fatal_and_not_retried() {
    let mut parts = BotParts::new(
        ScriptedBackend::always("A perfectly fine post about engines and tools."),
        vec![persona("alpha", &["engine"], "#A", 1, true)],
    )
    .with_items(vec![item("Engine news from the studio floor", "")]);
    parts.publisher = RecordingPublisher::failing();
    let bot = parts.build();

    let err = run_once(&bot, &mut SeenSet::new(), &mut StdRng::seed_from_u64(6), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Publish(_)));
    assert_eq!(err.exit_code(), 3);
}
