//! persona-poster: one batch run per invocation.
//!
//! Loads `.env` and the bot config, runs the pipeline once, persists the seen set
//! and metrics, and maps the outcome to an exit code:
//! `0` published, `1` startup/config failure, `2` all strategies exhausted,
//! `3` publish failed.

use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

use persona_poster::metrics::Metrics;
use persona_poster::{init_tracing, run_once, Bot, BotConfig, JsonFileSeenStore, SeenSet, SeenSetStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "startup failed");
            ExitCode::from(1)
        }
    }
}

async fn run() -> anyhow::Result<u8> {
    let cfg = BotConfig::load().context("load configuration")?;
    let metrics = match &cfg.metrics_textfile {
        Some(path) => Some(Metrics::init(path.clone())?),
        None => None,
    };

    let now = Utc::now();
    let bot = Bot::from_config(&cfg, now.date_naive()).context("build collaborators")?;
    info!(
        sources = bot.sources.len(),
        personas = bot.registry.all().len(),
        backend = bot.adapter.backend_name(),
        publisher = bot.publisher.name(),
        "bot ready"
    );

    let store = cfg.seen_store_path.clone().map(JsonFileSeenStore::new);
    let mut seen = match &store {
        Some(s) => s.load().unwrap_or_else(|e| {
            warn!(path = %s.path().display(), error = %e, "seen store unreadable; starting empty");
            SeenSet::new()
        }),
        None => SeenSet::new(),
    };

    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let result = run_once(&bot, &mut seen, &mut rng, now).await;

    if let Some(s) = &store {
        if let Err(e) = s.save(&seen) {
            warn!(path = %s.path().display(), error = %e, "failed to persist seen store");
        }
    }
    if let Some(m) = &metrics {
        if let Err(e) = m.write_textfile(Utc::now().timestamp()) {
            warn!(path = %m.path().display(), error = %format!("{e:#}"), "failed to write metrics textfile");
        }
    }

    Ok(match result {
        Ok(report) => {
            info!(
                id = %report.post_id,
                strategy = %report.strategy,
                persona = %report.persona,
                candidate = report.candidate_id.as_deref().unwrap_or("-"),
                attempts = report.attempts,
                fetched = report.fetched,
                accepted = report.accepted,
                source_failures = report.source_failures,
                "run complete"
            );
            0
        }
        Err(e) => {
            error!(error = %e, "run failed");
            e.exit_code() as u8
        }
    })
}
