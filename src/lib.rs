// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod metrics;
pub mod orchestrator;
pub mod persona;
pub mod pipeline;
pub mod publish;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::config::BotConfig;
pub use crate::dedupe::{JsonFileSeenStore, SeenSet, SeenSetStore};
pub use crate::error::{ExhaustedError, PublishError, RunError};
pub use crate::ingest::types::{CandidateItem, ContentSource};
pub use crate::pipeline::{run_once, Bot, RunReport};
pub use crate::publish::{PublishReceipt, PublishTarget};
pub use crate::validate::Post;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "BOT_LOG_FORMAT";

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `BOT_LOG_FORMAT=json` selects JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("persona_poster=info,warn"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        let _ = registry.with(fmt::layer().json().with_current_span(false)).try_init();
    } else {
        let _ = registry.with(fmt::layer().compact()).try_init();
    }
}
