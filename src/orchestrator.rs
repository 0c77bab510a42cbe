//! # Fallback orchestrator
//!
//! Drives generation through strictly ordered states:
//!
//! `TryExactMatch -> TryFlexibleAdaptation -> TryGenericFallback -> Exhausted`
//!
//! - **TryExactMatch**: the persona with the best keyword score over all candidates;
//!   up to `max_candidates_per_state` matching candidates, drawn in random order.
//! - **TryFlexibleAdaptation**: every flexible persona not tried yet, in priority order;
//!   up to `max_candidates_per_state` unseen candidates each, topic match ignored.
//! - **TryGenericFallback**: one topic-agnostic prompt in the default persona's voice
//!   when the generator is available, then a random canned post if any are configured.
//! - **Exhausted**: terminal error; nothing is published.
//!
//! States are never revisited. Every candidate is marked in the [`SeenSet`] before
//! its prompt is sent, so no id reaches the generator twice in a run.

use std::collections::HashSet;
use std::fmt;

use metrics::counter;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analyze::matcher::{best_exact, score};
use crate::dedupe::SeenSet;
use crate::error::{ExhaustedError, GenerationError};
use crate::generate::{GeneratorAdapter, PromptBuilder};
use crate::ingest::types::CandidateItem;
use crate::persona::{PersonaProfile, PersonaRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FallbackState {
    TryExactMatch,
    TryFlexibleAdaptation,
    TryGenericFallback,
    Exhausted,
}

impl FallbackState {
    pub fn next(self) -> Self {
        match self {
            FallbackState::TryExactMatch => FallbackState::TryFlexibleAdaptation,
            FallbackState::TryFlexibleAdaptation => FallbackState::TryGenericFallback,
            FallbackState::TryGenericFallback | FallbackState::Exhausted => FallbackState::Exhausted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FallbackState::TryExactMatch => "exact_match",
            FallbackState::TryFlexibleAdaptation => "flexible_adaptation",
            FallbackState::TryGenericFallback => "generic_fallback",
            FallbackState::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for FallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptStatus {
    Pending,
    Succeeded,
    /// Empty, or shorter than the minimum after cleaning.
    RejectedEmpty,
    RejectedTooLong,
    RejectedOffTopic,
    BackendError,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Succeeded => "succeeded",
            AttemptStatus::RejectedEmpty => "rejected_empty",
            AttemptStatus::RejectedTooLong => "rejected_too_long",
            AttemptStatus::RejectedOffTopic => "rejected_off_topic",
            AttemptStatus::BackendError => "backend_error",
        }
    }
}

impl From<&GenerationError> for AttemptStatus {
    fn from(e: &GenerationError) -> Self {
        match e {
            GenerationError::Empty | GenerationError::TooShort { .. } => AttemptStatus::RejectedEmpty,
            GenerationError::TooLong { .. } => AttemptStatus::RejectedTooLong,
            GenerationError::OffTopic(_) => AttemptStatus::RejectedOffTopic,
            GenerationError::Backend(_) => AttemptStatus::BackendError,
        }
    }
}

/// One call into the generator adapter.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    pub state: FallbackState,
    pub candidate_id: Option<String>,
    pub persona: String,
    pub prompt: String,
    /// Last backend output before cleaning, kept for rejected attempts too.
    pub raw_text: Option<String>,
    pub text: Option<String>,
    pub status: AttemptStatus,
}

/// Where the winning text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextOrigin {
    Generated,
    Canned,
}

/// Successful terminal result: text ready for the output validator.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub state: FallbackState,
    pub origin: TextOrigin,
    pub text: String,
    pub persona: PersonaProfile,
    pub candidate: Option<CandidateItem>,
    pub attempts: Vec<GenerationAttempt>,
    /// States entered, in order.
    pub visited: Vec<FallbackState>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_candidates_per_state: usize,
    pub canned_posts: Vec<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_candidates_per_state: 3,
            canned_posts: Vec::new(),
        }
    }
}

pub struct FallbackOrchestrator<'a> {
    registry: &'a PersonaRegistry,
    adapter: &'a GeneratorAdapter,
    prompts: &'a PromptBuilder,
    settings: OrchestratorSettings,
}

struct Found {
    origin: TextOrigin,
    text: String,
    persona: PersonaProfile,
    candidate: Option<CandidateItem>,
}

impl<'a> FallbackOrchestrator<'a> {
    pub fn new(
        registry: &'a PersonaRegistry,
        adapter: &'a GeneratorAdapter,
        prompts: &'a PromptBuilder,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            adapter,
            prompts,
            settings,
        }
    }

    /// Run the state machine over screened candidates.
    pub async fn run<R: Rng + ?Sized>(
        &self,
        candidates: &[CandidateItem],
        seen: &mut SeenSet,
        rng: &mut R,
    ) -> Result<Outcome, ExhaustedError> {
        let mut attempts = Vec::new();
        let mut visited = Vec::new();
        let mut tried: HashSet<String> = HashSet::new();
        let mut state = FallbackState::TryExactMatch;

        loop {
            visited.push(state);
            let found = match state {
                FallbackState::TryExactMatch => {
                    self.try_exact(candidates, seen, rng, &mut tried, &mut attempts)
                        .await
                }
                FallbackState::TryFlexibleAdaptation => {
                    self.try_flexible(candidates, seen, rng, &mut tried, &mut attempts)
                        .await
                }
                FallbackState::TryGenericFallback => self.try_generic(rng, &mut attempts).await,
                FallbackState::Exhausted => {
                    counter!("fallback_strategy_total", "strategy" => state.as_str()).increment(1);
                    warn!(attempts = attempts.len(), "all fallback strategies exhausted");
                    return Err(ExhaustedError {
                        attempts: attempts.len(),
                    });
                }
            };

            if let Some(f) = found {
                counter!("fallback_strategy_total", "strategy" => state.as_str()).increment(1);
                info!(
                    strategy = %state,
                    persona = %f.persona.name,
                    candidate = f.candidate.as_ref().map(|c| c.id.as_str()).unwrap_or("-"),
                    attempts = attempts.len(),
                    "fallback state produced a post"
                );
                return Ok(Outcome {
                    state,
                    origin: f.origin,
                    text: f.text,
                    persona: f.persona,
                    candidate: f.candidate,
                    attempts,
                    visited,
                });
            }
            debug!(strategy = %state, "fallback state abandoned");
            state = state.next();
        }
    }

    async fn try_exact<R: Rng + ?Sized>(
        &self,
        candidates: &[CandidateItem],
        seen: &mut SeenSet,
        rng: &mut R,
        tried: &mut HashSet<String>,
        attempts: &mut Vec<GenerationAttempt>,
    ) -> Option<Found> {
        let personas = self.registry.all();
        let best = candidates
            .iter()
            .filter(|c| !seen.contains(&c.id))
            .filter_map(|c| best_exact(c, personas))
            .max_by(|a, b| {
                a.score
                    .cmp(&b.score)
                    .then_with(|| b.persona.priority.cmp(&a.persona.priority))
                    .then_with(|| b.persona.name.cmp(&a.persona.name))
            })?;
        let persona = best.persona;
        tried.insert(persona.name.clone());

        let mut matching: Vec<&CandidateItem> = candidates
            .iter()
            .filter(|c| !seen.contains(&c.id) && score(persona, c) > 0)
            .collect();
        matching.shuffle(rng);
        debug!(persona = %persona.name, matching = matching.len(), "exact match persona selected");

        self.try_candidates(
            FallbackState::TryExactMatch,
            persona,
            matching,
            seen,
            attempts,
            |p, c| self.prompts.exact(p, c),
        )
        .await
    }

    async fn try_flexible<R: Rng + ?Sized>(
        &self,
        candidates: &[CandidateItem],
        seen: &mut SeenSet,
        rng: &mut R,
        tried: &mut HashSet<String>,
        attempts: &mut Vec<GenerationAttempt>,
    ) -> Option<Found> {
        for persona in self.registry.flexible() {
            if !tried.insert(persona.name.clone()) {
                continue;
            }
            let mut pool: Vec<&CandidateItem> =
                candidates.iter().filter(|c| !seen.contains(&c.id)).collect();
            if pool.is_empty() {
                break;
            }
            pool.shuffle(rng);
            let found = self
                .try_candidates(
                    FallbackState::TryFlexibleAdaptation,
                    persona,
                    pool,
                    seen,
                    attempts,
                    |p, c| self.prompts.adaptation(p, c),
                )
                .await;
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Up to `max_candidates_per_state` candidates for one persona.
    async fn try_candidates(
        &self,
        state: FallbackState,
        persona: &PersonaProfile,
        pool: Vec<&CandidateItem>,
        seen: &mut SeenSet,
        attempts: &mut Vec<GenerationAttempt>,
        build: impl Fn(&PersonaProfile, &CandidateItem) -> String,
    ) -> Option<Found> {
        for item in pool.into_iter().take(self.settings.max_candidates_per_state) {
            if !seen.mark(&item.id, &item.title) {
                continue;
            }
            let prompt = build(persona, item);
            info!(
                strategy = %state,
                persona = %persona.name,
                candidate = %item.id,
                title = %item.short_title(60),
                "generating"
            );
            if let Some(text) = self
                .attempt(state, Some(item), persona, prompt, attempts)
                .await
            {
                return Some(Found {
                    origin: TextOrigin::Generated,
                    text,
                    persona: persona.clone(),
                    candidate: Some(item.clone()),
                });
            }
        }
        None
    }

    async fn try_generic<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        attempts: &mut Vec<GenerationAttempt>,
    ) -> Option<Found> {
        let persona = self.registry.default_persona();
        if self.adapter.is_available() {
            let prompt = self.prompts.generic(persona);
            if let Some(text) = self
                .attempt(FallbackState::TryGenericFallback, None, persona, prompt, attempts)
                .await
            {
                return Some(Found {
                    origin: TextOrigin::Generated,
                    text,
                    persona: persona.clone(),
                    candidate: None,
                });
            }
        } else {
            info!(backend = self.adapter.backend_name(), "generator unavailable; using canned posts");
        }

        let canned: Vec<&String> = self
            .settings
            .canned_posts
            .iter()
            .filter(|p| !p.trim().is_empty())
            .collect();
        let text = canned.choose(rng)?;
        Some(Found {
            origin: TextOrigin::Canned,
            text: text.trim().to_string(),
            persona: persona.clone(),
            candidate: None,
        })
    }

    async fn attempt(
        &self,
        state: FallbackState,
        candidate: Option<&CandidateItem>,
        persona: &PersonaProfile,
        prompt: String,
        attempts: &mut Vec<GenerationAttempt>,
    ) -> Option<String> {
        let mut record = GenerationAttempt {
            state,
            candidate_id: candidate.map(|c| c.id.clone()),
            persona: persona.name.clone(),
            prompt,
            raw_text: None,
            text: None,
            status: AttemptStatus::Pending,
        };
        let (result, raw) = self.adapter.generate_traced(&record.prompt).await;
        record.raw_text = raw;
        match &result {
            Ok(text) => {
                record.status = AttemptStatus::Succeeded;
                record.text = Some(text.clone());
            }
            Err(e) => {
                record.status = AttemptStatus::from(e);
                warn!(
                    strategy = %state,
                    persona = %persona.name,
                    candidate = record.candidate_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "generation rejected"
                );
            }
        }
        counter!("generation_attempts_total", "status" => record.status.as_str()).increment(1);
        attempts.push(record);
        result.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::generate::backend::{BackendFuture, DisabledBackend, GenerativeBackend, StaticBackend};
    use crate::generate::clean::TextCleaner;
    use crate::generate::AdapterSettings;
    use crate::persona::PersonaSpec;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Fails for prompts containing any of `fail_on`, records every prompt.
    struct Picky {
        fail_on: Vec<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl GenerativeBackend for Picky {
        fn generate<'a>(&'a self, prompt: &'a str) -> BackendFuture<'a> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let fail = self.fail_on.iter().any(|f| prompt.contains(f));
            Box::pin(async move {
                if fail {
                    Ok(String::new())
                } else {
                    Ok("A fresh take that stands on its own.".to_string())
                }
            })
        }
        fn name(&self) -> &'static str {
            "picky"
        }
    }

    fn persona(name: &str, kw: &[&str], priority: i32, flexible: bool) -> PersonaSpec {
        PersonaSpec {
            name: name.into(),
            style: format!("{name}-style"),
            focus: None,
            keywords: kw.iter().map(|s| s.to_string()).collect(),
            hashtags: vec![format!("#{name}")],
            flexible,
            priority,
            date_pattern: false,
        }
    }

    fn item(title: &str) -> CandidateItem {
        CandidateItem::new(title, "", Some(format!("https://x/{title}")), "T").unwrap()
    }

    fn adapter(backend: Arc<dyn GenerativeBackend>) -> GeneratorAdapter {
        GeneratorAdapter::new(
            backend,
            AdapterSettings {
                timeout: Duration::from_secs(1),
                max_attempts: 1,
                backoff: Duration::from_millis(1),
                min_chars: 5,
                max_raw_chars: 400,
            },
            TextCleaner::new(&[], false),
        )
    }

    fn prompts() -> PromptBuilder {
        PromptBuilder::new(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), 280, false)
    }

    fn settings(canned: &[&str]) -> OrchestratorSettings {
        OrchestratorSettings {
            max_candidates_per_state: 3,
            canned_posts: canned.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn exact_match_wins_without_later_states() {
        let reg = PersonaRegistry::new(
            vec![persona("gear", &["engine"], 1, true), persona("tales", &["story"], 2, true)],
            None,
        )
        .unwrap();
        let a = adapter(Arc::new(StaticBackend::new("An engine take worth sharing today.")));
        let p = prompts();
        let orch = FallbackOrchestrator::new(&reg, &a, &p, settings(&[]));
        let items = vec![item("new engine released"), item("unrelated weather")];
        let mut seen = SeenSet::new();
        let out = orch
            .run(&items, &mut seen, &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();
        assert_eq!(out.state, FallbackState::TryExactMatch);
        assert_eq!(out.visited, vec![FallbackState::TryExactMatch]);
        assert_eq!(out.persona.name, "gear");
        assert_eq!(out.candidate.unwrap().title, "new engine released");
        assert_eq!(out.attempts.len(), 1);
        assert!(seen.contains(&items[0].id));
        assert!(!seen.contains(&items[1].id));
    }

    #[tokio::test]
    async fn higher_score_persona_is_preferred_over_priority() {
        let reg = PersonaRegistry::new(
            vec![
                persona("first", &["engine"], 1, false),
                persona("second", &["engine", "studio"], 2, false),
            ],
            None,
        )
        .unwrap();
        let a = adapter(Arc::new(StaticBackend::new("Studios and engines, a long story.")));
        let p = prompts();
        let orch = FallbackOrchestrator::new(&reg, &a, &p, settings(&[]));
        let out = orch
            .run(&[item("studio ships engine")], &mut SeenSet::new(), &mut StdRng::seed_from_u64(2))
            .await
            .unwrap();
        assert_eq!(out.persona.name, "second");
    }

    #[tokio::test]
    async fn exact_failures_bounded_then_adaptation() {
        // every exact prompt fails; adaptation prompts succeed
        let backend = Arc::new(Picky {
            fail_on: vec!["inspired by this item"],
            prompts: Mutex::new(Vec::new()),
        });
        let reg = PersonaRegistry::new(
            vec![persona("gear", &["engine"], 1, false), persona("flex", &[], 2, true)],
            None,
        )
        .unwrap();
        let a = adapter(backend.clone());
        let p = prompts();
        let orch = FallbackOrchestrator::new(&reg, &a, &p, settings(&[]));
        let items: Vec<_> = (0..5).map(|i| item(&format!("engine news {i}"))).collect();
        let mut seen = SeenSet::new();
        let out = orch
            .run(&items, &mut seen, &mut StdRng::seed_from_u64(3))
            .await
            .unwrap();

        assert_eq!(out.state, FallbackState::TryFlexibleAdaptation);
        assert_eq!(out.persona.name, "flex");
        let exact: Vec<_> = out
            .attempts
            .iter()
            .filter(|a| a.state == FallbackState::TryExactMatch)
            .collect();
        assert_eq!(exact.len(), 3);
        assert!(exact.iter().all(|a| a.status == AttemptStatus::RejectedEmpty));

        assert!(exact.iter().all(|a| a.raw_text.as_deref() == Some("") && a.text.is_none()));
        let adapted = out.attempts.last().unwrap();
        assert_eq!(adapted.raw_text.as_deref(), Some("A fresh take that stands on its own."));
        assert_eq!(adapted.text, adapted.raw_text);

        let mut ids: Vec<_> = out.attempts.iter().filter_map(|a| a.candidate_id.clone()).collect();
        let n = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), n, "a candidate id reached the generator twice");
    }

    #[tokio::test]
    async fn unavailable_generator_goes_to_canned_posts() {
        let reg = PersonaRegistry::new(vec![persona("gear", &["engine"], 1, true)], None).unwrap();
        let a = adapter(Arc::new(DisabledBackend));
        let p = prompts();
        let orch = FallbackOrchestrator::new(&reg, &a, &p, settings(&["Canned one.", "  "]));
        let out = orch
            .run(&[], &mut SeenSet::new(), &mut StdRng::seed_from_u64(4))
            .await
            .unwrap();
        assert_eq!(out.state, FallbackState::TryGenericFallback);
        assert_eq!(out.origin, TextOrigin::Canned);
        assert_eq!(out.text, "Canned one.");
        assert!(out.attempts.is_empty());
    }

    #[tokio::test]
    async fn exhausted_when_everything_fails() {
        let backend = Arc::new(StaticBackend::new(""));
        let reg = PersonaRegistry::new(
            vec![persona("a", &["engine"], 1, true), persona("b", &[], 2, true)],
            None,
        )
        .unwrap();
        let a = adapter(backend);
        let p = prompts();
        let orch = FallbackOrchestrator::new(&reg, &a, &p, settings(&[]));
        let items: Vec<_> = (0..10).map(|i| item(&format!("engine item {i}"))).collect();
        let err = orch
            .run(&items, &mut SeenSet::new(), &mut StdRng::seed_from_u64(5))
            .await
            .unwrap_err();
        // exact (3, persona a) + adaptation (3, persona b) + generic (1)
        assert_eq!(err.attempts, 7);
    }

    #[tokio::test]
    async fn backend_errors_are_recorded_per_attempt() {
        struct Down;
        impl GenerativeBackend for Down {
            fn generate<'a>(&'a self, _p: &'a str) -> BackendFuture<'a> {
                Box::pin(async { Err(BackendError::Server(502)) })
            }
            fn name(&self) -> &'static str {
                "down"
            }
        }
        let reg = PersonaRegistry::new(vec![persona("a", &["engine"], 1, false)], None).unwrap();
        let a = adapter(Arc::new(Down));
        let p = prompts();
        let orch = FallbackOrchestrator::new(&reg, &a, &p, settings(&["fallback text here"]));
        let out = orch
            .run(&[item("engine one")], &mut SeenSet::new(), &mut StdRng::seed_from_u64(6))
            .await
            .unwrap();
        assert_eq!(out.origin, TextOrigin::Canned);
        assert_eq!(
            out.attempts.iter().map(|a| a.status).collect::<Vec<_>>(),
            vec![AttemptStatus::BackendError, AttemptStatus::BackendError]
        );
        assert_eq!(
            out.visited,
            vec![
                FallbackState::TryExactMatch,
                FallbackState::TryFlexibleAdaptation,
                FallbackState::TryGenericFallback
            ]
        );
    }

    #[test]
    fn state_order_is_fixed() {
        let mut s = FallbackState::TryExactMatch;
        let mut seen = vec![s];
        while s != FallbackState::Exhausted {
            s = s.next();
            seen.push(s);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(FallbackState::Exhausted.next(), FallbackState::Exhausted);
    }
}
