//! Error taxonomy for a single bot run.
//!
//! Each failure mode is its own type so callers can tell them apart:
//! source failures are skipped, generation failures advance the fallback
//! state machine, publish/exhaustion failures end the run with a non-zero exit.

use thiserror::Error;

/// One content source could not be fetched or parsed.
#[derive(Debug, Error)]
#[error("source `{source_label}` failed: {reason}")]
pub struct SourceFetchError {
    pub source_label: String,
    pub reason: String,
}

impl SourceFetchError {
    pub fn new(source_label: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            source_label: source_label.into(),
            reason: reason.to_string(),
        }
    }
}

/// Raw failure reported by a generative backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend call timed out")]
    Timeout,
    #[error("backend rate limited the request")]
    RateLimited,
    #[error("backend server error (HTTP {0})")]
    Server(u16),
    #[error("backend rejected the request (HTTP {0}): {1}")]
    Client(u16, String),
    #[error("backend transport error: {0}")]
    Transport(String),
    #[error("backend returned no candidates")]
    NoCandidates,
    #[error("backend is unavailable")]
    Unavailable,
}

impl BackendError {
    /// Transient errors are retried in place by the generator adapter.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout
                | BackendError::RateLimited
                | BackendError::Server(_)
                | BackendError::Transport(_)
        )
    }
}

/// A generation attempt that produced no usable text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generated text was empty after cleaning")]
    Empty,
    #[error("generated text too short ({len} < {min} chars)")]
    TooShort { len: usize, min: usize },
    #[error("generated text too long ({len} > {max} chars)")]
    TooLong { len: usize, max: usize },
    #[error("generated text went off topic (matched `{0}`)")]
    OffTopic(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The publish target refused or never received the post.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish target rejected the post (HTTP {0}): {1}")]
    Rejected(u16, String),
    #[error("publish transport error: {0}")]
    Transport(String),
    #[error("publish target not configured: {0}")]
    NotConfigured(String),
}

/// Every fallback strategy failed; nothing was published.
#[derive(Debug, Error)]
#[error("all fallback strategies exhausted after {attempts} generation attempts")]
pub struct ExhaustedError {
    pub attempts: usize,
}

/// Fatal outcome of a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Exhausted(#[from] ExhaustedError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Exhausted(_) => 2,
            RunError::Publish(_) => 3,
        }
    }
}
