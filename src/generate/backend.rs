//! Generative backends: provider abstraction + concrete providers.
//!
//! A backend does exactly one remote call per `generate` and reports raw text or a
//! classified [`BackendError`]. Retries, timeouts and cleaning live in the adapter.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<String, BackendError>> + Send + 'a>>;

/// One remote text-generation call.
pub trait GenerativeBackend: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> BackendFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
    /// `false` when no remote call can ever succeed (disabled provider).
    fn is_available(&self) -> bool {
        true
    }
}

/// Convenient alias used by callers.
pub type DynBackend = Arc<dyn GenerativeBackend>;

const USER_AGENT: &str = "persona-poster/0.1";

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a non-success HTTP status to a backend error.
pub fn classify_status(status: u16, body: &str) -> BackendError {
    match status {
        429 => BackendError::RateLimited,
        500..=599 => BackendError::Server(status),
        _ => {
            let mut msg: String = body.chars().take(200).collect();
            if msg.is_empty() {
                msg = "no body".to_string();
            }
            BackendError::Client(status, msg)
        }
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(e.to_string())
    }
}

// ------------------------------------------------------------
// Gemini
// ------------------------------------------------------------

/// Google Gemini `generateContent` REST endpoint. Requires `GEMINI_API_KEY`.
pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";

    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        Self {
            http: http_client(),
            api_key,
            model: model_override.unwrap_or(Self::DEFAULT_MODEL).to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1".to_string(),
        }
    }
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}
#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}
#[derive(Serialize)]
struct GeminiReq<'a> {
    contents: Vec<GeminiContent<'a>>,
}
#[derive(Deserialize)]
struct GeminiResp {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}
#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiRespContent>,
}
#[derive(Deserialize)]
struct GeminiRespContent {
    #[serde(default)]
    parts: Vec<GeminiRespPart>,
}
#[derive(Deserialize)]
struct GeminiRespPart {
    #[serde(default)]
    text: Option<String>,
}

/// Concatenated text parts of the first candidate.
fn gemini_text(resp: GeminiResp) -> Result<String, BackendError> {
    let first = resp
        .candidates
        .into_iter()
        .next()
        .ok_or(BackendError::NoCandidates)?;
    let text: String = first
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    Ok(text)
}

impl GenerativeBackend for GeminiBackend {
    fn generate<'a>(&'a self, prompt: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(BackendError::Unavailable);
            }
            let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
            let req = GeminiReq {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart { text: prompt }],
                }],
            };
            let resp = self
                .http
                .post(url)
                .query(&[("key", self.api_key.as_str())])
                .json(&req)
                .send()
                .await
                .map_err(transport)?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(classify_status(status.as_u16(), &body));
            }
            let body: GeminiResp = resp
                .json()
                .await
                .map_err(|e| BackendError::Transport(format!("decode: {e}")))?;
            gemini_text(body)
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ------------------------------------------------------------
// OpenAI
// ------------------------------------------------------------

/// OpenAI chat completions. Requires `OPENAI_API_KEY`.
pub struct OpenAiBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        Self {
            http: http_client(),
            api_key,
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }
}

impl GenerativeBackend for OpenAiBackend {
    fn generate<'a>(&'a self, prompt: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(BackendError::Unavailable);
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                #[serde(default)]
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: vec![Msg {
                    role: "user",
                    content: prompt,
                }],
                temperature: 0.9,
                max_tokens: 200,
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(transport)?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(classify_status(status.as_u16(), &body));
            }
            let body: Resp = resp
                .json()
                .await
                .map_err(|e| BackendError::Transport(format!("decode: {e}")))?;
            let first = body.choices.into_iter().next().ok_or(BackendError::NoCandidates)?;
            Ok(first.message.content.unwrap_or_default())
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ------------------------------------------------------------
// Offline backends
// ------------------------------------------------------------

/// Always `Unavailable`; used when generation is disabled.
pub struct DisabledBackend;

impl GenerativeBackend for DisabledBackend {
    fn generate<'a>(&'a self, _prompt: &'a str) -> BackendFuture<'a> {
        Box::pin(async { Err(BackendError::Unavailable) })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
    fn is_available(&self) -> bool {
        false
    }
}

/// Returns the same text for every prompt (local runs, demo).
#[derive(Clone)]
pub struct StaticBackend {
    pub fixed: String,
}

impl StaticBackend {
    pub fn new(fixed: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
        }
    }
}

impl GenerativeBackend for StaticBackend {
    fn generate<'a>(&'a self, _prompt: &'a str) -> BackendFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
