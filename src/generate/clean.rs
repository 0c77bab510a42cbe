//! Post-processing of raw generated text.
//!
//! Steps, in order:
//! 1. strip code fences and markdown emphasis (`**`, `__`, `*`, backticks),
//! 2. strip boilerplate phrases (case-insensitive, whole phrase),
//! 3. optionally strip first-person pronouns for a neutral voice,
//! 4. collapse whitespace, drop wrapping quotes and dangling leading punctuation.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[a-zA-Z]*").expect("fence regex"));
static RE_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*|__|\*|`").expect("emphasis regex"));
static RE_FIRST_PERSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(i|me|my|mine|we|our|ours|us)\b").expect("pronoun regex"));
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([,.!?;:])").expect("punct regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// Default phrases that make a post read as machine-written.
pub fn default_banned_phrases() -> Vec<String> {
    [
        "as an ai",
        "as a large language model",
        "language model",
        "ai-generated",
        "according to ai",
        "based on the provided",
        "in this content",
        "in this piece",
        "this analysis",
        "the author",
        "the writer",
        "i am designed to",
        "my purpose is to",
        "here's a tweet",
        "here is a tweet",
        "tweet:",
        "subreddit",
        "reddit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct TextCleaner {
    banned: Option<Regex>,
    neutral_voice: bool,
}

impl TextCleaner {
    /// Phrases are matched literally, case-insensitively, longest first.
    pub fn new(banned_phrases: &[String], neutral_voice: bool) -> Self {
        let mut phrases: Vec<String> = banned_phrases
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));
        let banned = if phrases.is_empty() {
            None
        } else {
            let alternation = phrases
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            RegexBuilder::new(&format!("({alternation})"))
                .case_insensitive(true)
                .build()
                .ok()
        };
        Self {
            banned,
            neutral_voice,
        }
    }

    pub fn clean(&self, raw: &str) -> String {
        let mut out = RE_FENCE.replace_all(raw, " ").to_string();
        out = RE_EMPHASIS.replace_all(&out, "").to_string();

        if let Some(re) = &self.banned {
            out = re.replace_all(&out, " ").to_string();
        }

        if self.neutral_voice {
            out = RE_FIRST_PERSON
                .replace_all(&out, |caps: &regex::Captures<'_>| {
                    // the country, not the pronoun
                    if &caps[0] == "US" {
                        "US".to_string()
                    } else {
                        String::new()
                    }
                })
                .to_string();
        }

        out = RE_WS.replace_all(&out, " ").to_string();
        out = RE_SPACE_BEFORE_PUNCT.replace_all(&out, "$1").to_string();
        out.trim()
            .trim_matches(|c: char| c == '"' || c == '\'')
            .trim_start_matches(|c: char| matches!(c, ',' | ';' | ':' | '.' | '-') || c.is_whitespace())
            .trim()
            .to_string()
    }
}
