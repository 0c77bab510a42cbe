//! Prompt construction for the three generation strategies.
//!
//! Every prompt carries the persona voice, a calendar line (season, weekday,
//! fixed-date occasion) and the output rules. The run date is injected so the
//! same inputs always build the same prompt.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::ingest::types::CandidateItem;
use crate::persona::PersonaProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn of(date: NaiveDate) -> Self {
        match date.month() {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Fall,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }
}

/// Fixed-date occasions and the mood they ask for.
pub fn occasion(date: NaiveDate) -> Option<(&'static str, &'static str)> {
    match (date.month(), date.day()) {
        (1, 1) => Some(("New Year's Day", "hopeful and fresh")),
        (2, 14) => Some(("Valentine's Day", "warm and appreciative")),
        (10, 31) => Some(("Halloween", "spooky and fun")),
        (12, 24) => Some(("Christmas Eve", "festive")),
        (12, 25) => Some(("Christmas Day", "joyful and celebratory")),
        (12, 31) => Some(("New Year's Eve", "reflective and excited")),
        _ => None,
    }
}

fn weekday_name(w: Weekday) -> &'static str {
    match w {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// One line of date context appended to every prompt.
pub fn calendar_line(date: NaiveDate) -> String {
    let mut line = format!(
        "Today is {}, {}.",
        weekday_name(date.weekday()),
        Season::of(date).as_str()
    );
    if let Some((name, mood)) = occasion(date) {
        line.push_str(&format!(" It is {name}; a {mood} touch fits if natural."));
    }
    line
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    date: NaiveDate,
    body_limit: usize,
    neutral_voice: bool,
}

impl PromptBuilder {
    /// `max_len` is the platform limit; prompts ask for 40 chars less to leave room for hashtags.
    pub fn new(date: NaiveDate, max_len: usize, neutral_voice: bool) -> Self {
        Self {
            date,
            body_limit: max_len.saturating_sub(40).max(60),
            neutral_voice,
        }
    }

    fn voice(&self, persona: &PersonaProfile) -> String {
        let mut v = format!("Write as a {} commentator", persona.style_descriptor);
        if let Some(focus) = &persona.focus {
            v.push_str(&format!(" whose focus is {focus}"));
        }
        v.push('.');
        v
    }

    fn rules(&self) -> String {
        let mut r = vec![
            "Output only the post text, plain text, no markdown.".to_string(),
            "Do not include hashtags.".to_string(),
            format!("Keep it under {} characters.", self.body_limit),
            "It must make sense on its own without the source.".to_string(),
        ];
        if self.neutral_voice {
            r.push("Use a neutral observer voice: no first-person words (I, me, my, we, our, us).".to_string());
        }
        r.iter().map(|l| format!("- {l}")).collect::<Vec<_>>().join("\n")
    }

    fn candidate_block(item: &CandidateItem) -> String {
        if item.summary.is_empty() {
            format!("Title: {}", item.title)
        } else {
            let summary: String = item.summary.chars().take(500).collect();
            format!("Title: {}\nSummary: {}", item.title, summary)
        }
    }

    /// Candidate matched the persona's topics.
    pub fn exact(&self, persona: &PersonaProfile, item: &CandidateItem) -> String {
        format!(
            "Create one engaging social post inspired by this item.\n\n{}\n\n{}\n{}\n\nRules:\n{}\n",
            Self::candidate_block(item),
            self.voice(persona),
            calendar_line(self.date),
            self.rules()
        )
    }

    /// Candidate is off the persona's topics; ask for an angle that bridges them.
    pub fn adaptation(&self, persona: &PersonaProfile, item: &CandidateItem) -> String {
        format!(
            "Create one engaging social post that takes this item and reframes it through \
             the lens below, finding a genuine connection rather than forcing one.\n\n{}\n\n{}\n{}\n\nRules:\n{}\n",
            Self::candidate_block(item),
            self.voice(persona),
            calendar_line(self.date),
            self.rules()
        )
    }

    /// No candidate: a topic-agnostic post in the persona's voice.
    pub fn generic(&self, persona: &PersonaProfile) -> String {
        format!(
            "Create one engaging, standalone social post that sparks conversation.\n\n{}\n{}\n\nRules:\n{}\n",
            self.voice(persona),
            calendar_line(self.date),
            self.rules()
        )
    }
}
