//! Persona matcher: scores candidates against persona keyword sets.
//!
//! `score = |{k in persona.keywords : k occurs in lower(title + " " + summary)}|`,
//! plus one when the persona opts into the date pattern and the text holds a
//! 4-digit year (1000–2099). Ranking: score desc, then priority asc, then name.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::CandidateItem;
use crate::persona::PersonaProfile;

static RE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(1[0-9]{3}|20[0-9]{2})\b").expect("year regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPersona<'a> {
    pub persona: &'a PersonaProfile,
    pub score: usize,
}

pub fn score(persona: &PersonaProfile, item: &CandidateItem) -> usize {
    score_text(persona, &item.match_text())
}

/// Same as [`score`] over already-lowercased text.
pub fn score_text(persona: &PersonaProfile, text_lc: &str) -> usize {
    let hits = persona
        .match_keywords
        .iter()
        .filter(|k| text_lc.contains(k.as_str()))
        .count();
    let date_hit = persona.date_pattern && RE_YEAR.is_match(text_lc);
    hits + usize::from(date_hit)
}

/// All personas ranked for one candidate.
pub fn rank<'a>(item: &CandidateItem, personas: &'a [PersonaProfile]) -> Vec<RankedPersona<'a>> {
    let text = item.match_text();
    let mut out: Vec<RankedPersona<'a>> = personas
        .iter()
        .map(|p| RankedPersona {
            persona: p,
            score: score_text(p, &text),
        })
        .collect();
    out.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.persona.priority.cmp(&b.persona.priority))
            .then_with(|| a.persona.name.cmp(&b.persona.name))
    });
    out
}

/// Highest-ranked persona with a positive score for this candidate.
pub fn best_exact<'a>(
    item: &CandidateItem,
    personas: &'a [PersonaProfile],
) -> Option<RankedPersona<'a>> {
    rank(item, personas).into_iter().find(|r| r.score > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{PersonaProfile, PersonaSpec};

    fn persona(name: &str, kw: &[&str], priority: i32, date: bool, flexible: bool) -> PersonaProfile {
        PersonaProfile::from_spec(PersonaSpec {
            name: name.into(),
            style: "s".into(),
            focus: None,
            keywords: kw.iter().map(|s| s.to_string()).collect(),
            hashtags: vec!["#Tag".into()],
            flexible,
            priority,
            date_pattern: date,
        })
        .unwrap()
    }

    fn item(title: &str, summary: &str) -> CandidateItem {
        CandidateItem::new(title, summary, None, "T").unwrap()
    }

    #[test]
    fn counts_distinct_keyword_hits_case_insensitive() {
        let p = persona("p", &["engine", "studio", "missing"], 1, false, false);
        assert_eq!(score(&p, &item("Studio ENGINE news", "engine again")), 2);
    }

    #[test]
    fn date_pattern_adds_one_match() {
        let hist = persona("historian", &["classic"], 1, true, false);
        let plain = persona("plain", &["classic"], 1, false, false);
        let it = item("Remembering the launch of 1998", "");
        assert_eq!(score(&hist, &it), 1);
        assert_eq!(score(&plain, &it), 0);
        // not a year
        assert_eq!(score(&hist, &item("Sold 12345 copies", "")), 0);
    }

    #[test]
    fn ties_broken_by_priority() {
        let ps = vec![
            persona("late", &["engine"], 9, false, false),
            persona("early", &["engine"], 1, false, false),
            persona("none", &["zzz"], 0, false, true),
        ];
        let ranked = rank(&item("engine talk", ""), &ps);
        let names: Vec<_> = ranked.iter().map(|r| r.persona.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late", "none"]);
        assert_eq!(best_exact(&item("engine talk", ""), &ps).unwrap().persona.name, "early");
    }

    #[test]
    fn zero_score_is_never_an_exact_match() {
        let ps = vec![persona("strict", &["zzz"], 1, false, true)];
        assert_eq!(rank(&item("engine talk", ""), &ps)[0].score, 0);
        assert!(best_exact(&item("engine talk", ""), &ps).is_none());
    }
}
