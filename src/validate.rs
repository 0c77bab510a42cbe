//! Output validator: turns cleaned text into a [`Post`] that honours the length contract.
//!
//! `len(Post.text) <= max_len` always holds (lengths in chars). Over-length text is
//! repaired, never rejected: the body is cut at the last whitespace before the limit,
//! the ellipsis is appended, and the hashtag suffix is kept whole after it.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::persona::{is_hashtag, PersonaProfile};

/// Final artifact handed to the publish target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub text: String,
    pub hashtags: Vec<String>,
    pub media_url: Option<String>,
}

impl Post {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// One persona tag plus up to `per_post_general` general tags, deduplicated
/// case-insensitively.
pub fn compose_hashtags<R: Rng + ?Sized>(
    persona: &PersonaProfile,
    general: &[String],
    per_post_general: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if let Some(tag) = persona.hashtag_pool.choose(rng) {
        out.push(tag.clone());
    }
    let mut pool: Vec<&String> = general.iter().filter(|t| is_hashtag(t)).collect();
    pool.shuffle(rng);
    for tag in pool {
        if out.len() >= 1 + per_post_general {
            break;
        }
        push_unique(&mut out, tag);
    }
    out
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
        tags.push(tag.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct OutputValidator {
    max_len: usize,
    ellipsis: String,
}

impl OutputValidator {
    pub fn new(max_len: usize, ellipsis: impl Into<String>) -> Self {
        Self {
            max_len,
            ellipsis: ellipsis.into(),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Build the final post. `hashtags` are ignored when `text` already carries its own,
    /// unless truncation leaves none of them in the result.
    ///
    /// `Post.hashtags` lists the tags present in the final text, in order.
    pub fn finalize(&self, text: &str, hashtags: &[String], media_url: Option<String>) -> Post {
        let text = text.trim();
        if contains_hashtag(text) {
            let (body, suffix) = split_hashtag_suffix(text);
            let out = self.fit(&body, suffix);
            if contains_hashtag(&out) {
                return Post {
                    hashtags: hashtags_in(&out),
                    text: out,
                    media_url,
                };
            }
            debug!("inline hashtags lost to truncation; appending composed tags");
        }

        let mut appended = Vec::new();
        for t in hashtags.iter().filter(|t| is_hashtag(t)) {
            push_unique(&mut appended, t);
        }
        let out = self.fit(text, appended);
        Post {
            hashtags: hashtags_in(&out),
            text: out,
            media_url,
        }
    }

    /// `body` followed by the `suffix` tags, cut to `max_len` chars.
    fn fit(&self, body: &str, mut suffix: Vec<String>) -> String {
        let full = join(body, &suffix.join(" "));
        if full.chars().count() <= self.max_len {
            return full;
        }

        // Drop trailing tags that would not leave room for at least the ellipsis.
        let ell = self.ellipsis.chars().count();
        while !suffix.is_empty() && suffix_len(&suffix) + 1 + ell > self.max_len {
            suffix.pop();
        }
        let suffix = suffix.join(" ");
        let reserved = if suffix.is_empty() { ell } else { ell + 1 + suffix.chars().count() };
        let available = self.max_len.saturating_sub(reserved);

        let cut = truncate_at_word(body, available);
        let mut new_body = format!("{cut}{}", self.ellipsis);
        if new_body.chars().count() > self.max_len {
            // ellipsis itself longer than the limit
            new_body = new_body.chars().take(self.max_len).collect();
        }
        let text = join(&new_body, &suffix);
        debug!(
            original = full.chars().count(),
            truncated = text.chars().count(),
            max_len = self.max_len,
            "post truncated to fit"
        );
        text
    }
}

/// Distinct hashtag words of `text`, first occurrence wins.
fn hashtags_in(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for w in text.split_whitespace().filter(|w| is_hashtag(w)) {
        push_unique(&mut out, w);
    }
    out
}

fn contains_hashtag(text: &str) -> bool {
    text.split_whitespace().any(is_hashtag)
}

/// Split `text` into body and the trailing run of hashtag words.
fn split_hashtag_suffix(text: &str) -> (String, Vec<String>) {
    let words: Vec<&str> = text.split_whitespace().collect();
    let body_end = words
        .iter()
        .rposition(|w| !is_hashtag(w))
        .map(|i| i + 1)
        .unwrap_or(0);
    let suffix: Vec<String> = words[body_end..].iter().map(|w| w.to_string()).collect();
    let body = if suffix.is_empty() {
        text.to_string()
    } else {
        words[..body_end].join(" ")
    };
    (body, suffix)
}

fn suffix_len(words: &[String]) -> usize {
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len().saturating_sub(1)
}

fn join(body: &str, suffix: &str) -> String {
    match (body.is_empty(), suffix.is_empty()) {
        (_, true) => body.to_string(),
        (true, false) => suffix.to_string(),
        (false, false) => format!("{body} {suffix}"),
    }
}

/// Longest prefix of `body` with at most `limit` chars that ends on a word boundary,
/// with trailing whitespace and clause punctuation removed.
fn truncate_at_word(body: &str, limit: usize) -> String {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() <= limit {
        return body.trim_end().to_string();
    }
    let end = if chars[limit].is_whitespace() {
        limit
    } else {
        chars[..limit]
            .iter()
            .rposition(|c| c.is_whitespace())
            .unwrap_or(0)
    };
    let prefix: String = chars[..end].iter().collect();
    prefix
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn v() -> OutputValidator {
        OutputValidator::new(280, "…")
    }

    fn tags(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn short_text_gets_hashtags_appended() {
        let p = v().finalize("Engines are fast.", &tags(&["#A", "#B", "#a"]), None);
        assert_eq!(p.text, "Engines are fast. #A #B");
        assert_eq!(p.hashtags, tags(&["#A", "#B"]));
    }

    #[test]
    fn existing_hashtags_suppress_appending() {
        let p = v().finalize("Big news #Engines today #GameDev", &tags(&["#A"]), None);
        assert_eq!(p.text, "Big news #Engines today #GameDev");
        assert_eq!(p.hashtags, tags(&["#Engines", "#GameDev"]));
    }

    #[test]
    fn overlong_body_truncated_on_word_boundary_with_suffix_intact() {
        // 310 chars of body, "#A #B" suffix
        let word = "abcdefghi ";
        let body: String = word.repeat(31).trim_end().to_string() + "x";
        assert_eq!(body.chars().count(), 310);
        let p = v().finalize(&body, &tags(&["#A", "#B"]), None);

        assert!(p.char_len() <= 280, "len {}", p.char_len());
        assert!(p.text.ends_with("… #A #B"));
        let kept = p.text.trim_end_matches(" #A #B").trim_end_matches('…');
        assert!(body.starts_with(kept));
        let next = body[kept.len()..].chars().next().unwrap();
        assert!(next.is_whitespace(), "cut mid-word at {:?}", next);
    }

    #[test]
    fn inline_suffix_is_preserved_when_truncating() {
        let body = "lorem ipsum ".repeat(30);
        let text = format!("{body}#Retro #Games");
        let p = OutputValidator::new(100, "…").finalize(&text, &[], None);
        assert!(p.char_len() <= 100);
        assert!(p.text.ends_with("… #Retro #Games"));
    }

    #[test]
    fn mid_body_tag_cut_by_truncation_falls_back_to_composed_tags() {
        let text = format!("{}#Mid {}", "lorem ipsum ".repeat(5), "dolor sit amet ".repeat(30));
        let p = OutputValidator::new(60, "…").finalize(&text, &tags(&["#A"]), None);
        assert!(p.char_len() <= 60);
        assert!(!p.text.contains("#Mid"));
        assert!(p.text.ends_with("… #A"), "{}", p.text);
        assert_eq!(p.hashtags, tags(&["#A"]));
    }

    #[test]
    fn surviving_mid_body_tag_is_kept_without_appending() {
        let text = format!("Big #Mid news {}", "dolor sit amet ".repeat(30));
        let p = OutputValidator::new(60, "…").finalize(&text, &tags(&["#A"]), None);
        assert!(p.text.starts_with("Big #Mid news"));
        assert!(!p.text.contains("#A"));
        assert_eq!(p.hashtags, tags(&["#Mid"]));
    }

    #[test]
    fn single_giant_word_collapses_to_ellipsis() {
        let p = OutputValidator::new(40, "…").finalize(&"x".repeat(100), &tags(&["#A"]), None);
        assert_eq!(p.text, "… #A");
    }

    #[test]
    fn tags_dropped_when_they_alone_do_not_fit() {
        let long_tag = format!("#{}", "t".repeat(45));
        let p = OutputValidator::new(40, "…").finalize(
            &"word ".repeat(20),
            &[long_tag, "#B".to_string()],
            None,
        );
        assert!(p.char_len() <= 40);
        assert!(p.text.ends_with("… #B") || p.text.ends_with('…'));
    }

    #[test]
    fn length_contract_over_many_inputs() {
        let mut rng = StdRng::seed_from_u64(7);
        let words = ["a", "quick", "brown", "fox", "jumps", "extraordinarily", "over", "x"];
        for max_len in [40usize, 80, 140, 280] {
            for n in 0..120 {
                let mut text: Vec<&str> = (0..n).map(|_| *words.choose(&mut rng).unwrap()).collect();
                if n % 3 == 0 && n > 0 {
                    let at = rng.random_range(0..text.len());
                    text.insert(at, "#Inline");
                }
                let p = OutputValidator::new(max_len, "…").finalize(
                    &text.join(" "),
                    &tags(&["#One", "#Two", "#Three"]),
                    None,
                );
                assert!(p.char_len() <= max_len, "{} > {max_len}", p.char_len());
                for tag in &p.hashtags {
                    assert!(p.text.split_whitespace().any(|w| w == tag.as_str()), "{tag} missing from {:?}", p.text);
                }
            }
        }
    }

    #[test]
    fn composed_hashtags_are_persona_plus_general_deduplicated() {
        let persona = PersonaProfile::from_spec(PersonaSpec {
            name: "historian".into(),
            style: "s".into(),
            focus: None,
            keywords: vec![],
            hashtags: tags(&["#History"]),
            flexible: false,
            priority: 1,
            date_pattern: false,
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let general = tags(&["#history", "#Gaming", "notatag", "#Tech"]);
        for _ in 0..20 {
            let t = compose_hashtags(&persona, &general, 2, &mut rng);
            assert_eq!(t[0], "#History");
            assert!(t.len() >= 2 && t.len() <= 3);
            assert!(!t[1..].iter().any(|x| x.eq_ignore_ascii_case("#History")));
            assert!(!t.contains(&"notatag".to_string()));
        }
    }
}
