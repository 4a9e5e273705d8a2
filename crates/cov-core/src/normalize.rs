//! Topic normalization for exact and fuzzy comparison.
//!
//! Every phrase goes through the same deterministic pipeline:
//! 1. Unicode lowercase
//! 2. Apostrophes removed (`Dijkstra's` → `dijkstras`)
//! 3. Every other non-alphanumeric character becomes a word break
//! 4. Stop words dropped, unless the phrase is nothing but stop words
//! 5. Light suffix stemming (`sses`, `ies`, plural `s`, `ing`, `ed`)
//!
//! The canonical key is the stemmed tokens joined by single spaces. Two phrases
//! with equal canonical keys are the same topic; nothing costlier is consulted.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Function words that carry no topic signal.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "at", "by", "for", "from", "in", "into", "of", "on", "or", "the", "to",
    "via", "vs", "with",
];

/// Words this short are never stemmed.
const MIN_STEM_LEN: usize = 4;

/// A topic phrase reduced to its comparable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedTopic {
    /// The phrase as supplied, trimmed.
    pub original: String,
    /// Lowercased, punctuation-free, whitespace-collapsed text (unstemmed).
    /// This is the form handed to embedding providers.
    pub text: String,
    /// Stemmed content tokens joined by single spaces.
    pub canonical_key: String,
    /// Stemmed content tokens in phrase order.
    pub tokens: Vec<String>,
}

/// Normalize a raw topic phrase.
///
/// # Errors
///
/// Returns [`CoreError::InvalidTopic`] if the phrase is empty, whitespace-only,
/// or contains no alphanumeric characters.
pub fn normalize(phrase: &str) -> Result<NormalizedTopic, CoreError> {
    let text = clean(phrase);
    if text.is_empty() {
        let reason = if phrase.trim().is_empty() {
            "empty or whitespace-only"
        } else {
            "no alphanumeric content"
        };
        return Err(CoreError::InvalidTopic {
            phrase: phrase.to_string(),
            reason: reason.to_string(),
        });
    }

    let words: Vec<&str> = text.split(' ').collect();
    let content: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect();
    let kept = if content.is_empty() { words } else { content };

    let tokens: Vec<String> = kept.into_iter().map(stem).collect();
    let canonical_key = tokens.join(" ");

    Ok(NormalizedTopic {
        original: phrase.trim().to_string(),
        text,
        canonical_key,
        tokens,
    })
}

/// Lowercase, drop apostrophes, and collapse every run of other
/// non-alphanumeric characters into a single space.
fn clean(phrase: &str) -> String {
    let mut out = String::with_capacity(phrase.len());
    let mut pending_break = false;

    for c in phrase.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if c.is_alphanumeric() {
            if pending_break && !out.is_empty() {
                out.push(' ');
            }
            pending_break = false;
            out.extend(c.to_lowercase());
        } else {
            pending_break = true;
        }
    }

    out
}

fn has_vowel(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'a' | b'e' | b'i' | b'o' | b'u' | b'y'))
}

/// Strip one inflectional suffix from an ASCII word.
fn stem(word: &str) -> String {
    if word.len() < MIN_STEM_LEN || !word.bytes().all(|b| b.is_ascii_lowercase()) {
        return word.to_string();
    }

    if let Some(base) = word.strip_suffix("sses") {
        return format!("{base}ss");
    }
    if let Some(base) = word.strip_suffix("ies") {
        if base.len() >= 2 {
            return format!("{base}y");
        }
    }
    if let Some(base) = word.strip_suffix("ing") {
        if base.len() >= 4 && has_vowel(base) {
            return base.to_string();
        }
    }
    if let Some(base) = word.strip_suffix("ed") {
        if base.len() >= 3 && has_vowel(base) {
            return base.to_string();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is")
    {
        return word[..word.len() - 1].to_string();
    }

    word.to_string()
}
