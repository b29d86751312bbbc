//! Keyword safety net: danger phrases in raw note text.
//!
//! Runs independently of any model output so risk detection never rests on
//! the model alone. Matching is case-insensitive and anchored on word
//! boundaries; multi-word phrases match only as contiguous phrases, with any
//! run of whitespace (or a hyphen) allowed between words. A hyphen glued to a
//! preceding word makes one longer word: "anti-suicide" and "non-suicidal"
//! are no more a match than "antisuicide".

use std::sync::LazyLock;

use clinote_types::KeywordScanResult;
use regex::Regex;

/// Which list a phrase belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordCategory {
    Suicidal,
    SelfHarm,
    Homicidal,
}

impl KeywordCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            KeywordCategory::Suicidal => "suicidal",
            KeywordCategory::SelfHarm => "self-harm",
            KeywordCategory::Homicidal => "homicidal",
        }
    }
}

const SUICIDAL_PHRASES: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "killing myself",
    "end my life",
    "ending my life",
    "take my own life",
    "better off dead",
    "want to die",
    "wish I was dead",
    "wish I were dead",
    "no reason to live",
    "not worth living",
    "don't want to be here anymore",
    "overdose",
];

const SELF_HARM_PHRASES: &[&str] = &[
    "self-harm",
    "self-harming",
    "self-injury",
    "self-injurious",
    "cut myself",
    "cutting myself",
    "burn myself",
    "burning myself",
    "hurt myself",
    "hurting myself",
    "hit myself",
    "scratching myself",
];

const HOMICIDAL_PHRASES: &[&str] = &[
    "homicidal",
    "homicide",
    "kill him",
    "kill her",
    "kill them",
    "kill someone",
    "killing him",
    "killing her",
    "murder",
    "hurt someone",
    "hurt others",
    "harm others",
    "want to kill",
];

/// A compiled phrase with the canonical text reported on a match.
struct KeywordPattern {
    regex: Regex,
    phrase: &'static str,
}

static SUICIDAL: LazyLock<Vec<KeywordPattern>> = LazyLock::new(|| compile(SUICIDAL_PHRASES));
static SELF_HARM: LazyLock<Vec<KeywordPattern>> = LazyLock::new(|| compile(SELF_HARM_PHRASES));
static HOMICIDAL: LazyLock<Vec<KeywordPattern>> = LazyLock::new(|| compile(HOMICIDAL_PHRASES));

fn compile(phrases: &'static [&'static str]) -> Vec<KeywordPattern> {
    phrases
        .iter()
        .map(|phrase| KeywordPattern {
            regex: phrase_regex(phrase),
            phrase,
        })
        .collect()
}

/// `(?i)\bword1[\s-]+word2\b`, with apostrophes accepting straight or curly quotes.
fn phrase_regex(phrase: &str) -> Regex {
    let words: Vec<String> = phrase
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .map(|w| regex::escape(w).replace('\'', "['\u{2019}]"))
        .collect();
    let pattern = format!(r"(?i)\b{}\b", words.join(r"[\s\-]+"));
    // Patterns are built from the constant lists above.
    Regex::new(&pattern).expect("keyword pattern is valid")
}

/// True when the match at `start` continues a word through a hyphen.
fn hyphen_prefixed(text: &str, start: usize) -> bool {
    let mut before = text[..start].chars().rev();
    before.next() == Some('-') && before.next().is_some_and(char::is_alphanumeric)
}

fn matches_in(patterns: &[KeywordPattern], text: &str) -> Vec<String> {
    patterns
        .iter()
        .filter(|p| {
            p.regex
                .find_iter(text)
                .any(|m| !hyphen_prefixed(text, m.start()))
        })
        .map(|p| p.phrase.to_string())
        .collect()
}

/// Scan note text against all three lists.
///
/// Each category reports the distinct canonical phrases it matched, in list
/// order. Empty or whitespace-only text matches nothing.
pub fn scan(text: &str) -> KeywordScanResult {
    if text.trim().is_empty() {
        return KeywordScanResult::default();
    }

    let result = KeywordScanResult {
        suicidal_matches: matches_in(&SUICIDAL, text),
        self_harm_matches: matches_in(&SELF_HARM, text),
        homicidal_matches: matches_in(&HOMICIDAL, text),
    };

    if !result.is_empty() {
        tracing::debug!(
            suicidal = result.suicidal_matches.len(),
            self_harm = result.self_harm_matches.len(),
            homicidal = result.homicidal_matches.len(),
            "Keyword safety net matched"
        );
    }
    result
}

/// Matches for a single category.
pub fn scan_category(text: &str, category: KeywordCategory) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match category {
        KeywordCategory::Suicidal => matches_in(&SUICIDAL, text),
        KeywordCategory::SelfHarm => matches_in(&SELF_HARM, text),
        KeywordCategory::Homicidal => matches_in(&HOMICIDAL, text),
    }
}
