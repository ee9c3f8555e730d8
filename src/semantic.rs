use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use crate::profile;

static PERSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+)\s+([A-Z][a-z]+)\b").unwrap());
static PLACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:in|at|from|near)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)").unwrap());

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "is", "it",
        "that", "this", "with", "as", "by", "from", "was", "were", "are", "be", "been", "has",
        "have", "had", "not", "no", "do", "does", "did", "will", "would", "could", "should",
        "can", "may", "might", "if", "then", "than", "so", "about", "into", "over", "after",
        "before", "between", "through", "also", "very", "more", "most", "some", "any", "each",
        "every", "all", "both", "when", "where", "which", "what", "your", "you", "they", "their",
        "these", "those", "there", "here", "how", "why", "who", "its", "our", "we",
    ]
    .into_iter()
    .collect()
});

static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "good", "great", "excellent", "helpful", "easy", "simple", "clear", "fast", "reliable",
        "useful", "improved", "better", "best", "success", "successful", "recommended", "stable",
        "efficient", "correct", "works", "working", "fixed", "resolved", "supported",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bad", "poor", "slow", "broken", "error", "errors", "fail", "fails", "failed", "failure",
        "problem", "problems", "issue", "issues", "difficult", "hard", "confusing", "unclear",
        "wrong", "deprecated", "unsupported", "crash", "crashes", "unstable", "worse", "worst",
    ]
    .into_iter()
    .collect()
});

const TOPIC_MIN_LEN: usize = 4;
const TOPIC_MIN_FREQ: usize = 2;
const TOPIC_CAP: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractedEntities {
    pub topics: BTreeSet<String>,
    pub people: BTreeSet<String>,
    pub places: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentSummary {
    pub positive: usize,
    pub negative: usize,
    /// Normalized to [-1, 1]; 0 when counts tie or no lexicon hits.
    pub score: f64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Readability {
    pub word_count: usize,
    pub sentence_count: usize,
    pub syllable_count: usize,
    /// Flesch Reading Ease, clamped to [0, 100].
    pub flesch: f64,
    pub band: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemanticReport {
    pub article_id: String,
    pub word_count: usize,
    pub char_count: usize,
    /// True when entity extraction failed; basic counts are still populated.
    pub degraded: bool,
    pub entities: ExtractedEntities,
    pub sentiment: SentimentSummary,
    pub readability: Readability,
}

/// Coarse heuristic extraction of topic terms, person-like names, and
/// place-like names. Operates on markup-stripped text with original casing.
/// Advisory only — callers must treat failure as a degraded result, not an
/// abort.
pub fn extract_entities(stripped: &str) -> Result<ExtractedEntities> {
    if stripped.trim().is_empty() {
        bail!("no extractable text");
    }

    let mut people = BTreeSet::new();
    for caps in PERSON_RE.captures_iter(stripped) {
        people.insert(format!("{} {}", &caps[1], &caps[2]));
    }

    let mut places = BTreeSet::new();
    for caps in PLACE_RE.captures_iter(stripped) {
        places.insert(caps[1].to_string());
    }

    // Topics: recurring non-stopword terms, most frequent first.
    let lowered = stripped.to_lowercase();
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for token in lowered.split(|c: char| !c.is_alphanumeric()) {
        if token.len() >= TOPIC_MIN_LEN && !STOPWORDS.contains(token) {
            *freq.entry(token).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> =
        freq.into_iter().filter(|(_, c)| *c >= TOPIC_MIN_FREQ).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let topics: BTreeSet<String> =
        ranked.into_iter().take(TOPIC_CAP).map(|(t, _)| t.to_string()).collect();

    Ok(ExtractedEntities { topics, people, places })
}

pub fn sentiment(tokens: &[String]) -> SentimentSummary {
    let positive = tokens.iter().filter(|t| POSITIVE_WORDS.contains(t.as_str())).count();
    let negative = tokens.iter().filter(|t| NEGATIVE_WORDS.contains(t.as_str())).count();
    let total = positive + negative;
    let score = if total == 0 {
        0.0
    } else {
        (positive as f64 - negative as f64) / total as f64
    };
    let label = if score > 0.0 {
        "positive"
    } else if score < 0.0 {
        "negative"
    } else {
        "neutral"
    };
    SentimentSummary { positive, negative, score, label: label.to_string() }
}

/// Vowel-cluster syllable approximation; every word counts at least one.
pub fn count_syllables(word: &str) -> usize {
    let mut count = 0;
    let mut prev_vowel = false;
    for c in word.chars() {
        let vowel = matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }
    count.max(1)
}

pub fn readability(text: &str) -> Readability {
    let tokens = profile::tokenize(&text.to_lowercase());
    let word_count = tokens.len();
    let sentence_count = profile::split_sentences(text).len().max(1);
    let syllable_count: usize = tokens.iter().map(|t| count_syllables(t)).sum();

    let flesch = if word_count == 0 {
        0.0
    } else {
        let words = word_count as f64;
        let sentences = sentence_count as f64;
        let syllables = syllable_count as f64;
        (206.835 - 1.015 * (words / sentences) - 84.6 * (syllables / words)).clamp(0.0, 100.0)
    };

    let band = match flesch {
        f if f >= 90.0 => "Very Easy",
        f if f >= 80.0 => "Easy",
        f if f >= 70.0 => "Fairly Easy",
        f if f >= 60.0 => "Standard",
        f if f >= 50.0 => "Fairly Difficult",
        f if f >= 30.0 => "Difficult",
        _ => "Very Difficult",
    };

    Readability { word_count, sentence_count, syllable_count, flesch, band: band.to_string() }
}

/// Full semantic pass. Entity extraction failure degrades the report but
/// never escapes this boundary.
pub fn analyze_semantics(article_id: &str, content: &str) -> SemanticReport {
    let stripped = profile::strip_markup(content);
    let prof = profile::build_profile(content);

    let (entities, degraded) = match extract_entities(&stripped) {
        Ok(e) => (e, false),
        Err(e) => {
            warn!("Entity extraction degraded - article={}, reason={}", article_id, e);
            (ExtractedEntities::default(), true)
        }
    };

    let sentiment = sentiment(&prof.tokens);
    let readability = readability(&stripped);
    debug!(
        "Semantic analysis - article={}, words={}, flesch={:.1}, degraded={}",
        article_id, readability.word_count, readability.flesch, degraded
    );

    SemanticReport {
        article_id: article_id.to_string(),
        word_count: prof.tokens.len(),
        char_count: stripped.chars().count(),
        degraded,
        entities,
        sentiment,
        readability,
    }
}
