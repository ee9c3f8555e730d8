use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// Normalized comparison unit for one article: stripped text, word tokens,
/// stemmed tokens, and sentences. Built once per article per analysis call
/// and discarded with it — never cached across unrelated calls.
#[derive(Debug, Clone, Serialize)]
pub struct ContentProfile {
    pub raw_text: String,
    pub tokens: Vec<String>,
    pub stemmed_tokens: Vec<String>,
    pub sentences: Vec<String>,
}

static FENCED_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static MD_IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static MD_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static MD_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*#{1,6}\s*").unwrap());
static MD_LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+[.)])\s+").unwrap());
static EMPHASIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`~]+").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Remove markup syntax while keeping human-visible text (image alt text and
/// link labels survive, urls and tags do not).
pub fn strip_markup(content: &str) -> String {
    let s = FENCED_CODE_RE.replace_all(content, " ");
    let s = MD_IMAGE_RE.replace_all(&s, "$1");
    let s = MD_LINK_RE.replace_all(&s, "$1");
    let s = HTML_TAG_RE.replace_all(&s, " ");
    let s = MD_HEADING_RE.replace_all(&s, "");
    let s = MD_LIST_MARKER_RE.replace_all(&s, "");
    let s = EMPHASIS_RE.replace_all(&s, "");
    WHITESPACE_RE.replace_all(&s, " ").trim().to_string()
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Suffix-stripping stemmer. Deliberately lightweight: collapses common
/// inflectional variants ("caches"/"cached"/"caching" -> "cach") without a
/// dictionary. Input is expected to be lowercase.
pub fn stem(word: &str) -> String {
    let w = word;
    if w.len() > 4 && w.ends_with("ies") {
        return format!("{}y", &w[..w.len() - 3]);
    }
    if w.len() > 5 && w.ends_with("sses") {
        return w[..w.len() - 2].to_string();
    }
    for suffix in ["ing", "edly", "ed", "ly", "es", "s"] {
        if w.len() > suffix.len() + 2 && w.ends_with(suffix) {
            return w[..w.len() - suffix.len()].to_string();
        }
    }
    w.to_string()
}

pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Build the profile: strip markup, NFC-normalize, collapse whitespace,
/// lowercase, then tokenize / stem / sentence-split.
pub fn build_profile(content: &str) -> ContentProfile {
    let stripped = strip_markup(content);
    let raw_text = stripped.nfc().collect::<String>().to_lowercase();
    let tokens = tokenize(&raw_text);
    let stemmed_tokens = tokens.iter().map(|t| stem(t)).collect();
    let sentences = split_sentences(&raw_text);
    ContentProfile { raw_text, tokens, stemmed_tokens, sentences }
}
