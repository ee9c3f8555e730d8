use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    /// Raw marked-up content (markdown, possibly with inline HTML).
    pub content: String,
    pub category: String,
    pub tags: BTreeSet<String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    /// Reserved for synthetic issues emitted when a rule itself fails.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub article_id: String,
    pub rules_executed: usize,
    pub issues_found: usize,
    pub issues: Vec<Issue>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchAuditResult {
    pub results: Vec<AuditResult>,
    pub total_articles: usize,
    pub total_issues: usize,
    pub elapsed_ms: u64,
}

/// Order-independent key for an article pair. Ids are sorted on construction
/// so (A,B) and (B,A) always map to the same key and the same cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub first: String,
    pub second: String,
}

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self { first: a.to_string(), second: b.to_string() }
        } else {
            Self { first: b.to_string(), second: a.to_string() }
        }
    }

    /// Stable hex id for reports, derived from the normalized pair.
    pub fn id(&self) -> String {
        let seed = format!("{}|{}", self.first, self.second);
        format!("{:016x}", xxh3_64(seed.as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityMetrics {
    pub lexical: f64,
    pub vector: f64,
    pub semantic: f64,
    pub structural: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub pair_id: String,
    pub article_a: String,
    pub article_b: String,
    pub metrics: SimilarityMetrics,
    pub aggregate: f64,
    /// True when the semantic metric fell back to raw-string similarity.
    pub semantic_degraded: bool,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarityReport {
    pub article_id: String,
    pub corpus_size: usize,
    pub threshold: f64,
    /// Pairs above threshold, sorted descending by aggregate score.
    pub matches: Vec<SimilarityResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateTier {
    MergeImmediate,
    ReviewMerge,
    Monitor,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCandidate {
    pub pair_id: String,
    pub article_a: String,
    pub article_b: String,
    pub score: f64,
    pub tier: DuplicateTier,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationGroups {
    /// Pairs scoring above 0.9 — merge without further review.
    pub immediate: Vec<DuplicateCandidate>,
    /// Pairs in (0.8, 0.9] — queue for editorial review.
    pub review: Vec<DuplicateCandidate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub article_id: String,
    pub candidates: Vec<DuplicateCandidate>,
    pub groups: ConsolidationGroups,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearedCounts {
    pub similarity: usize,
    pub structural: usize,
}
