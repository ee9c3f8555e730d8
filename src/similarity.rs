use dashmap::DashMap;
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::models::{Article, PairKey, SimilarityMetrics, SimilarityReport, SimilarityResult};
use crate::profile::{self, ContentProfile};
use crate::semantic::{self, ExtractedEntities};
use crate::structural::{self, ElementCounts};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Component weights for the aggregate score.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityWeights {
    pub lexical: f64,    // 0.3
    pub vector: f64,     // 0.3
    pub semantic: f64,   // 0.3
    pub structural: f64, // 0.1
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self { lexical: 0.3, vector: 0.3, semantic: 0.3, structural: 0.1 }
    }
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Jaccard over the stemmed-token sets of two profiles.
pub fn lexical_overlap(a: &ContentProfile, b: &ContentProfile) -> f64 {
    let set_a: BTreeSet<String> = a.stemmed_tokens.iter().cloned().collect();
    let set_b: BTreeSet<String> = b.stemmed_tokens.iter().cloned().collect();
    jaccard(&set_a, &set_b)
}

/// Cosine similarity of term-frequency vectors over the union vocabulary of
/// both token lists. Zero when either vector has zero magnitude.
pub fn vector_overlap(a: &ContentProfile, b: &ContentProfile) -> f64 {
    let mut freq: HashMap<&str, (f64, f64)> = HashMap::new();
    for t in &a.tokens {
        freq.entry(t.as_str()).or_insert((0.0, 0.0)).0 += 1.0;
    }
    for t in &b.tokens {
        freq.entry(t.as_str()).or_insert((0.0, 0.0)).1 += 1.0;
    }

    let mut dot = 0.0;
    let mut mag_a = 0.0;
    let mut mag_b = 0.0;
    for (fa, fb) in freq.values() {
        dot += fa * fb;
        mag_a += fa * fa;
        mag_b += fb * fb;
    }
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a.sqrt() * mag_b.sqrt())).min(1.0)
}

/// Character-bigram Dice coefficient, the degraded substitute for semantic
/// overlap when entity extraction fails. Always lands in [0, 1].
pub fn raw_string_similarity(a: &str, b: &str) -> f64 {
    let bigrams = |s: &str| -> HashMap<(char, char), usize> {
        let mut m = HashMap::new();
        for (x, y) in s.chars().tuple_windows() {
            *m.entry((x, y)).or_insert(0) += 1;
        }
        m
    };
    let ba = bigrams(a);
    let bb = bigrams(b);
    let total: usize = ba.values().sum::<usize>() + bb.values().sum::<usize>();
    if total == 0 {
        // Two empty strings are trivially identical.
        return if a == b { 1.0 } else { 0.0 };
    }
    let mut shared = 0usize;
    for (bigram, ca) in &ba {
        if let Some(cb) = bb.get(bigram) {
            shared += ca.min(cb);
        }
    }
    (2.0 * shared as f64 / total as f64).clamp(0.0, 1.0)
}

/// Average Jaccard-style overlap across the three entity classes. Empty vs
/// empty counts as full overlap, empty vs non-empty as none.
pub fn entity_class_overlap(a: &ExtractedEntities, b: &ExtractedEntities) -> f64 {
    let classes = [
        (&a.topics, &b.topics),
        (&a.people, &b.people),
        (&a.places, &b.places),
    ];
    let sum: f64 = classes.iter().map(|(x, y)| jaccard(x, y)).sum();
    sum / classes.len() as f64
}

/// Semantic overlap with the degraded fallback path. The bool reports whether
/// extraction failed on either side.
pub fn semantic_overlap(stripped_a: &str, stripped_b: &str) -> (f64, bool) {
    match (semantic::extract_entities(stripped_a), semantic::extract_entities(stripped_b)) {
        (Ok(ea), Ok(eb)) => (entity_class_overlap(&ea, &eb), false),
        _ => (raw_string_similarity(stripped_a, stripped_b), true),
    }
}

/// Per element type: 1 - |countA - countB| / max(countA, countB, 1),
/// averaged across headings, list items, and images.
pub fn structural_overlap(a: ElementCounts, b: ElementCounts) -> f64 {
    let component = |ca: usize, cb: usize| -> f64 {
        let denom = ca.max(cb).max(1) as f64;
        1.0 - (ca as f64 - cb as f64).abs() / denom
    };
    (component(a.headings, b.headings)
        + component(a.list_items, b.list_items)
        + component(a.images, b.images))
        / 3.0
}

/// One computed (and cached) pairwise comparison, stored in normalized pair
/// order so repeated and reversed lookups return identical values.
#[derive(Debug, Clone)]
pub struct PairComparison {
    pub metrics: SimilarityMetrics,
    pub aggregate: f64,
    pub semantic_degraded: bool,
    pub recommendations: Vec<String>,
}

pub struct SimilarityEngine {
    pub weights: SimilarityWeights,
    pub threshold: f64,
    cache: DashMap<PairKey, PairComparison>,
}

impl SimilarityEngine {
    pub fn new(threshold: f64) -> Self {
        Self {
            weights: SimilarityWeights::default(),
            threshold,
            cache: DashMap::new(),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop all cached pair results, returning how many were removed.
    pub fn clear_cache(&self) -> usize {
        let n = self.cache.len();
        self.cache.clear();
        n
    }

    fn compute(&self, a: &Article, b: &Article) -> PairComparison {
        let profile_a = profile::build_profile(&a.content);
        let profile_b = profile::build_profile(&b.content);
        let stripped_a = profile::strip_markup(&a.content);
        let stripped_b = profile::strip_markup(&b.content);

        let lexical = lexical_overlap(&profile_a, &profile_b);
        let vector = vector_overlap(&profile_a, &profile_b);
        let (semantic, semantic_degraded) = semantic_overlap(&stripped_a, &stripped_b);
        let structural = structural_overlap(
            structural::element_counts(&a.content),
            structural::element_counts(&b.content),
        );

        let aggregate = (self.weights.lexical * lexical
            + self.weights.vector * vector
            + self.weights.semantic * semantic
            + self.weights.structural * structural)
            .clamp(0.0, 1.0);

        let mut recommendations = Vec::new();
        if aggregate > 0.9 {
            recommendations.push("merge_candidates".to_string());
        } else if aggregate > self.threshold {
            recommendations.push("review_overlap".to_string());
        }
        if structural > 0.8 {
            recommendations.push("structural_standardization".to_string());
        }

        PairComparison {
            metrics: SimilarityMetrics { lexical, vector, semantic, structural },
            aggregate,
            semantic_degraded,
            recommendations,
        }
    }

    /// Cached pairwise comparison. The pair key is normalized before lookup,
    /// and insertion goes through the map entry so concurrent callers racing
    /// on the same pair keep a single stored result.
    pub fn compare(&self, a: &Article, b: &Article) -> PairComparison {
        let key = PairKey::new(&a.id, &b.id);
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        // Compute in normalized order so (A,B) and (B,A) store identical
        // results.
        let (lo, hi) = if a.id <= b.id { (a, b) } else { (b, a) };
        let computed = self.compute(lo, hi);
        self.cache.entry(key).or_insert(computed).clone()
    }

    /// Compare one article against every other corpus member and report the
    /// pairs above threshold, sorted descending by aggregate score.
    pub fn analyze(&self, article: &Article, corpus: &[Article]) -> SimilarityReport {
        let start = std::time::Instant::now();
        let mut matches: Vec<SimilarityResult> = corpus
            .par_iter()
            .filter(|other| other.id != article.id)
            .filter_map(|other| {
                let cmp = self.compare(article, other);
                if cmp.aggregate > self.threshold {
                    let key = PairKey::new(&article.id, &other.id);
                    Some(SimilarityResult {
                        pair_id: key.id(),
                        article_a: article.id.clone(),
                        article_b: other.id.clone(),
                        metrics: cmp.metrics,
                        aggregate: cmp.aggregate,
                        semantic_degraded: cmp.semantic_degraded,
                        recommendations: cmp.recommendations,
                    })
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|x, y| {
            y.aggregate
                .partial_cmp(&x.aggregate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.article_b.cmp(&y.article_b))
        });

        info!(
            "Similarity scan - article={}, corpus={}, matches={}, duration={:.1}ms",
            article.id,
            corpus.len(),
            matches.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        debug!("Similarity cache size: {}", self.cache.len());

        SimilarityReport {
            article_id: article.id.clone(),
            corpus_size: corpus.len(),
            threshold: self.threshold,
            matches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn article(id: &str, title: &str, content: &str) -> Article {
        Article {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            category: "guide".to_string(),
            tags: BTreeSet::new(),
            last_modified: Utc::now(),
        }
    }

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn jaccard_edge_cases() {
        assert_eq!(jaccard(&set(&[]), &set(&[])), 1.0);
        assert_eq!(jaccard(&set(&[]), &set(&["a"])), 0.0);
        assert_eq!(jaccard(&set(&["a", "b"]), &set(&["b", "c"])), 1.0 / 3.0);
    }

    #[test]
    fn cosine_is_zero_for_empty_vector() {
        let a = profile::build_profile("");
        let b = profile::build_profile("some words here");
        assert_eq!(vector_overlap(&a, &b), 0.0);
    }

    #[test]
    fn cosine_of_identical_text_is_one() {
        let a = profile::build_profile("restart the service then check the logs");
        let b = profile::build_profile("restart the service then check the logs");
        let v = vector_overlap(&a, &b);
        assert!((v - 1.0).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn raw_string_similarity_bounds() {
        assert_eq!(raw_string_similarity("", ""), 1.0);
        assert_eq!(raw_string_similarity("", "abc"), 0.0);
        assert_eq!(raw_string_similarity("abcd", "abcd"), 1.0);
        let s = raw_string_similarity("restart the service", "restart this service");
        assert!(s > 0.5 && s < 1.0, "got {s}");
    }

    #[test]
    fn structural_overlap_handles_zero_counts() {
        let none = ElementCounts { headings: 0, list_items: 0, images: 0 };
        assert_eq!(structural_overlap(none, none), 1.0);
        let some = ElementCounts { headings: 4, list_items: 0, images: 0 };
        let v = structural_overlap(none, some);
        assert!((v - 2.0 / 3.0).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn similarity_is_symmetric() {
        let engine = SimilarityEngine::new(DEFAULT_SIMILARITY_THRESHOLD);
        let a = article("a", "Backups", "# Backups\nSchedule nightly backups of the primary database and verify restore procedures monthly.");
        let b = article("b", "Backup policy", "# Backup policy\nNightly backups of the primary database must be scheduled, and restores verified every month.");
        let ab = engine.compare(&a, &b);
        engine.clear_cache();
        let ba = engine.compare(&b, &a);
        assert_eq!(ab.aggregate, ba.aggregate);
        assert_eq!(ab.metrics, ba.metrics);
    }

    #[test]
    fn metrics_stay_in_bounds() {
        let engine = SimilarityEngine::new(DEFAULT_SIMILARITY_THRESHOLD);
        let a = article("a", "A", "# One\nshort text with an ![](img.png)");
        let b = article("b", "B", "Totally different body, no structure at all, many many words in a row.");
        let cmp = engine.compare(&a, &b);
        for m in [cmp.metrics.lexical, cmp.metrics.vector, cmp.metrics.semantic, cmp.metrics.structural, cmp.aggregate] {
            assert!((0.0..=1.0).contains(&m), "metric out of bounds: {m}");
        }
    }

    #[test]
    fn cache_hit_returns_identical_result_and_clears() {
        let engine = SimilarityEngine::new(DEFAULT_SIMILARITY_THRESHOLD);
        let a = article("a", "A", "Restart the search service and clear the cache afterwards.");
        let b = article("b", "B", "Restart the search service and clear the cache afterwards.");
        let first = engine.compare(&a, &b);
        let second = engine.compare(&a, &b);
        assert_eq!(first.aggregate, second.aggregate);
        assert_eq!(engine.cache_len(), 1);
        assert_eq!(engine.clear_cache(), 1);
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn near_identical_articles_exceed_threshold() {
        let engine = SimilarityEngine::new(DEFAULT_SIMILARITY_THRESHOLD);
        let a = article(
            "x",
            "Getting Started",
            "# Getting Started\nInstall the client, configure your account token, and run the setup wizard. The setup wizard validates the account token and writes the local configuration file.",
        );
        let b = article(
            "y",
            "Getting Started Guide",
            "# Getting Started Guide\nInstall the client, configure your account token, and run the setup wizard. The setup wizard checks the account token and writes the local configuration file.",
        );
        let corpus = vec![a.clone(), b.clone()];
        let report = engine.analyze(&a, &corpus);
        assert_eq!(report.matches.len(), 1);
        assert!(report.matches[0].aggregate > 0.85, "got {}", report.matches[0].aggregate);
        assert!(report.matches[0]
            .recommendations
            .iter()
            .any(|r| r == "review_overlap" || r == "merge_candidates"));
    }

    #[test]
    fn unrelated_articles_stay_below_threshold() {
        let engine = SimilarityEngine::new(DEFAULT_SIMILARITY_THRESHOLD);
        let a = article("x", "Printers", "Replace the toner cartridge when the printer reports low ink levels.");
        let b = article("y", "VPN", "Connect to the corporate network using the VPN client before accessing internal dashboards.");
        let corpus = vec![a.clone(), b.clone()];
        let report = engine.analyze(&a, &corpus);
        assert!(report.matches.is_empty());
    }
}
