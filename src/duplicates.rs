use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::models::{
    Article, ConsolidationGroups, DuplicateCandidate, DuplicateReport, DuplicateTier, PairKey,
};
use crate::profile;
use crate::semantic;
use crate::similarity;
use crate::structural;

// Component weights for the duplicate-specific score.
const TITLE_WEIGHT: f64 = 0.3;
const CONTENT_WEIGHT: f64 = 0.4;
const TOPIC_WEIGHT: f64 = 0.2;
const STRUCTURAL_WEIGHT: f64 = 0.1;

/// Pairs scoring at or below this are not reported as candidates at all.
const CANDIDATE_FLOOR: f64 = 0.5;

/// Tier thresholds and their confidence levels.
pub fn classify(score: f64) -> (DuplicateTier, f64) {
    if score > 0.95 {
        (DuplicateTier::MergeImmediate, 0.95)
    } else if score > 0.85 {
        (DuplicateTier::ReviewMerge, 0.8)
    } else {
        (DuplicateTier::Monitor, 0.6)
    }
}

/// Topic terms for duplicate scoring: explicit tags unioned with extracted
/// topic terms. Extraction failure degrades to tags alone.
fn topic_set(article: &Article) -> BTreeSet<String> {
    let mut topics: BTreeSet<String> =
        article.tags.iter().map(|t| t.to_lowercase()).collect();
    let stripped = profile::strip_markup(&article.content);
    if let Ok(entities) = semantic::extract_entities(&stripped) {
        topics.extend(entities.topics);
    }
    topics
}

/// Weighted duplicate score:
/// 0.3 * title + 0.4 * content + 0.2 * topic + 0.1 * structural.
pub fn duplicate_score(a: &Article, b: &Article) -> f64 {
    let title = similarity::raw_string_similarity(
        &a.title.to_lowercase(),
        &b.title.to_lowercase(),
    );

    let profile_a = profile::build_profile(&a.content);
    let profile_b = profile::build_profile(&b.content);
    let content = 0.5 * similarity::lexical_overlap(&profile_a, &profile_b)
        + 0.5 * similarity::vector_overlap(&profile_a, &profile_b);

    let topic = similarity::jaccard(&topic_set(a), &topic_set(b));

    let structural = similarity::structural_overlap(
        structural::element_counts(&a.content),
        structural::element_counts(&b.content),
    );

    (TITLE_WEIGHT * title
        + CONTENT_WEIGHT * content
        + TOPIC_WEIGHT * topic
        + STRUCTURAL_WEIGHT * structural)
        .clamp(0.0, 1.0)
}

/// Partition flagged pairs into batch-level consolidation buckets.
pub fn consolidation_groups(candidates: &[DuplicateCandidate]) -> ConsolidationGroups {
    let immediate = candidates.iter().filter(|c| c.score > 0.9).cloned().collect();
    let review = candidates
        .iter()
        .filter(|c| c.score > 0.8 && c.score <= 0.9)
        .cloned()
        .collect();
    ConsolidationGroups { immediate, review }
}

/// Score one article against the corpus and tier every candidate pair.
pub fn detect(article: &Article, corpus: &[Article]) -> DuplicateReport {
    let start = std::time::Instant::now();
    let mut candidates: Vec<DuplicateCandidate> = corpus
        .par_iter()
        .filter(|other| other.id != article.id)
        .filter_map(|other| {
            let score = duplicate_score(article, other);
            if score <= CANDIDATE_FLOOR {
                return None;
            }
            let (tier, confidence) = classify(score);
            Some(DuplicateCandidate {
                pair_id: PairKey::new(&article.id, &other.id).id(),
                article_a: article.id.clone(),
                article_b: other.id.clone(),
                score,
                tier,
                confidence,
            })
        })
        .collect();

    candidates.sort_by(|x, y| {
        y.score
            .partial_cmp(&x.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.article_b.cmp(&y.article_b))
    });

    let groups = consolidation_groups(&candidates);
    info!(
        "Duplicate detection - article={}, corpus={}, candidates={}, immediate={}, review={}, duration={:.1}ms",
        article.id,
        corpus.len(),
        candidates.len(),
        groups.immediate.len(),
        groups.review.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    debug!(
        "Duplicate candidate scores: {:?}",
        candidates.iter().map(|c| (c.article_b.as_str(), c.score)).collect::<Vec<_>>()
    );

    DuplicateReport { article_id: article.id.clone(), candidates, groups }
}
