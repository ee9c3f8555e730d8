use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use crate::engine::AuditEngine;
use crate::models::{Article, AuditResult, BatchAuditResult, DuplicateReport, SimilarityReport};
use crate::rules::EngineError;
use crate::semantic::SemanticReport;
use crate::structural::StructuralReport;

#[derive(Debug, Clone, Serialize)]
pub struct AdvancedAnalysisReport {
    pub article_id: String,
    pub audit: AuditResult,
    pub similarity: SimilarityReport,
    pub structural: StructuralReport,
    pub semantic: SemanticReport,
    pub duplicates: DuplicateReport,
    /// Derived from rule coverage and issue-count balance, in [0, 1].
    pub confidence: f64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchAnalysisReport {
    pub reports: Vec<AdvancedAnalysisReport>,
    pub total_articles: usize,
    pub mean_confidence: f64,
    pub elapsed_ms: u64,
}

/// Confidence in a report: how much of the registry actually ran, damped by
/// how noisy the article turned out to be.
fn confidence_score(rules_registered: usize, rules_executed: usize, issues: usize) -> f64 {
    let coverage = if rules_registered == 0 {
        0.0
    } else {
        rules_executed as f64 / rules_registered as f64
    };
    let balance = 1.0 / (1.0 + issues as f64 / 5.0);
    (0.6 * coverage + 0.4 * balance).clamp(0.0, 1.0)
}

/// Persist the three report files under a `YYYY-MM-DD` subdirectory of
/// `output_dir`; returns the directory written to.
pub fn write_reports(
    output_dir: &Path,
    ymd: &str,
    batch: &BatchAuditResult,
    analysis: &BatchAnalysisReport,
) -> anyhow::Result<PathBuf> {
    let date_dir = output_dir.join(ymd);
    std::fs::create_dir_all(&date_dir)
        .with_context(|| format!("creating {}", date_dir.display()))?;

    std::fs::write(date_dir.join("audit.json"), serde_json::to_vec_pretty(batch)?)?;
    debug!("Wrote audit.json");

    let duplicates: Vec<&DuplicateReport> =
        analysis.reports.iter().map(|r| &r.duplicates).collect();
    std::fs::write(date_dir.join("duplicates.json"), serde_json::to_vec_pretty(&duplicates)?)?;
    debug!("Wrote duplicates.json");

    std::fs::write(date_dir.join("analysis.json"), serde_json::to_vec_pretty(analysis)?)?;
    debug!("Wrote analysis.json");

    Ok(date_dir)
}

impl AuditEngine {
    /// Run every analyzer against one article and merge the outputs. The
    /// stages are independent; only the similarity cache is shared state.
    pub fn analyze_article(
        &self,
        article: &Article,
        corpus: &[Article],
    ) -> Result<AdvancedAnalysisReport, EngineError> {
        let start = std::time::Instant::now();
        debug!("Advanced analysis started - article={}", article.id);

        let audit = self.execute_rules(article, None)?;
        let similarity = self.analyze_content_similarity(article, corpus);
        let structural = self.analyze_structural_issues(article);
        let semantic = self.analyze_semantic_content(article);
        let duplicates = self.enhanced_duplicate_detection(article, corpus);

        let confidence =
            confidence_score(self.rule_count(), audit.rules_executed, audit.issues_found);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Advanced analysis - article={}, issues={}, matches={}, duplicates={}, confidence={:.2}, duration={}ms",
            article.id,
            audit.issues_found,
            similarity.matches.len(),
            duplicates.candidates.len(),
            confidence,
            elapsed_ms
        );

        Ok(AdvancedAnalysisReport {
            article_id: article.id.clone(),
            audit,
            similarity,
            structural,
            semantic,
            duplicates,
            confidence,
            elapsed_ms,
        })
    }

    /// Per-article advanced analysis across a whole set, with aggregate
    /// timing and mean confidence.
    pub fn analyze_batch(&self, articles: &[Article]) -> Result<BatchAnalysisReport, EngineError> {
        let start = std::time::Instant::now();
        let mut reports = Vec::with_capacity(articles.len());
        for article in articles {
            reports.push(self.analyze_article(article, articles)?);
        }

        let mean_confidence = if reports.is_empty() {
            0.0
        } else {
            reports.iter().map(|r| r.confidence).sum::<f64>() / reports.len() as f64
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch analysis - articles={}, mean_confidence={:.2}, duration={}ms",
            reports.len(),
            mean_confidence,
            elapsed_ms
        );

        Ok(BatchAnalysisReport {
            total_articles: reports.len(),
            reports,
            mean_confidence,
            elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AuditEngine;
    use chrono::Utc;

    fn article(id: &str, title: &str, content: &str) -> Article {
        Article {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            category: "guide".to_string(),
            tags: ["kb".to_string()].into_iter().collect(),
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn confidence_rewards_coverage_and_quiet_audits() {
        let full = confidence_score(10, 10, 0);
        let partial = confidence_score(10, 5, 0);
        let noisy = confidence_score(10, 10, 20);
        assert!(full > partial);
        assert!(full > noisy);
        assert_eq!(full, 1.0);
        assert_eq!(confidence_score(0, 0, 0), 0.4);
    }

    #[test]
    fn report_merges_all_analyzers() {
        let engine = AuditEngine::default();
        let a = article(
            "a1",
            "Deploy guide",
            "# Deploy guide\n\nRun the deploy script after review. The deploy script checks the build twice.",
        );
        let b = article(
            "b1",
            "Release guide",
            "# Release guide\n\nRun the release script after approval. The release script validates the build.",
        );
        let report = engine.analyze_article(&a, &[a.clone(), b.clone()]).unwrap();
        assert_eq!(report.article_id, "a1");
        assert_eq!(report.audit.rules_executed, engine.rule_count());
        assert_eq!(report.structural.article_id, "a1");
        assert!((0.0..=1.0).contains(&report.confidence));
    }

    #[test]
    fn reports_land_in_a_date_scoped_directory() {
        let engine = AuditEngine::default();
        let articles = vec![
            article("a1", "One", "Body text one, short but present for the audit pass."),
            article("b1", "Two", "Body text two, also short but present for the audit pass."),
        ];
        let batch = engine.audit_multiple_articles(&articles, None).unwrap();
        let analysis = engine.analyze_batch(&articles).unwrap();

        let base = std::env::temp_dir().join(format!("kb-audit-reports-{}", std::process::id()));
        let dir = write_reports(&base, "2026-08-30", &batch, &analysis).unwrap();
        assert!(dir.ends_with("2026-08-30"));
        for name in ["audit.json", "duplicates.json", "analysis.json"] {
            assert!(dir.join(name).is_file(), "{name} missing from {}", dir.display());
        }

        let raw = std::fs::read_to_string(dir.join("duplicates.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn batch_reports_mean_confidence() {
        let engine = AuditEngine::default();
        let articles = vec![
            article("a1", "One", "Body text one, short but present for the audit pass."),
            article("b1", "Two", "Body text two, also short but present for the audit pass."),
        ];
        let batch = engine.analyze_batch(&articles).unwrap();
        assert_eq!(batch.total_articles, 2);
        let expected: f64 =
            batch.reports.iter().map(|r| r.confidence).sum::<f64>() / 2.0;
        assert!((batch.mean_confidence - expected).abs() < 1e-12);
    }
}
