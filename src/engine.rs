use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use crate::builtin;
use crate::models::{
    Article, AuditResult, BatchAuditResult, ClearedCounts, DuplicateReport, SimilarityReport,
};
use crate::duplicates;
use crate::rules::{EngineError, Rule, RuleEngine, RuleInfo};
use crate::semantic::{self, SemanticReport};
use crate::similarity::{SimilarityEngine, DEFAULT_SIMILARITY_THRESHOLD};
use crate::structural::{self, StructuralReport};

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Aggregate score above which a pair is reportable.
    pub similarity_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD }
    }
}

/// One engine instance owns its rule registry and caches; instances are
/// independent, so tests and concurrent deployments never share state.
pub struct AuditEngine {
    pub config: EngineConfig,
    rules: RuleEngine,
    similarity: SimilarityEngine,
    structural_cache: DashMap<String, StructuralReport>,
}

impl AuditEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            rules: RuleEngine::new(),
            similarity: SimilarityEngine::new(config.similarity_threshold),
            structural_cache: DashMap::new(),
        }
    }

    /// Engine preloaded with the built-in rule set.
    pub fn with_default_rules(config: EngineConfig) -> Self {
        let mut engine = Self::new(config);
        builtin::register_defaults(&mut engine.rules)
            .expect("built-in rule ids are unique");
        info!("Engine ready - rules={}, threshold={}", engine.rules.len(), config.similarity_threshold);
        engine
    }

    pub fn register_rule(&mut self, rule: Box<dyn Rule>) -> Result<(), EngineError> {
        self.rules.register(rule)
    }

    pub fn rules(&self) -> Vec<RuleInfo> {
        self.rules.rules()
    }

    pub fn rule(&self, id: &str) -> Option<RuleInfo> {
        self.rules.rule(id)
    }

    pub fn rules_by_category(&self) -> BTreeMap<String, Vec<String>> {
        self.rules.rules_by_category()
    }

    pub fn update_rule_config(&mut self, id: &str, config: Value) -> Result<(), EngineError> {
        self.rules.update_config(id, config)
    }

    pub fn set_rule_enabled(&mut self, id: &str, enabled: bool) -> Result<(), EngineError> {
        self.rules.set_enabled(id, enabled)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn execute_rules(
        &self,
        article: &Article,
        rule_ids: Option<&[String]>,
    ) -> Result<AuditResult, EngineError> {
        self.rules.execute_rules(article, rule_ids)
    }

    pub fn audit_multiple_articles(
        &self,
        articles: &[Article],
        rule_ids: Option<&[String]>,
    ) -> Result<BatchAuditResult, EngineError> {
        self.rules.audit_multiple(articles, rule_ids)
    }

    pub fn analyze_content_similarity(
        &self,
        article: &Article,
        corpus: &[Article],
    ) -> SimilarityReport {
        self.similarity.analyze(article, corpus)
    }

    /// Structural report, cached per article id until `clear_caches`.
    pub fn analyze_structural_issues(&self, article: &Article) -> StructuralReport {
        self.structural_cache
            .entry(article.id.clone())
            .or_insert_with(|| structural::analyze_structure(&article.id, &article.content))
            .clone()
    }

    pub fn analyze_semantic_content(&self, article: &Article) -> SemanticReport {
        semantic::analyze_semantics(&article.id, &article.content)
    }

    pub fn enhanced_duplicate_detection(
        &self,
        article: &Article,
        corpus: &[Article],
    ) -> DuplicateReport {
        duplicates::detect(article, corpus)
    }

    pub fn similarity_cache_len(&self) -> usize {
        self.similarity.cache_len()
    }

    /// Explicit clear is the only invalidation path for both caches.
    pub fn clear_caches(&self) -> ClearedCounts {
        let similarity = self.similarity.clear_cache();
        let structural = self.structural_cache.len();
        self.structural_cache.clear();
        info!("Caches cleared - similarity={}, structural={}", similarity, structural);
        ClearedCounts { similarity, structural }
    }
}

impl Default for AuditEngine {
    fn default() -> Self {
        Self::with_default_rules(EngineConfig::default())
    }
}
