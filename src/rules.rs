use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Article, AuditResult, BatchAuditResult, Issue, Severity};
use crate::profile;
use crate::structural;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule id must not be empty")]
    InvalidRule,
    #[error("duplicate rule id: {0}")]
    DuplicateRuleId(String),
    #[error("unknown rule id: {0}")]
    UnknownRule(String),
    #[error("invalid article: {0}")]
    InvalidArticle(String),
    #[error("invalid rule config for {0}: expected a JSON object")]
    InvalidConfig(String),
}

/// Per-call snapshot of an article plus derived metadata, handed to every
/// rule evaluation and discarded afterwards.
pub struct ExecutionContext<'a> {
    pub article: &'a Article,
    pub word_count: usize,
    pub content_length: usize,
    pub has_images: bool,
    pub has_links: bool,
    pub age_days: i64,
}

impl<'a> ExecutionContext<'a> {
    pub fn build(article: &'a Article) -> Self {
        let stripped = profile::strip_markup(&article.content);
        let counts = structural::element_counts(&article.content);
        let links = structural::link_stats(&article.content);
        Self {
            article,
            word_count: stripped.split_whitespace().count(),
            content_length: article.content.chars().count(),
            has_images: counts.images > 0,
            has_links: links.internal + links.external > 0,
            age_days: (Utc::now() - article.last_modified).num_days(),
        }
    }
}

/// A single quality check. Implementations must be pure with respect to the
/// context and config they are handed; evaluation errors are isolated by the
/// engine and never abort an audit.
pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn category(&self) -> &str;
    fn severity(&self) -> Severity;
    /// Default configuration; overridable per rule via `update_config`.
    fn default_config(&self) -> Value {
        Value::Object(Default::default())
    }
    fn evaluate(&self, ctx: &ExecutionContext, config: &Value) -> anyhow::Result<Option<Issue>>;
}

struct RuleEntry {
    rule: Box<dyn Rule>,
    enabled: bool,
    config: Value,
}

/// Introspection view of a registered rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub id: String,
    pub name: String,
    pub category: String,
    pub severity: Severity,
    pub enabled: bool,
    pub config: Value,
}

/// Registry plus execution pipeline. Rules run in registration order; the
/// registered set is fixed for the lifetime of a run.
#[derive(Default)]
pub struct RuleEngine {
    entries: Vec<RuleEntry>,
    index: HashMap<String, usize>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) -> Result<(), EngineError> {
        let id = rule.id().trim().to_string();
        if id.is_empty() {
            return Err(EngineError::InvalidRule);
        }
        if self.index.contains_key(&id) {
            return Err(EngineError::DuplicateRuleId(id));
        }
        debug!("Registered rule - id={}, category={}", id, rule.category());
        let config = rule.default_config();
        self.index.insert(id, self.entries.len());
        self.entries.push(RuleEntry { rule, enabled: true, config });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rules(&self) -> Vec<RuleInfo> {
        self.entries.iter().map(|e| self.info(e)).collect()
    }

    pub fn rule(&self, id: &str) -> Option<RuleInfo> {
        self.index.get(id).map(|&i| self.info(&self.entries[i]))
    }

    pub fn rules_by_category(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for e in &self.entries {
            out.entry(e.rule.category().to_string())
                .or_default()
                .push(e.rule.id().to_string());
        }
        out
    }

    /// Replace a rule's configuration. Applies to subsequent calls only.
    pub fn update_config(&mut self, id: &str, config: Value) -> Result<(), EngineError> {
        if !config.is_object() {
            return Err(EngineError::InvalidConfig(id.to_string()));
        }
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| EngineError::UnknownRule(id.to_string()))?;
        self.entries[idx].config = config;
        Ok(())
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), EngineError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| EngineError::UnknownRule(id.to_string()))?;
        self.entries[idx].enabled = enabled;
        Ok(())
    }

    fn info(&self, e: &RuleEntry) -> RuleInfo {
        RuleInfo {
            id: e.rule.id().to_string(),
            name: e.rule.name().to_string(),
            category: e.rule.category().to_string(),
            severity: e.rule.severity(),
            enabled: e.enabled,
            config: e.config.clone(),
        }
    }

    /// Run every enabled rule (optionally filtered by id) against one
    /// article. A failing rule contributes exactly one synthetic system
    /// issue and never blocks its siblings.
    pub fn execute_rules(
        &self,
        article: &Article,
        rule_ids: Option<&[String]>,
    ) -> Result<AuditResult, EngineError> {
        if article.id.trim().is_empty() {
            return Err(EngineError::InvalidArticle("missing article id".to_string()));
        }

        let start = std::time::Instant::now();
        let filter: Option<HashSet<&str>> = rule_ids.map(|ids| {
            let known: HashSet<&str> = ids
                .iter()
                .map(|s| s.as_str())
                .filter(|id| {
                    let known = self.index.contains_key(*id);
                    if !known {
                        // Permissive by design: unknown ids are dropped, not
                        // rejected, but surfaced in the log.
                        warn!("Ignoring unknown rule id in filter: {}", id);
                    }
                    known
                })
                .collect();
            known
        });

        let ctx = ExecutionContext::build(article);
        let mut issues = Vec::new();
        let mut rules_executed = 0usize;

        for entry in &self.entries {
            if !entry.enabled {
                continue;
            }
            if let Some(ref ids) = filter {
                if !ids.contains(entry.rule.id()) {
                    continue;
                }
            }
            rules_executed += 1;
            match entry.rule.evaluate(&ctx, &entry.config) {
                Ok(Some(issue)) => issues.push(issue),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Rule evaluation failed - rule={}, article={}, error={}",
                        entry.rule.id(),
                        article.id,
                        e
                    );
                    issues.push(Issue {
                        rule_id: entry.rule.id().to_string(),
                        rule_name: entry.rule.name().to_string(),
                        severity: Severity::Error,
                        category: "system".to_string(),
                        message: format!("rule evaluation failed: {e}"),
                        details: None,
                        suggested_fix: None,
                    });
                }
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Audit complete - article={}, rules={}, issues={}, duration={}ms",
            article.id,
            rules_executed,
            issues.len(),
            elapsed_ms
        );

        Ok(AuditResult {
            article_id: article.id.clone(),
            rules_executed,
            issues_found: issues.len(),
            issues,
            elapsed_ms,
        })
    }

    /// Audit a set of articles in parallel. Per-article issue ordering is
    /// preserved in the collected results.
    pub fn audit_multiple(
        &self,
        articles: &[Article],
        rule_ids: Option<&[String]>,
    ) -> Result<BatchAuditResult, EngineError> {
        let start = std::time::Instant::now();
        let results: Vec<AuditResult> = articles
            .par_iter()
            .map(|a| self.execute_rules(a, rule_ids))
            .collect::<Result<Vec<_>, _>>()?;

        let total_issues = results.iter().map(|r| r.issues_found).sum();
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch audit - articles={}, total_issues={}, duration={}ms",
            articles.len(),
            total_issues,
            elapsed_ms
        );
        Ok(BatchAuditResult {
            total_articles: results.len(),
            total_issues,
            results,
            elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use chrono::Utc;
    use serde_json::json;

    struct AlwaysFlag {
        id: String,
    }

    impl Rule for AlwaysFlag {
        fn id(&self) -> &str {
            &self.id
        }
        fn name(&self) -> &str {
            "Always flags"
        }
        fn category(&self) -> &str {
            "test"
        }
        fn severity(&self) -> Severity {
            Severity::Low
        }
        fn evaluate(&self, ctx: &ExecutionContext, _config: &Value) -> anyhow::Result<Option<Issue>> {
            Ok(Some(Issue {
                rule_id: self.id.clone(),
                rule_name: self.name().to_string(),
                severity: self.severity(),
                category: self.category().to_string(),
                message: format!("flagged {}", ctx.article.id),
                details: None,
                suggested_fix: None,
            }))
        }
    }

    struct AlwaysFail;

    impl Rule for AlwaysFail {
        fn id(&self) -> &str {
            "always-fail"
        }
        fn name(&self) -> &str {
            "Always fails"
        }
        fn category(&self) -> &str {
            "test"
        }
        fn severity(&self) -> Severity {
            Severity::High
        }
        fn evaluate(&self, _ctx: &ExecutionContext, _config: &Value) -> anyhow::Result<Option<Issue>> {
            bail!("synthetic breakage")
        }
    }

    fn article(id: &str) -> Article {
        Article {
            id: id.to_string(),
            title: "T".to_string(),
            content: "Some body text for the test article.".to_string(),
            category: "guide".to_string(),
            tags: Default::default(),
            last_modified: Utc::now(),
        }
    }

    fn engine_with(rules: Vec<Box<dyn Rule>>) -> RuleEngine {
        let mut engine = RuleEngine::new();
        for r in rules {
            engine.register(r).unwrap();
        }
        engine
    }

    #[test]
    fn rejects_duplicate_and_empty_ids() {
        let mut engine = RuleEngine::new();
        engine.register(Box::new(AlwaysFlag { id: "r1".into() })).unwrap();
        assert!(matches!(
            engine.register(Box::new(AlwaysFlag { id: "r1".into() })),
            Err(EngineError::DuplicateRuleId(_))
        ));
        assert!(matches!(
            engine.register(Box::new(AlwaysFlag { id: "  ".into() })),
            Err(EngineError::InvalidRule)
        ));
    }

    #[test]
    fn failing_rule_is_isolated() {
        let engine = engine_with(vec![
            Box::new(AlwaysFlag { id: "r1".into() }),
            Box::new(AlwaysFail),
            Box::new(AlwaysFlag { id: "r2".into() }),
        ]);
        let result = engine.execute_rules(&article("a1"), None).unwrap();
        assert_eq!(result.rules_executed, 3);
        assert_eq!(result.issues_found, 3);
        let system: Vec<_> =
            result.issues.iter().filter(|i| i.category == "system").collect();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].severity, Severity::Error);
        // siblings still contributed, in registration order
        assert_eq!(result.issues[0].rule_id, "r1");
        assert_eq!(result.issues[1].rule_id, "always-fail");
        assert_eq!(result.issues[2].rule_id, "r2");
    }

    #[test]
    fn execution_is_deterministic() {
        let engine = engine_with(vec![
            Box::new(AlwaysFlag { id: "r1".into() }),
            Box::new(AlwaysFlag { id: "r2".into() }),
        ]);
        let a = article("a1");
        let first = engine.execute_rules(&a, None).unwrap();
        let second = engine.execute_rules(&a, None).unwrap();
        let ids =
            |r: &AuditResult| r.issues.iter().map(|i| i.rule_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn unknown_filter_ids_are_dropped() {
        let engine = engine_with(vec![Box::new(AlwaysFlag { id: "r1".into() })]);
        let filter = vec!["r1".to_string(), "no-such-rule".to_string()];
        let result = engine.execute_rules(&article("a1"), Some(&filter)).unwrap();
        assert_eq!(result.rules_executed, 1);
        assert_eq!(result.issues[0].rule_id, "r1");
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut engine = engine_with(vec![
            Box::new(AlwaysFlag { id: "r1".into() }),
            Box::new(AlwaysFlag { id: "r2".into() }),
        ]);
        engine.set_enabled("r1", false).unwrap();
        let result = engine.execute_rules(&article("a1"), None).unwrap();
        assert_eq!(result.rules_executed, 1);
        assert_eq!(result.issues[0].rule_id, "r2");
    }

    #[test]
    fn missing_article_id_is_rejected_before_rules_run() {
        let engine = engine_with(vec![Box::new(AlwaysFail)]);
        let mut a = article("a1");
        a.id = "".to_string();
        assert!(matches!(
            engine.execute_rules(&a, None),
            Err(EngineError::InvalidArticle(_))
        ));
    }

    #[test]
    fn config_must_be_an_object() {
        let mut engine = engine_with(vec![Box::new(AlwaysFlag { id: "r1".into() })]);
        assert!(matches!(
            engine.update_config("r1", json!([1, 2])),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            engine.update_config("nope", json!({})),
            Err(EngineError::UnknownRule(_))
        ));
        engine.update_config("r1", json!({"min_words": 10})).unwrap();
        assert_eq!(engine.rule("r1").unwrap().config["min_words"], 10);
    }

    #[test]
    fn batch_totals_sum_per_article_counts() {
        let engine = engine_with(vec![
            Box::new(AlwaysFlag { id: "r1".into() }),
            Box::new(AlwaysFlag { id: "r2".into() }),
        ]);
        let articles = vec![article("a"), article("b"), article("c")];
        let batch = engine.audit_multiple(&articles, None).unwrap();
        assert_eq!(batch.total_articles, 3);
        let sum: usize = batch.results.iter().map(|r| r.issues_found).sum();
        assert_eq!(batch.total_issues, sum);
        assert_eq!(batch.total_issues, 6);
        // input order is preserved
        let ids: Vec<_> = batch.results.iter().map(|r| r.article_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn rules_by_category_groups_ids() {
        let engine = engine_with(vec![
            Box::new(AlwaysFlag { id: "r1".into() }),
            Box::new(AlwaysFail),
        ]);
        let by_cat = engine.rules_by_category();
        assert_eq!(by_cat["test"], vec!["r1".to_string(), "always-fail".to_string()]);
    }
}
