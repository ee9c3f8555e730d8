//! Default quality rules registered by `AuditEngine::with_default_rules`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::models::{Issue, Severity};
use crate::rules::{ExecutionContext, Rule, RuleEngine};
use crate::structural;

fn cfg_u64(config: &Value, key: &str, default: u64) -> u64 {
    config.get(key).and_then(Value::as_u64).unwrap_or(default)
}

fn issue(rule: &dyn Rule, message: String, fix: Option<String>) -> Option<Issue> {
    Some(Issue {
        rule_id: rule.id().to_string(),
        rule_name: rule.name().to_string(),
        severity: rule.severity(),
        category: rule.category().to_string(),
        message,
        details: None,
        suggested_fix: fix,
    })
}

pub struct ContentTooShort;

impl Rule for ContentTooShort {
    fn id(&self) -> &str {
        "content-too-short"
    }
    fn name(&self) -> &str {
        "Content too short"
    }
    fn category(&self) -> &str {
        "content"
    }
    fn severity(&self) -> Severity {
        Severity::Medium
    }
    fn default_config(&self) -> Value {
        json!({ "min_words": 50 })
    }
    fn evaluate(&self, ctx: &ExecutionContext, config: &Value) -> anyhow::Result<Option<Issue>> {
        let min_words = cfg_u64(config, "min_words", 50) as usize;
        if ctx.word_count < min_words {
            return Ok(issue(
                self,
                format!("article has {} words, below the {} word minimum", ctx.word_count, min_words),
                Some("Expand the article or merge it into a related one".to_string()),
            ));
        }
        Ok(None)
    }
}

pub struct TitleLength;

impl Rule for TitleLength {
    fn id(&self) -> &str {
        "title-length"
    }
    fn name(&self) -> &str {
        "Title length"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn severity(&self) -> Severity {
        Severity::Low
    }
    fn default_config(&self) -> Value {
        json!({ "min_chars": 5, "max_chars": 120 })
    }
    fn evaluate(&self, ctx: &ExecutionContext, config: &Value) -> anyhow::Result<Option<Issue>> {
        let min = cfg_u64(config, "min_chars", 5) as usize;
        let max = cfg_u64(config, "max_chars", 120) as usize;
        let len = ctx.article.title.chars().count();
        if len < min || len > max {
            return Ok(issue(
                self,
                format!("title is {len} characters (expected {min}-{max})"),
                Some("Rewrite the title to a concise, descriptive phrase".to_string()),
            ));
        }
        Ok(None)
    }
}

pub struct StaleContent;

impl Rule for StaleContent {
    fn id(&self) -> &str {
        "stale-content"
    }
    fn name(&self) -> &str {
        "Stale content"
    }
    fn category(&self) -> &str {
        "freshness"
    }
    fn severity(&self) -> Severity {
        Severity::Medium
    }
    fn default_config(&self) -> Value {
        json!({ "max_age_days": 365 })
    }
    fn evaluate(&self, ctx: &ExecutionContext, config: &Value) -> anyhow::Result<Option<Issue>> {
        let max_age = cfg_u64(config, "max_age_days", 365) as i64;
        if ctx.age_days > max_age {
            return Ok(issue(
                self,
                format!("article was last modified {} days ago (limit {})", ctx.age_days, max_age),
                Some("Review the article for outdated instructions".to_string()),
            ));
        }
        Ok(None)
    }
}

pub struct MissingAltText;

impl Rule for MissingAltText {
    fn id(&self) -> &str {
        "missing-alt-text"
    }
    fn name(&self) -> &str {
        "Images missing alt text"
    }
    fn category(&self) -> &str {
        "accessibility"
    }
    fn severity(&self) -> Severity {
        Severity::High
    }
    fn evaluate(&self, ctx: &ExecutionContext, _config: &Value) -> anyhow::Result<Option<Issue>> {
        if !ctx.has_images {
            return Ok(None);
        }
        let report = structural::analyze_structure(&ctx.article.id, &ctx.article.content);
        if report.images.missing_alt > 0 {
            return Ok(issue(
                self,
                format!("{} of {} images have no alt text", report.images.missing_alt, report.images.total),
                Some("Add descriptive alt text to every image".to_string()),
            ));
        }
        Ok(None)
    }
}

pub struct NoHeadings;

impl Rule for NoHeadings {
    fn id(&self) -> &str {
        "no-headings"
    }
    fn name(&self) -> &str {
        "Long article without headings"
    }
    fn category(&self) -> &str {
        "structure"
    }
    fn severity(&self) -> Severity {
        Severity::Medium
    }
    fn default_config(&self) -> Value {
        json!({ "min_words": 300 })
    }
    fn evaluate(&self, ctx: &ExecutionContext, config: &Value) -> anyhow::Result<Option<Issue>> {
        let min_words = cfg_u64(config, "min_words", 300) as usize;
        if ctx.word_count >= min_words
            && structural::parse_headings(&ctx.article.content).is_empty()
        {
            return Ok(issue(
                self,
                format!("{} words with no section headings", ctx.word_count),
                Some("Break the article into sections with headings".to_string()),
            ));
        }
        Ok(None)
    }
}

pub struct UntaggedArticle;

impl Rule for UntaggedArticle {
    fn id(&self) -> &str {
        "untagged-article"
    }
    fn name(&self) -> &str {
        "Untagged article"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn severity(&self) -> Severity {
        Severity::Low
    }
    fn evaluate(&self, ctx: &ExecutionContext, _config: &Value) -> anyhow::Result<Option<Issue>> {
        if ctx.article.tags.is_empty() {
            return Ok(issue(
                self,
                "article has no tags".to_string(),
                Some("Tag the article so it surfaces in search and related links".to_string()),
            ));
        }
        Ok(None)
    }
}

static WEASEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:many believe|some say|it is said|experts suggest|studies show|research suggests|arguably|it could be argued)\b",
    )
    .unwrap()
});

pub struct WeaselWords;

impl Rule for WeaselWords {
    fn id(&self) -> &str {
        "weasel-words"
    }
    fn name(&self) -> &str {
        "Weasel wording"
    }
    fn category(&self) -> &str {
        "style"
    }
    fn severity(&self) -> Severity {
        Severity::Low
    }
    fn default_config(&self) -> Value {
        json!({ "max_occurrences": 0 })
    }
    fn evaluate(&self, ctx: &ExecutionContext, config: &Value) -> anyhow::Result<Option<Issue>> {
        let max = cfg_u64(config, "max_occurrences", 0) as usize;
        let hits: Vec<String> = WEASEL_RE
            .find_iter(&ctx.article.content)
            .map(|m| m.as_str().to_lowercase())
            .collect();
        if hits.len() > max {
            let mut out = issue(
                self,
                format!("{} weasel phrase(s) found", hits.len()),
                Some("Replace vague attributions with concrete sources".to_string()),
            );
            if let Some(ref mut i) = out {
                i.details = Some(hits.join(", "));
            }
            return Ok(out);
        }
        Ok(None)
    }
}

/// Register the full default rule set, in the order audits report them.
pub fn register_defaults(engine: &mut RuleEngine) -> Result<(), crate::rules::EngineError> {
    engine.register(Box::new(ContentTooShort))?;
    engine.register(Box::new(TitleLength))?;
    engine.register(Box::new(StaleContent))?;
    engine.register(Box::new(MissingAltText))?;
    engine.register(Box::new(NoHeadings))?;
    engine.register(Box::new(UntaggedArticle))?;
    engine.register(Box::new(WeaselWords))?;
    Ok(())
}
