//! Content-quality audit and near-duplicate detection for knowledge-base
//! articles: a pluggable rule engine with per-rule failure isolation, a
//! multi-metric similarity engine with pair caching, structural and
//! semantic/readability analyzers, and a duplicate-consolidation
//! recommender.

pub mod builtin;
pub mod duplicates;
pub mod engine;
pub mod models;
pub mod orchestrator;
pub mod profile;
pub mod rules;
pub mod semantic;
pub mod similarity;
pub mod structural;

pub use engine::{AuditEngine, EngineConfig};
pub use models::{
    Article, AuditResult, BatchAuditResult, ClearedCounts, DuplicateCandidate, DuplicateReport,
    DuplicateTier, Issue, PairKey, Severity, SimilarityMetrics, SimilarityReport,
    SimilarityResult,
};
pub use orchestrator::{write_reports, AdvancedAnalysisReport, BatchAnalysisReport};
pub use profile::{build_profile, ContentProfile};
pub use rules::{EngineError, ExecutionContext, Rule, RuleInfo};
