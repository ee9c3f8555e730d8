use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::Parser;
use tracing::{debug, info};

use kb_audit::{Article, AuditEngine, EngineConfig};

/// kb-audit - content-quality audit and duplicate detection for
/// knowledge-base articles
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a JSON array of articles
    #[arg(short, long)]
    articles: String,

    /// Output directory for generated reports (default: "out")
    #[arg(short, long, default_value = "out")]
    output_dir: String,

    /// Comma-separated rule ids to run (default: all registered rules)
    #[arg(short, long)]
    rules: Option<String>,

    /// Aggregate similarity threshold for reportable pairs
    #[arg(short, long, default_value_t = 0.7)]
    threshold: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    let args = Args::parse();
    info!("Starting kb-audit - articles={}, output_dir={}", args.articles, args.output_dir);

    let path = std::path::Path::new(&args.articles);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "articles file not found at {}\n\
             Provide a JSON array of articles, e.g.:\n\
             [{{\"id\":\"kb-1\",\"title\":\"...\",\"content\":\"...\",\"category\":\"guide\",\
             \"tags\":[],\"last_modified\":\"2026-01-01T00:00:00Z\"}}]",
            path.display()
        ));
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let articles: Vec<Article> =
        serde_json::from_str(&raw).context("parsing articles JSON")?;
    info!("Loaded {} articles", articles.len());

    let rule_filter: Option<Vec<String>> = args.rules.as_ref().map(|s| {
        s.split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect()
    });
    if let Some(ref ids) = rule_filter {
        debug!("Rule filter: {:?}", ids);
    }

    let engine = AuditEngine::with_default_rules(EngineConfig {
        similarity_threshold: args.threshold,
    });

    // 1) batch audit
    let audit_start = std::time::Instant::now();
    let batch = engine.audit_multiple_articles(&articles, rule_filter.as_deref())?;
    info!(
        "Audit completed - articles={}, issues={}, duration={:.2}s",
        batch.total_articles,
        batch.total_issues,
        audit_start.elapsed().as_secs_f32()
    );

    // 2) full advanced analysis (similarity, structure, semantics, duplicates)
    let analysis_start = std::time::Instant::now();
    let analysis = engine.analyze_batch(&articles)?;
    info!(
        "Analysis completed - mean_confidence={:.2}, duration={:.2}s",
        analysis.mean_confidence,
        analysis_start.elapsed().as_secs_f32()
    );

    // 3) persist reports under a date-scoped directory
    let today = Utc::now();
    let ymd = format!("{:04}-{:02}-{:02}", today.year(), today.month(), today.day());
    let date_dir =
        kb_audit::write_reports(std::path::Path::new(&args.output_dir), &ymd, &batch, &analysis)
            .context("writing reports")?;
    debug!("Output directory: {}", date_dir.display());

    let duplicate_pairs: usize = analysis
        .reports
        .iter()
        .map(|r| r.duplicates.candidates.len())
        .sum();
    info!(
        "Done - articles={}, issues={}, duplicate_candidates={}, reports in {}",
        batch.total_articles,
        batch.total_issues,
        duplicate_pairs,
        date_dir.display()
    );
    Ok(())
}
