mod config;
mod errors;
mod feed;
mod generation;
mod history;
mod llm_client;
mod models;
mod notify;
mod output;
mod pipeline;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LlmConfig};
use crate::feed::HttpFeedSource;
use crate::generation::generator::ApplicationGenerator;
use crate::generation::relevance::RelevanceScorer;
use crate::llm_client::{ChatBackend, LlmClient};
use crate::notify::notifier_from_config;
use crate::output::OutputWriter;
use crate::pipeline::{RunOptions, RunReport};
use crate::state::AppState;

/// Fetch RSS/Atom job postings, score them against a master résumé and
/// generate a tailored résumé and cover letter for the good matches.
#[derive(Parser, Debug)]
#[command(name = "jobscout", version)]
struct Cli {
    /// RSS/Atom feed URL (or local file path) to poll
    #[arg(long)]
    feed: String,

    /// Master résumé (markdown or plain text)
    #[arg(long, default_value = "sample_master_resume.md")]
    resume: PathBuf,

    /// Minimum relevance score (0-1, inclusive) for generating an application
    #[arg(long, default_value_t = 0.7, value_parser = parse_threshold)]
    threshold: f64,

    /// Output directory for applications and run state
    #[arg(long, default_value = "applications")]
    out: PathBuf,

    /// Fetch and preview postings without calling the model or writing state
    #[arg(long)]
    dry_run: bool,

    /// Also write HTML renderings of the generated documents
    #[arg(long)]
    convert: bool,

    /// Score at most this many postings in this run
    #[arg(long)]
    limit: Option<usize>,

    /// Do not rescore postings recorded by an earlier run
    #[arg(long)]
    skip_seen: bool,
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("threshold must be between 0 and 1, got {value}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first; credentials are only required outside dry runs
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobscout v{}", env!("CARGO_PKG_VERSION"));

    let master_resume = std::fs::read_to_string(&cli.resume)
        .with_context(|| format!("Failed to read master resume {}", cli.resume.display()))?;
    println!("Using master resume: {}", cli.resume.display());

    let feed = Arc::new(HttpFeedSource::new()?);

    if cli.dry_run {
        pipeline::dry_run(feed.as_ref(), &cli.feed, &mut std::io::stdout()).await?;
        return Ok(());
    }

    let llm_config = LlmConfig::from_env()?;
    let llm: Arc<dyn ChatBackend> = Arc::new(LlmClient::new(&llm_config)?);
    info!(
        "LLM client initialized (scoring: {}, generation: {})",
        llm_config.scoring_deployment, llm_config.generation_deployment
    );

    let state = AppState {
        feed,
        scorer: RelevanceScorer::new(
            llm.clone(),
            llm_config.scoring_deployment.clone(),
            config.budgets.score_input_chars,
            config.budgets.score_max_tokens,
        ),
        generator: ApplicationGenerator::new(
            llm,
            llm_config.generation_deployment.clone(),
            config.prompts.clone(),
            config.budgets.resume_max_tokens,
            config.budgets.cover_letter_max_tokens,
        ),
        writer: OutputWriter::new(&cli.out, cli.convert),
        notifier: notifier_from_config(config.notify_webhook_url.as_deref()),
    };

    let options = RunOptions {
        feed_url: cli.feed,
        threshold: cli.threshold,
        limit: cli.limit,
        skip_seen: cli.skip_seen,
    };

    let report = pipeline::run(&state, &master_resume, &options).await?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "Done: {} postings, {} new, {} scored, {} generated, {} below threshold, {} failed, {} already generated",
        report.seen,
        report.new_postings.len(),
        report.scored,
        report.generated,
        report.below_threshold,
        report.failed,
        report.skipped_existing
    );
    if report.skipped_seen + report.duplicates > 0 {
        println!(
            "Skipped {} posting(s) seen in earlier runs and {} duplicate(s) within the feed",
            report.skipped_seen, report.duplicates
        );
    }
    if report.limit_reached {
        println!("Scoring limit reached; run again to continue with the remaining postings.");
    }
}
