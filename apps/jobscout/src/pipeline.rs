//! Pipeline — one run from feed fetch to notification.
//!
//! Per posting, in feed order:
//!   normalize → skip if its folder exists → optionally skip ids from earlier
//!   runs → score → generate + write → record id (flushed at once).
//!
//! Strictly sequential: one model request in flight at a time. A killed run is
//! safe to restart because job folders appear atomically and an id is only
//! flushed once its posting has been handled.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::feed::normalizer::normalize;
use crate::feed::{FeedSource, RawPosting};
use crate::generation::relevance::char_prefix;
use crate::history::{state_path, RunHistory};
use crate::models::job::JobPosting;
use crate::notify::notify_run;
use crate::output::WriteOutcome;
use crate::state::AppState;

/// Characters of posting content shown per item in a dry run.
pub const PREVIEW_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub feed_url: String,
    /// Inclusive: a posting scoring exactly the threshold qualifies.
    pub threshold: f64,
    /// Maximum number of postings scored in this run.
    pub limit: Option<usize>,
    /// Skip ids recorded by earlier runs instead of rescoring them.
    pub skip_seen: bool,
}

/// What happened to one posting.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    AlreadyGenerated,
    PreviouslySeen,
    /// Same id appeared earlier in this feed.
    Duplicate,
    BelowThreshold,
    Generated(PathBuf),
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::AlreadyGenerated => "already generated",
            Outcome::PreviouslySeen => "previously seen",
            Outcome::Duplicate => "duplicate",
            Outcome::BelowThreshold => "below threshold",
            Outcome::Generated(_) => "generated",
            Outcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunEntry {
    pub id: String,
    pub title: String,
    pub link: String,
    pub score: Option<f64>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Postings taken from the feed (excluding any left unread by `limit`).
    pub seen: usize,
    pub skipped_existing: usize,
    pub skipped_seen: usize,
    pub duplicates: usize,
    pub scored: usize,
    pub below_threshold: usize,
    pub generated: usize,
    pub failed: usize,
    pub limit_reached: bool,
    /// Postings whose id no earlier run had recorded.
    pub new_postings: Vec<RunEntry>,
}

impl RunReport {
    fn tally(&mut self, score: Option<f64>, outcome: &Outcome) {
        if score.is_some() {
            self.scored += 1;
        }
        match outcome {
            Outcome::AlreadyGenerated => self.skipped_existing += 1,
            Outcome::PreviouslySeen => self.skipped_seen += 1,
            Outcome::Duplicate => self.duplicates += 1,
            Outcome::BelowThreshold => self.below_threshold += 1,
            Outcome::Generated(_) => self.generated += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Processes the feed once.
///
/// Fatal: feed failures, scoring call failures, authentication failures and a
/// failed final history write. Everything else is scoped to its posting.
/// Postings handled before a fatal error are still recorded and notified.
pub async fn run(
    state: &AppState,
    master_resume: &str,
    options: &RunOptions,
) -> Result<RunReport, AppError> {
    let mut history = RunHistory::load(state_path(state.writer.root()));
    let postings = state.feed.fetch(&options.feed_url).await?;

    let mut report = RunReport::default();
    let processed =
        process_postings(state, &mut history, &postings, master_resume, options, &mut report).await;
    let flushed = history.flush();

    if let Err(e) = &processed {
        error!("Run aborted: {e}");
    } else {
        info!(
            "Run complete: {} seen, {} new, {} scored, {} generated, {} failed, {} skipped (existing)",
            report.seen,
            report.new_postings.len(),
            report.scored,
            report.generated,
            report.failed,
            report.skipped_existing
        );
    }

    notify_run(state.notifier.as_ref(), &report).await;
    processed?;
    flushed?;
    Ok(report)
}

/// An id is recorded only once its posting has been fully handled, so a run
/// that dies mid-posting leaves that posting new for the next run. Failed
/// postings are not recorded either and get another attempt next run.
async fn process_postings(
    state: &AppState,
    history: &mut RunHistory,
    postings: &[RawPosting],
    master_resume: &str,
    options: &RunOptions,
    report: &mut RunReport,
) -> Result<(), AppError> {
    let mut handled: HashSet<String> = HashSet::new();

    for raw in postings {
        if let Some(limit) = options.limit {
            if report.scored >= limit {
                info!("Scoring limit of {limit} reached; remaining postings wait for the next run");
                report.limit_reached = true;
                break;
            }
        }

        let job = normalize(raw);
        report.seen += 1;

        if !handled.insert(job.id.clone()) {
            debug!("Duplicate id '{}' in feed; skipping", job.id);
            report.tally(None, &Outcome::Duplicate);
            continue;
        }

        let is_new = !history.seen_before(&job.id);
        let (score, outcome) = evaluate(state, history, &job, master_resume, options).await?;
        report.tally(score, &outcome);

        if !matches!(outcome, Outcome::Failed(_)) && history.record(&job.id) {
            if let Err(e) = history.flush() {
                warn!("Could not persist run state after '{}': {e}", job.id);
            }
        }
        if is_new {
            report.new_postings.push(RunEntry {
                id: job.id,
                title: job.title,
                link: job.link,
                score,
                outcome,
            });
        }
    }
    Ok(())
}

async fn evaluate(
    state: &AppState,
    history: &RunHistory,
    job: &JobPosting,
    master_resume: &str,
    options: &RunOptions,
) -> Result<(Option<f64>, Outcome), AppError> {
    if state.writer.exists(&job.title) {
        info!(
            "Skipping '{}': {} already exists",
            job.title,
            state.writer.location_for(&job.title).display()
        );
        return Ok((None, Outcome::AlreadyGenerated));
    }
    if options.skip_seen && history.seen_before(&job.id) {
        debug!("Skipping '{}': id seen in an earlier run", job.title);
        return Ok((None, Outcome::PreviouslySeen));
    }

    let score = state.scorer.score(&job.content, master_resume).await?;
    println!("Job {} score={score:.3}", job.title);
    if score < options.threshold {
        return Ok((Some(score), Outcome::BelowThreshold));
    }

    println!("  -> Generating application for {}", job.title);
    let outcome = match generate_and_write(state, job, score, master_resume).await {
        Ok(WriteOutcome::Written(path)) => {
            println!("  -> Saved to {}", path.display());
            Outcome::Generated(path)
        }
        Ok(WriteOutcome::AlreadyExists(path)) => {
            info!("{} appeared during generation; kept as is", path.display());
            Outcome::AlreadyGenerated
        }
        Err(e) if e.is_auth() => return Err(e),
        Err(e) => {
            error!("Generation failed for '{}': {e}", job.title);
            Outcome::Failed(e.to_string())
        }
    };
    Ok((Some(score), outcome))
}

async fn generate_and_write(
    state: &AppState,
    job: &JobPosting,
    score: f64,
    master_resume: &str,
) -> Result<WriteOutcome, AppError> {
    let documents = state.generator.generate(job, master_resume).await?;
    state.writer.write(job, score, &documents)
}

/// Fetches the feed and writes a preview of each posting to `out`. Never
/// calls the model and never touches run state. Returns the number of postings.
pub async fn dry_run(
    feed: &dyn FeedSource,
    feed_url: &str,
    out: &mut dyn Write,
) -> Result<usize, AppError> {
    writeln!(out, "Dry run: fetching feed and displaying job previews (no API calls)")?;
    let postings = feed.fetch(feed_url).await?;
    for raw in &postings {
        writeln!(out, "{}", preview(&normalize(raw)))?;
    }
    Ok(postings.len())
}

fn preview(job: &JobPosting) -> String {
    let content = if job.content.trim().is_empty() {
        "(no content)".to_string()
    } else {
        char_prefix(&job.content, PREVIEW_CHARS).replace(['\n', '\r'], " ")
    };
    format!(
        "{}\nTitle: {}\nID: {}\nPreview: {}",
        "-".repeat(40),
        job.title,
        job.id,
        content
    )
}
