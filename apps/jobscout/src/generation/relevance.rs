//! Relevance Scorer — asks the model for a bare number rating job/résumé fit.
//!
//! The reply is searched for a score rather than parsed whole. A reply that
//! cannot be read scores 0.0 and the batch continues; a failed *call* is an error.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::errors::AppError;
use crate::generation::prompts::score_prompt;
use crate::llm_client::prompts::NUMBER_ONLY_SYSTEM;
use crate::llm_client::{ChatBackend, ChatCompletion, ChatRequest};

/// Searched in order; the first pattern found anywhere in the reply wins.
static SCORE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"0\.\d+",    // 0.82
        r"1\.0+",     // 1.0, 1.00
        r"1",         // bare 1
        r"0",         // bare 0
        r"0?\.\d+\b", // .75, also after a space
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub struct RelevanceScorer {
    backend: Arc<dyn ChatBackend>,
    deployment: String,
    input_chars: usize,
    max_tokens: u32,
}

impl RelevanceScorer {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        deployment: impl Into<String>,
        input_chars: usize,
        max_tokens: u32,
    ) -> Self {
        Self {
            backend,
            deployment: deployment.into(),
            input_chars,
            max_tokens,
        }
    }

    /// Scores a job against the résumé. Returns a value in [0, 1].
    ///
    /// Errors only when the model call itself fails; unreadable replies score 0.0.
    pub async fn score(&self, job_text: &str, resume_text: &str) -> Result<f64, AppError> {
        let request = ChatRequest {
            deployment: self.deployment.clone(),
            system: NUMBER_ONLY_SYSTEM.to_string(),
            user: score_prompt(
                char_prefix(job_text, self.input_chars),
                char_prefix(resume_text, self.input_chars),
            ),
            max_completion_tokens: self.max_tokens,
        };
        let completion = self.backend.complete(&request).await?;
        Ok(interpret(&completion))
    }
}

/// Turns a completion into a score, logging why when it falls back to 0.0.
fn interpret(completion: &ChatCompletion) -> f64 {
    let Some(content) = completion.content.as_deref() else {
        warn!(
            "Model returned null content (finish_reason={:?})",
            completion.finish_reason
        );
        return 0.0;
    };
    let text = content.trim();

    if completion.was_truncated() {
        warn!("Score response was truncated by the token limit. Partial response: '{text}'");
    }
    if text.is_empty() {
        warn!(
            "Model returned an empty score (finish_reason={:?})",
            completion.finish_reason
        );
        return 0.0;
    }

    match parse_score(text) {
        Some(score) => score,
        None => {
            warn!("Could not parse score from model response: '{text}'");
            0.0
        }
    }
}

/// Extracts a score from free-form model output, clamped to [0, 1].
pub fn parse_score(text: &str) -> Option<f64> {
    for pattern in SCORE_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            if let Ok(value) = m.as_str().parse::<f64>() {
                return Some(value.clamp(0.0, 1.0));
            }
        }
    }
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

/// The first `max_chars` characters of `text`, never splitting a code point.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
