//! Application Generator — two model calls per qualifying posting.
//!
//! Flow: résumé call → cover-letter call → `ApplicationDocument`.
//! There is no retry here; a failure in either call fails the whole posting and
//! the caller decides whether that ends the run.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PromptConfig;
use crate::errors::AppError;
use crate::generation::prompts::{
    generation_prompt, COVER_LETTER_WRITER_SYSTEM, RESUME_WRITER_SYSTEM,
};
use crate::llm_client::{ChatBackend, ChatRequest};
use crate::models::job::{ApplicationDocument, JobPosting};

pub struct ApplicationGenerator {
    backend: Arc<dyn ChatBackend>,
    deployment: String,
    prompts: PromptConfig,
    resume_max_tokens: u32,
    cover_letter_max_tokens: u32,
}

/// One of the two documents, with its own system prompt and output budget.
struct DocumentSpec<'a> {
    kind: &'static str,
    system: &'static str,
    instruction: &'a str,
    max_tokens: u32,
}

impl ApplicationGenerator {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        deployment: impl Into<String>,
        prompts: PromptConfig,
        resume_max_tokens: u32,
        cover_letter_max_tokens: u32,
    ) -> Self {
        Self {
            backend,
            deployment: deployment.into(),
            prompts,
            resume_max_tokens,
            cover_letter_max_tokens,
        }
    }

    /// Generates a tailored résumé and cover letter for `job`.
    pub async fn generate(
        &self,
        job: &JobPosting,
        master_resume: &str,
    ) -> Result<ApplicationDocument, AppError> {
        let job_text = job.generation_text();

        let resume = self
            .generate_document(
                job,
                job_text,
                master_resume,
                DocumentSpec {
                    kind: "resume",
                    system: RESUME_WRITER_SYSTEM,
                    instruction: &self.prompts.resume,
                    max_tokens: self.resume_max_tokens,
                },
            )
            .await?;

        let cover_letter = self
            .generate_document(
                job,
                job_text,
                master_resume,
                DocumentSpec {
                    kind: "cover letter",
                    system: COVER_LETTER_WRITER_SYSTEM,
                    instruction: &self.prompts.cover_letter,
                    max_tokens: self.cover_letter_max_tokens,
                },
            )
            .await?;

        info!(
            "Generated application for '{}' (resume {} chars, cover letter {} chars)",
            job.title,
            resume.chars().count(),
            cover_letter.chars().count()
        );

        Ok(ApplicationDocument {
            resume,
            cover_letter,
        })
    }

    async fn generate_document(
        &self,
        job: &JobPosting,
        job_text: &str,
        master_resume: &str,
        spec: DocumentSpec<'_>,
    ) -> Result<String, AppError> {
        let request = ChatRequest {
            deployment: self.deployment.clone(),
            system: spec.system.to_string(),
            user: generation_prompt(job_text, master_resume, spec.instruction),
            max_completion_tokens: spec.max_tokens,
        };

        let completion = self.backend.complete(&request).await?;
        let text = completion.content.as_deref().map(str::trim).unwrap_or_default();

        if text.is_empty() {
            return Err(AppError::Generation(format!(
                "model returned no {} text for '{}' (finish_reason={:?})",
                spec.kind, job.title, completion.finish_reason
            )));
        }
        if completion.was_truncated() {
            warn!(
                "The {} for '{}' hit the output token limit and may be cut short",
                spec.kind, job.title
            );
        }

        Ok(text.to_string())
    }
}
