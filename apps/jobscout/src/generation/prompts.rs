// All LLM prompt constants for scoring and generation.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for the résumé call.
pub const RESUME_WRITER_SYSTEM: &str = "You are an expert resume writer.";

/// System prompt for the cover-letter call.
pub const COVER_LETTER_WRITER_SYSTEM: &str = "You are an expert cover letter writer.";

/// Default résumé instruction; overridden by `RESUME_PROMPT`.
pub const DEFAULT_RESUME_PROMPT: &str = "Create a tailored resume from the master resume \
    focusing on the job posting. Return only the resume text.";

/// Default cover-letter instruction; overridden by `COVER_LETTER_PROMPT`.
pub const DEFAULT_COVER_LETTER_PROMPT: &str = "Write a concise, persuasive cover letter \
    tailored to the job posting and the applicant's master resume. \
    Return only the cover letter text.";

/// User message for scoring. Both inputs are already cut to the scoring budget.
pub fn score_prompt(job_prefix: &str, resume_prefix: &str) -> String {
    format!("Score (0.0-1.0):\n\nJob: {job_prefix}\n\nResume: {resume_prefix}\n\nScore:")
}

/// User message shared by both generation calls.
pub fn generation_prompt(job_text: &str, master_resume: &str, instruction: &str) -> String {
    format!("Job posting:\n{job_text}\n\nMaster resume:\n{master_resume}\n\n{instruction}")
}
