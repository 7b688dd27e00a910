// Scoring and generation. All model calls go through llm_client::ChatBackend.

pub mod generator;
pub mod prompts;
pub mod relevance;
