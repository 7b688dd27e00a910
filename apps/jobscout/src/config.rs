use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::generation::prompts::{DEFAULT_COVER_LETTER_PROMPT, DEFAULT_RESUME_PROMPT};

const DEFAULT_API_VERSION: &str = "2023-05-15";

/// Run-wide configuration loaded from environment variables (and `.env` if present).
///
/// Model credentials live in a separate `LlmConfig` because a dry run needs none of them.
#[derive(Debug, Clone)]
pub struct Config {
    pub prompts: PromptConfig,
    pub budgets: Budgets,
    pub notify_webhook_url: Option<String>,
    pub rust_log: String,
}

/// Instruction text appended to each generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptConfig {
    pub resume: String,
    pub cover_letter: String,
}

/// Character and token budgets for model calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Budgets {
    /// Prefix length, in characters, of the job text and of the résumé sent for scoring.
    pub score_input_chars: usize,
    pub score_max_tokens: u32,
    pub resume_max_tokens: u32,
    pub cover_letter_max_tokens: u32,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            score_input_chars: 800,
            score_max_tokens: 200,
            resume_max_tokens: 2000,
            cover_letter_max_tokens: 1500,
        }
    }
}

/// Azure OpenAI connection settings.
#[derive(Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub scoring_deployment: String,
    pub generation_deployment: String,
    pub timeout_secs: u64,
    /// Retries after the first attempt, on 429 and 5xx.
    pub max_retries: u32,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("scoring_deployment", &self.scoring_deployment)
            .field("generation_deployment", &self.generation_deployment)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Budgets::default();
        Ok(Config {
            prompts: PromptConfig {
                resume: non_empty(lookup("RESUME_PROMPT"))
                    .unwrap_or_else(|| DEFAULT_RESUME_PROMPT.to_string()),
                cover_letter: non_empty(lookup("COVER_LETTER_PROMPT"))
                    .unwrap_or_else(|| DEFAULT_COVER_LETTER_PROMPT.to_string()),
            },
            budgets: Budgets {
                score_input_chars: parse_or(
                    lookup,
                    "SCORE_INPUT_CHARS",
                    defaults.score_input_chars,
                )?,
                score_max_tokens: parse_or(lookup, "SCORE_MAX_TOKENS", defaults.score_max_tokens)?,
                resume_max_tokens: parse_or(
                    lookup,
                    "RESUME_MAX_TOKENS",
                    defaults.resume_max_tokens,
                )?,
                cover_letter_max_tokens: parse_or(
                    lookup,
                    "COVER_LETTER_MAX_TOKENS",
                    defaults.cover_letter_max_tokens,
                )?,
            },
            notify_webhook_url: non_empty(lookup("NOTIFY_WEBHOOK_URL")),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let chat_deployment = require(lookup, "AZURE_OPENAI_CHAT_DEPLOYMENT")?;
        Ok(LlmConfig {
            endpoint: require(lookup, "AZURE_OPENAI_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            api_key: require(lookup, "AZURE_OPENAI_API_KEY")?,
            api_version: non_empty(lookup("AZURE_OPENAI_API_VERSION"))
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            scoring_deployment: non_empty(lookup("AZURE_OPENAI_SCORING_DEPLOYMENT"))
                .unwrap_or_else(|| chat_deployment.clone()),
            generation_deployment: non_empty(lookup("AZURE_OPENAI_GENERATION_DEPLOYMENT"))
                .unwrap_or_else(|| chat_deployment.clone()),
            timeout_secs: parse_or(lookup, "LLM_TIMEOUT_SECS", 120)?,
            max_retries: parse_or(lookup, "LLM_MAX_RETRIES", 3)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn require(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    non_empty(lookup(key))
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(&lookup_from(&[])).unwrap();
        assert_eq!(config.budgets, Budgets::default());
        assert_eq!(config.prompts.resume, DEFAULT_RESUME_PROMPT);
        assert_eq!(config.prompts.cover_letter, DEFAULT_COVER_LETTER_PROMPT);
        assert!(config.notify_webhook_url.is_none());
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_prompt_and_budget_overrides() {
        let config = Config::from_lookup(&lookup_from(&[
            ("RESUME_PROMPT", "One page only."),
            ("SCORE_INPUT_CHARS", "1200"),
            ("COVER_LETTER_MAX_TOKENS", "900"),
            ("NOTIFY_WEBHOOK_URL", "https://hooks.example.com/x"),
        ]))
        .unwrap();
        assert_eq!(config.prompts.resume, "One page only.");
        assert_eq!(config.budgets.score_input_chars, 1200);
        assert_eq!(config.budgets.cover_letter_max_tokens, 900);
        assert_eq!(
            config.notify_webhook_url.as_deref(),
            Some("https://hooks.example.com/x")
        );
    }

    #[test]
    fn test_blank_prompt_override_falls_back_to_default() {
        let config = Config::from_lookup(&lookup_from(&[("COVER_LETTER_PROMPT", "   ")])).unwrap();
        assert_eq!(config.prompts.cover_letter, DEFAULT_COVER_LETTER_PROMPT);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = Config::from_lookup(&lookup_from(&[("SCORE_MAX_TOKENS", "lots")])).unwrap_err();
        assert!(err.to_string().contains("SCORE_MAX_TOKENS"));
    }

    #[test]
    fn test_llm_config_requires_credentials() {
        let err = LlmConfig::from_lookup(&lookup_from(&[(
            "AZURE_OPENAI_CHAT_DEPLOYMENT",
            "gpt-4o",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("AZURE_OPENAI_ENDPOINT"));
    }

    #[test]
    fn test_llm_config_deployments_fall_back_to_chat_deployment() {
        let config = LlmConfig::from_lookup(&lookup_from(&[
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com/"),
            ("AZURE_OPENAI_API_KEY", "k"),
            ("AZURE_OPENAI_CHAT_DEPLOYMENT", "gpt-4o"),
            ("AZURE_OPENAI_SCORING_DEPLOYMENT", "gpt-4o-mini"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "https://res.openai.azure.com");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.scoring_deployment, "gpt-4o-mini");
        assert_eq!(config.generation_deployment, "gpt-4o");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_llm_config_debug_redacts_key() {
        let config = LlmConfig::from_lookup(&lookup_from(&[
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "super-secret"),
            ("AZURE_OPENAI_CHAT_DEPLOYMENT", "gpt-4o"),
        ]))
        .unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
