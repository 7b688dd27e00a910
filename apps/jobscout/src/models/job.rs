use serde::{Deserialize, Serialize};

/// Canonical job record produced by the normalizer.
///
/// `id` is never empty: it falls back through link, title and a content digest
/// so the same posting yields the same id on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    pub title: String,
    pub link: String,
    /// Opaque feed value; never parsed as a date.
    pub published: String,
    pub company: String,
    pub location: String,
    /// Plain-text body used for scoring and generation.
    pub content: String,
}

impl JobPosting {
    /// Text handed to the generator: the body, or the title when the feed had none.
    pub fn generation_text(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.title
        } else {
            &self.content
        }
    }
}

/// Tailored documents for one posting. Both fields are markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub resume: String,
    pub cover_letter: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_text_prefers_content() {
        let job = JobPosting {
            title: "Rust Engineer".to_string(),
            content: "Build parsers.".to_string(),
            ..Default::default()
        };
        assert_eq!(job.generation_text(), "Build parsers.");
    }

    #[test]
    fn test_generation_text_falls_back_to_title() {
        let job = JobPosting {
            title: "Rust Engineer".to_string(),
            content: "  \n ".to_string(),
            ..Default::default()
        };
        assert_eq!(job.generation_text(), "Rust Engineer");
    }
}
