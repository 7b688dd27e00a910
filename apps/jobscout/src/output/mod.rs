//! Output Writer — one directory per posting, named after its sanitized title.
//!
//! The directory's existence is the authoritative "already generated" check.
//! Documents are written into a temp directory and renamed into place, so a
//! job directory is either complete or absent.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::job::{ApplicationDocument, JobPosting};

pub mod render;

/// Maximum length, in characters, of a job directory name.
pub const MAX_DIR_NAME_CHARS: usize = 100;
/// Directory name used when a title sanitizes to nothing.
pub const PLACEHOLDER_DIR_NAME: &str = "untitled_job";

pub const RESUME_FILE: &str = "resume.md";
pub const COVER_LETTER_FILE: &str = "cover_letter.md";
pub const POSTING_FILE: &str = "posting.json";

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Maps any title onto a non-empty, filesystem-safe, length-bounded name.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    let mut in_run = false;
    for c in replaced.chars() {
        if c.is_whitespace() || c == '_' {
            if !in_run {
                collapsed.push('_');
            }
            in_run = true;
        } else {
            collapsed.push(c);
            in_run = false;
        }
    }

    let trimmed = trim_edges(&collapsed);
    let capped: String = trimmed.chars().take(MAX_DIR_NAME_CHARS).collect();
    let mut name = trim_edges(&capped).to_string();

    if name.is_empty() {
        return PLACEHOLDER_DIR_NAME.to_string();
    }
    if let Some(stem_len) = reserved_stem_len(&name) {
        name.insert(stem_len, '_');
        if name.chars().count() > MAX_DIR_NAME_CHARS {
            let capped: String = name.chars().take(MAX_DIR_NAME_CHARS).collect();
            name = trim_edges(&capped).to_string();
        }
    }
    name
}

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c| c == '_' || c == '.')
}

/// Byte length of the stem when it is a Windows device name (`CON`, `LPT1.txt`, ...).
fn reserved_stem_len(name: &str) -> Option<usize> {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
        .then_some(stem.len())
}

/// Metadata written next to the documents.
#[derive(Debug, Serialize)]
struct PostingRecord<'a> {
    id: &'a str,
    title: &'a str,
    link: &'a str,
    company: &'a str,
    location: &'a str,
    published: &'a str,
    score: f64,
    generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// The directory was already there; nothing was touched.
    AlreadyExists(PathBuf),
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
    convert: bool,
}

impl OutputWriter {
    /// `convert` also writes HTML renderings of both documents.
    pub fn new(root: impl Into<PathBuf>, convert: bool) -> Self {
        Self {
            root: root.into(),
            convert,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location_for(&self, title: &str) -> PathBuf {
        self.root.join(sanitize_title(title))
    }

    pub fn exists(&self, title: &str) -> bool {
        self.location_for(title).exists()
    }

    /// Writes the documents for `job`. Never overwrites an existing directory.
    pub fn write(
        &self,
        job: &JobPosting,
        score: f64,
        documents: &ApplicationDocument,
    ) -> Result<WriteOutcome, AppError> {
        let target = self.location_for(&job.title);
        if target.exists() {
            debug!("{} already exists; not regenerating", target.display());
            return Ok(WriteOutcome::AlreadyExists(target));
        }

        fs::create_dir_all(&self.root)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;

        fs::write(staging.path().join(RESUME_FILE), &documents.resume)?;
        fs::write(staging.path().join(COVER_LETTER_FILE), &documents.cover_letter)?;

        if self.convert {
            let title = if job.title.is_empty() {
                PLACEHOLDER_DIR_NAME
            } else {
                job.title.as_str()
            };
            fs::write(
                staging.path().join(render::html_file_name(RESUME_FILE)),
                render::markdown_to_html_document(&format!("Resume: {title}"), &documents.resume),
            )?;
            fs::write(
                staging.path().join(render::html_file_name(COVER_LETTER_FILE)),
                render::markdown_to_html_document(
                    &format!("Cover letter: {title}"),
                    &documents.cover_letter,
                ),
            )?;
        }

        let record = PostingRecord {
            id: &job.id,
            title: &job.title,
            link: &job.link,
            company: &job.company,
            location: &job.location,
            published: &job.published,
            score,
            generated_at: Utc::now(),
        };
        fs::write(
            staging.path().join(POSTING_FILE),
            serde_json::to_string_pretty(&record)?,
        )?;

        // Re-check right before the rename: renaming over an empty directory would succeed.
        if target.exists() {
            return Ok(WriteOutcome::AlreadyExists(target));
        }
        fs::rename(staging.path(), &target)?;

        info!("Wrote application to {}", target.display());
        Ok(WriteOutcome::Written(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> ApplicationDocument {
        ApplicationDocument {
            resume: "# Jane Doe\n\n- Rust".to_string(),
            cover_letter: "Dear team,".to_string(),
        }
    }

    fn job(title: &str) -> JobPosting {
        JobPosting {
            id: format!("id-{title}"),
            title: title.to_string(),
            link: "https://jobs.example.com/1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_replaces_illegal_and_collapses_runs() {
        assert_eq!(
            sanitize_title("Senior Engineer: Rust/C++ (Remote)"),
            "Senior_Engineer_Rust_C++_(Remote)"
        );
        assert_eq!(sanitize_title("a  \t b__c _ d"), "a_b_c_d");
    }

    #[test]
    fn test_sanitize_trims_dots_and_underscores() {
        assert_eq!(sanitize_title("...hidden job..."), "hidden_job");
        assert_eq!(sanitize_title("__x__"), "x");
    }

    #[test]
    fn test_sanitize_empty_inputs_use_placeholder() {
        for title in ["", "   ", "\t\n", "???", "<>:\"/\\|?*", "._._."] {
            assert_eq!(sanitize_title(title), PLACEHOLDER_DIR_NAME, "title {title:?}");
        }
    }

    #[test]
    fn test_sanitize_caps_length_on_char_boundary() {
        let long = "é".repeat(300);
        let name = sanitize_title(&long);
        assert_eq!(name.chars().count(), MAX_DIR_NAME_CHARS);

        let dotted = format!("{}.{}", "a".repeat(MAX_DIR_NAME_CHARS - 1), "bbbb");
        let name = sanitize_title(&dotted);
        assert!(!name.ends_with('.'));
        assert!(name.chars().count() <= MAX_DIR_NAME_CHARS);
    }

    #[test]
    fn test_sanitize_output_is_always_safe() {
        let long = "x/".repeat(200);
        let reserved_long = format!("CON.{}", "y".repeat(200));
        let titles: [&str; 9] = [
            "",
            "Normal title",
            "\u{0}\u{1f}control",
            "C:\\Windows\\System32",
            "../../etc/passwd",
            "con",
            "LPT1.txt",
            long.as_str(),
            reserved_long.as_str(),
        ];
        for title in titles {
            let name = sanitize_title(title);
            assert!(!name.is_empty());
            assert!(name.chars().count() <= MAX_DIR_NAME_CHARS);
            assert!(!name.chars().any(|c| ILLEGAL_CHARS.contains(&c) || c.is_control()));
            assert!(!name.starts_with('.'));
            assert_eq!(name, sanitize_title(title), "not deterministic for {title:?}");
        }
    }

    #[test]
    fn test_sanitize_reserved_device_names() {
        assert_eq!(sanitize_title("con"), "con_");
        assert_eq!(sanitize_title("NUL"), "NUL_");
        assert_eq!(sanitize_title("LPT1.txt"), "LPT1_.txt");
        assert_eq!(sanitize_title("Console Engineer"), "Console_Engineer");
    }

    #[test]
    fn test_write_creates_documents_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path(), false);

        let outcome = writer.write(&job("Rust Engineer"), 0.82, &docs()).unwrap();
        let path = dir.path().join("Rust_Engineer");
        assert_eq!(outcome, WriteOutcome::Written(path.clone()));
        assert_eq!(
            fs::read_to_string(path.join(RESUME_FILE)).unwrap(),
            "# Jane Doe\n\n- Rust"
        );
        assert_eq!(
            fs::read_to_string(path.join(COVER_LETTER_FILE)).unwrap(),
            "Dear team,"
        );
        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path.join(POSTING_FILE)).unwrap()).unwrap();
        assert_eq!(meta["id"], "id-Rust Engineer");
        assert_eq!(meta["score"], 0.82);
        assert!(!path.join("resume.html").exists());
    }

    #[test]
    fn test_write_with_conversion_adds_html() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path(), true);
        writer.write(&job("Rust Engineer"), 0.9, &docs()).unwrap();

        let html = fs::read_to_string(dir.path().join("Rust_Engineer/resume.html")).unwrap();
        assert!(html.contains("<h1>Jane Doe</h1>"));
        assert!(dir.path().join("Rust_Engineer/cover_letter.html").exists());
    }

    #[test]
    fn test_write_never_overwrites_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path(), false);
        let existing = dir.path().join("Rust_Engineer");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join(RESUME_FILE), "original").unwrap();

        let outcome = writer.write(&job("Rust  Engineer"), 0.9, &docs()).unwrap();
        assert_eq!(outcome, WriteOutcome::AlreadyExists(existing.clone()));
        assert_eq!(fs::read_to_string(existing.join(RESUME_FILE)).unwrap(), "original");
    }

    #[test]
    fn test_write_leaves_no_staging_directories() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path().join("apps"), false);
        writer.write(&job("A"), 0.9, &docs()).unwrap();
        writer.write(&job("A"), 0.9, &docs()).unwrap();

        let names: Vec<String> = fs::read_dir(writer.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["A"]);
    }

    #[test]
    fn test_exists_uses_sanitized_title() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path(), false);
        assert!(!writer.exists("Data / ML"));
        fs::create_dir(dir.path().join("Data_ML")).unwrap();
        assert!(writer.exists("Data / ML"));
        assert!(writer.exists("Data: ML"));
    }
}
