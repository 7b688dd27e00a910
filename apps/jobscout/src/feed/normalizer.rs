//! Entry Normalizer — maps a raw feed item onto a canonical `JobPosting`.

use scraper::{ElementRef, Html, Node};
use sha2::{Digest, Sha256};

use crate::feed::RawPosting;
use crate::models::job::JobPosting;

/// Normalizes a raw feed item. Absent fields become empty strings.
///
/// The body prefers `summary` over `content`, is stripped of markup, and has
/// its whitespace collapsed. The id falls back through link and title to a
/// digest of the body so it is never empty and stable across runs.
pub fn normalize(raw: &RawPosting) -> JobPosting {
    let field = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().to_string();

    let body = raw.summary.as_ref().or(raw.content.as_ref());
    let content = body.map(|b| html_to_text(b)).unwrap_or_default();

    let title = collapse_whitespace(&field(&raw.title));
    let link = field(&raw.link);
    let id = stable_id(&field(&raw.id), &link, &title, &content);

    JobPosting {
        id,
        title,
        link,
        published: field(&raw.published),
        company: field(&raw.author),
        location: field(&raw.location),
        content,
    }
}

/// First non-blank of feed id, link and title; otherwise a content digest.
pub fn stable_id(id: &str, link: &str, title: &str, content: &str) -> String {
    [id, link, title]
        .into_iter()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("sha256:{}", hex::encode(Sha256::digest(content.as_bytes()))))
}

/// Flattens an HTML fragment to plain text.
///
/// Text nodes are joined as-is and block-level elements start a new line.
/// Paragraphs and headings are followed by a blank line. `script`/`style`
/// bodies are dropped and entities are decoded by the parser. Runs of blank
/// lines collapse to a single blank line.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    collect_text(fragment.root_element(), &mut out);

    let mut lines: Vec<String> = Vec::new();
    for line in out.lines() {
        let line = collapse_whitespace(line);
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

#[derive(Clone, Copy, PartialEq)]
enum Layout {
    Inline,
    Block,
    /// Block followed by a blank line.
    Paragraph,
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child.value().name();
                if matches!(name, "script" | "style" | "noscript" | "template") {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let layout = layout_of(name);
                if layout != Layout::Inline {
                    end_line(out);
                }
                collect_text(child, out);
                match layout {
                    Layout::Inline => {}
                    Layout::Block => end_line(out),
                    Layout::Paragraph => {
                        end_line(out);
                        out.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
}

fn end_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn layout_of(name: &str) -> Layout {
    match name {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "pre" | "table" => {
            Layout::Paragraph
        }
        "div" | "section" | "article" | "header" | "footer" | "ul" | "ol" | "li" | "dl" | "dt"
        | "dd" | "tr" | "hr" => Layout::Block,
        _ => Layout::Inline,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawPosting {
        RawPosting {
            id: Some("job-1".to_string()),
            link: Some("https://jobs.example.com/1".to_string()),
            title: Some("  Senior   Rust Engineer ".to_string()),
            summary: Some("<p>Build <b>async</b> services.</p><p>Remote &amp; flexible.</p>".to_string()),
            content: Some("ignored when summary exists".to_string()),
            author: Some("Acme".to_string()),
            published: Some("Mon, 19 Oct 2026".to_string()),
            location: None,
        }
    }

    #[test]
    fn test_normalize_maps_fields() {
        let job = normalize(&raw());
        assert_eq!(job.id, "job-1");
        assert_eq!(job.title, "Senior Rust Engineer");
        assert_eq!(job.company, "Acme");
        assert_eq!(job.published, "Mon, 19 Oct 2026");
        assert_eq!(job.location, "");
        assert_eq!(job.content, "Build async services.\n\nRemote & flexible.");
    }

    #[test]
    fn test_content_used_when_summary_absent() {
        let mut r = raw();
        r.summary = None;
        r.content = Some("Own the <i>pipeline</i>.".to_string());
        assert_eq!(normalize(&r).content, "Own the pipeline.");
    }

    #[test]
    fn test_id_falls_back_to_link_then_title() {
        let mut r = raw();
        r.id = Some("   ".to_string());
        assert_eq!(normalize(&r).id, "https://jobs.example.com/1");

        r.link = None;
        assert_eq!(normalize(&r).id, "Senior Rust Engineer");
    }

    #[test]
    fn test_id_digest_when_nothing_identifies_the_posting() {
        let r = RawPosting {
            summary: Some("Anonymous role".to_string()),
            ..Default::default()
        };
        let first = normalize(&r).id;
        let second = normalize(&r).id;
        assert!(first.starts_with("sha256:"));
        assert_eq!(first, second);
        assert_ne!(first, normalize(&RawPosting::default()).id);
    }

    #[test]
    fn test_fully_empty_posting_still_has_id() {
        let job = normalize(&RawPosting::default());
        assert!(!job.id.is_empty());
        assert_eq!(job.title, "");
        assert_eq!(job.content, "");
    }

    #[test]
    fn test_html_to_text_collapses_blank_lines() {
        let text = html_to_text("<div>One</div>\n\n\n<br/><br/><div>Two</div>");
        assert_eq!(text, "One\n\nTwo");
    }

    #[test]
    fn test_html_to_text_decodes_numeric_and_named_entities() {
        assert_eq!(
            html_to_text("<p>Salary &#8364;90k &mdash; remote&#8217;s fine</p>"),
            "Salary \u{20ac}90k \u{2014} remote\u{2019}s fine"
        );
        assert_eq!(html_to_text("R&amp;D&nbsp;team"), "R&D team");
    }

    #[test]
    fn test_html_to_text_keeps_bare_angle_brackets() {
        assert_eq!(
            html_to_text("Experience: 3 < years of Rust required. Apply now > today"),
            "Experience: 3 < years of Rust required. Apply now > today"
        );
    }

    #[test]
    fn test_html_to_text_drops_style_and_script_bodies() {
        assert_eq!(
            html_to_text("<style>body{color:red}</style><p>Real job text</p><script>track()</script>"),
            "Real job text"
        );
    }

    #[test]
    fn test_html_to_text_lists_and_breaks_become_lines() {
        assert_eq!(
            html_to_text("<ul><li>Rust</li><li>Tokio</li></ul>Apply<br>today"),
            "Rust\nTokio\nApply\ntoday"
        );
    }
}
