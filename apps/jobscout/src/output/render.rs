//! Markdown → standalone HTML, for the `--convert` output option.

use pulldown_cmark::{html, CowStr, Event, Options, Parser};
use pulldown_cmark_escape::escape_html;

/// `resume.md` → `resume.html`.
pub fn html_file_name(markdown_file: &str) -> String {
    let stem = markdown_file.strip_suffix(".md").unwrap_or(markdown_file);
    format!("{stem}.html")
}

/// Renders markdown to an HTML fragment. Raw HTML in the source is escaped,
/// since the source is model output.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(CowStr::from(raw.into_string())),
        other => other,
    });

    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

/// Wraps the rendered fragment in a printable HTML document.
pub fn markdown_to_html_document(title: &str, markdown: &str) -> String {
    let mut escaped_title = String::with_capacity(title.len());
    // Writing into a String never fails.
    let _ = escape_html(&mut escaped_title, title);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escaped_title,
        STYLE,
        markdown_to_html(markdown)
    )
}

const STYLE: &str = "body{font-family:Georgia,serif;max-width:46em;margin:2em auto;\
    line-height:1.45;color:#222}h1,h2,h3{font-family:Helvetica,Arial,sans-serif}\
    @media print{body{margin:0}}";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_file_name() {
        assert_eq!(html_file_name("resume.md"), "resume.html");
        assert_eq!(html_file_name("notes"), "notes.html");
    }

    #[test]
    fn test_markdown_renders_headings_and_lists() {
        let html = markdown_to_html("# Jane Doe\n\n- Rust\n- Go\n");
        assert!(html.contains("<h1>Jane Doe</h1>"));
        assert!(html.contains("<li>Rust</li>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = markdown_to_html("Hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_document_escapes_title() {
        let doc = markdown_to_html_document("R&D <Lead> \"Remote\"", "text");
        assert!(doc.contains("<title>R&amp;D &lt;Lead&gt; &quot;Remote&quot;</title>"));
        assert!(doc.starts_with("<!DOCTYPE html>"));
    }
}
