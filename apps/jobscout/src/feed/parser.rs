//! Streaming RSS 2.0 / Atom parser built on quick-xml.
//!
//! Only the fields the normalizer needs are extracted. Namespaced elements are
//! matched by local name, so `content:encoded`, `dc:creator` and `dc:date` work
//! without namespace resolution.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::AppError;
use crate::feed::RawPosting;

/// Parses a feed document into postings, in document order.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<RawPosting>, AppError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    // Stack depth at which the current <item>/<entry> was opened.
    let mut item_depth: Option<usize> = None;
    let mut current = RawPosting::default();
    let mut postings = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if stack.is_empty() && !is_feed_root(&name) {
                    return Err(AppError::Feed(format!(
                        "expected an RSS or Atom document, found <{name}>"
                    )));
                }
                match item_depth {
                    None if is_item(&name) => {
                        item_depth = Some(stack.len());
                        current = RawPosting::default();
                    }
                    Some(depth) if stack.len() == depth + 1 && name == "link" => {
                        apply_link_href(&e, &mut current);
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                if let Some(depth) = item_depth {
                    if stack.len() == depth + 1 && local_name(&e) == "link" {
                        apply_link_href(&e, &mut current);
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if item_depth == Some(stack.len()) {
                    postings.push(std::mem::take(&mut current));
                    item_depth = None;
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(depth) = item_depth {
                    let text = match t.unescape() {
                        Ok(text) => text.into_owned(),
                        // Undeclared HTML entities (&nbsp; and friends) are common in feeds.
                        Err(_) => String::from_utf8_lossy(&t).into_owned(),
                    };
                    assign_text(&stack, depth, &mut current, &text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(depth) = item_depth {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    assign_text(&stack, depth, &mut current, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::Feed(format!(
                    "invalid feed XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(postings)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn is_feed_root(name: &str) -> bool {
    matches!(name, "rss" | "feed" | "RDF")
}

fn is_item(name: &str) -> bool {
    matches!(name, "item" | "entry")
}

/// Atom links carry the URL in `href`; the first link wins unless a later one
/// is explicitly `rel="alternate"`.
fn apply_link_href(e: &BytesStart<'_>, posting: &mut RawPosting) {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    if let Some(href) = href {
        if posting.link.is_none() || rel.as_deref() == Some("alternate") {
            posting.link = Some(href);
        }
    }
}

fn assign_text(stack: &[String], item_depth: usize, posting: &mut RawPosting, text: &str) {
    let Some(field) = stack.get(item_depth + 1) else {
        return;
    };
    let innermost = stack.last().map(String::as_str).unwrap_or_default();

    let slot = match field.as_str() {
        "guid" | "id" => &mut posting.id,
        "link" => {
            // A text link is canonical; it replaces any href seen on an atom:link.
            posting.link = Some(text.to_string());
            return;
        }
        "title" => &mut posting.title,
        "description" | "summary" => &mut posting.summary,
        "encoded" | "content" => &mut posting.content,
        "author" | "creator" => {
            // Atom <author> wraps <name>, <email> and <uri>; only the name is wanted.
            if !matches!(innermost, "author" | "creator" | "name") {
                return;
            }
            &mut posting.author
        }
        "pubDate" | "published" | "date" => &mut posting.published,
        "updated" => {
            if posting.published.is_some() {
                return;
            }
            &mut posting.published
        }
        "location" => &mut posting.location,
        _ => return,
    };

    let value = slot.get_or_insert_with(String::new);
    if !value.is_empty() {
        value.push(' ');
    }
    value.push_str(text);
}
