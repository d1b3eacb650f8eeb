use thiserror::Error;

use crate::feed::types::{Feed, Item};
use crate::feed::xml::{self, Element};
use crate::util::{normalize_date, strip_control_chars, strip_html};

/// Errors that abort normalization of a whole document.
///
/// Problems inside a single item never surface here; the affected field is
/// left empty instead.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not well-formed XML.
    #[error("Cannot parse feed: {0}")]
    Xml(String),
    /// Well-formed XML, but not an RSS 2.0, Atom or RDF document.
    #[error("Unsupported feed format")]
    UnsupportedFormat,
}

/// Feed document shapes, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `<rss><channel><item>`
    Rss2,
    /// `<feed><entry>`
    Atom,
    /// `<rdf:RDF><channel/><item>` with items as siblings of the channel
    Rdf,
}

/// Parses a raw feed body into a [`Feed`], keeping at most `count` items
/// (`0` keeps all of them) in document order.
pub fn normalize(body: &str, count: usize) -> Result<Feed, ParseError> {
    let root = xml::parse_document(body).map_err(|e| ParseError::Xml(e.to_string()))?;
    let (dialect, channel, items) = detect(&root).ok_or(ParseError::UnsupportedFormat)?;

    if items.is_empty() {
        tracing::warn!(dialect = ?dialect, "No items found in feed");
    }

    let selected = if count == 0 {
        &items[..]
    } else {
        &items[..count.min(items.len())]
    };

    Ok(Feed {
        title: channel.and_then(|c| clean_text(c.child_text("title"))),
        link: channel.and_then(|c| extract_link(c.all("link"))),
        description: channel.and_then(|c| {
            c.child_text("description")
                .or_else(|| c.child_text("subtitle"))
                .map(|d| strip_control_chars(&strip_html(d)).into_owned())
                .filter(|d| !d.is_empty())
        }),
        items: selected.iter().map(|item| extract_item(item)).collect(),
    })
}

/// Picks the channel element and the item list for the document's dialect.
fn detect(root: &Element) -> Option<(Dialect, Option<&Element>, Vec<&Element>)> {
    match root.name.as_str() {
        "rss" => {
            let channel = root.child("channel")?;
            Some((Dialect::Rss2, Some(channel), channel.all("item")))
        }
        "feed" => Some((Dialect::Atom, Some(root), root.all("entry"))),
        _ if root.local_name() == "RDF" => {
            let channel = root.child("channel");
            let mut items = root.all("item");
            if items.is_empty() {
                // Some producers nest items inside the channel.
                items = channel.map(|c| c.all("item")).unwrap_or_default();
            }
            Some((Dialect::Rdf, channel, items))
        }
        _ => None,
    }
}

fn extract_item(item: &Element) -> Item {
    let link = extract_link(item.all("link"));
    let guid = item
        .first_of(&["guid", "id"])
        .and_then(Element::text_value)
        .map(str::to_string)
        .or_else(|| link.clone());

    Item {
        title: clean_text(item.child_text("title")),
        description: extract_content(item),
        link,
        guid,
        pub_date: item
            .first_of(&["pubDate", "published", "updated", "dc:date"])
            .and_then(Element::text_value)
            .map(normalize_date),
        author: extract_author(item),
        category: extract_categories(item),
    }
}

/// Full content beats summaries; the winner is reduced to plain text.
fn extract_content(item: &Element) -> String {
    ["content:encoded", "content", "description", "summary"]
        .iter()
        .filter_map(|name| item.child(name))
        .map(Element::deep_text)
        .find(|text| !text.trim().is_empty())
        .map(|text| strip_control_chars(&strip_html(&text)).into_owned())
        .unwrap_or_default()
}

/// Resolves a `link` field that may be bare text (RSS), a single
/// `<link href>` or a list of them with `rel` attributes (Atom).
///
/// Prefers `rel="alternate"`, then a link with no `rel` (Atom's default is
/// alternate), then the first link carrying any reference.
fn extract_link(links: Vec<&Element>) -> Option<String> {
    let href = |l: &&Element| -> Option<String> {
        l.attr("href")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .or_else(|| l.text_value())
            .map(str::to_string)
    };

    links
        .iter()
        .filter(|l| l.attr("rel") == Some("alternate"))
        .find_map(href)
        .or_else(|| links.iter().filter(|l| l.attr("rel").is_none()).find_map(href))
        .or_else(|| links.iter().find_map(href))
}

fn extract_author(item: &Element) -> Option<String> {
    let atom_name = item
        .child("author")
        .and_then(|a| a.child_text("name"))
        .map(str::to_string);

    atom_name
        .or_else(|| {
            ["dc:creator", "creator", "author"]
                .iter()
                .find_map(|name| item.child(name).and_then(Element::text_value))
                .map(str::to_string)
        })
        .and_then(|a| clean_text(Some(&a)))
}

/// Categories may be bare text (RSS) or carry the value in a `term`
/// attribute (Atom). Empty entries are dropped; no entries means `None`.
fn extract_categories(item: &Element) -> Option<Vec<String>> {
    let categories: Vec<String> = item
        .all("category")
        .into_iter()
        .filter_map(|c| {
            c.attr("term")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .or_else(|| c.text_value())
        })
        .map(str::to_string)
        .collect();

    (!categories.is_empty()).then_some(categories)
}

/// Titles and author names are text already; angle brackets in them are
/// content, so only terminal controls are removed.
fn clean_text(raw: Option<&str>) -> Option<String> {
    let text = strip_control_chars(raw?.trim()).trim().to_string();
    (!text.is_empty()).then_some(text)
}
