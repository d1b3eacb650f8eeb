use serde::Serialize;
use thiserror::Error;

use crate::feed::xml::{self, Element, XmlError};

/// SEC-003: Maximum allowed nesting depth for OPML outline elements.
/// Prevents stack overflow attacks from maliciously crafted deeply nested OPMLs.
pub const MAX_OPML_DEPTH: usize = 50;

const UNTITLED: &str = "Untitled";

/// Errors that can occur during OPML parsing.
#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("Invalid OPML format: missing <opml> root element")]
    MissingRoot,

    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),
}

impl From<XmlError> for OpmlError {
    fn from(e: XmlError) -> Self {
        match e {
            XmlError::NoRoot => OpmlError::MissingRoot,
            other => OpmlError::XmlParse(other.to_string()),
        }
    }
}

/// A feed subscription extracted from an OPML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpmlFeed {
    /// Sourced from the `title` attribute, falling back to `text`, then to
    /// `"Untitled"`.
    pub title: String,
    pub xml_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    /// Title of the nearest enclosing folder outline that has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpmlDocument {
    /// `<head><title>`, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub feeds: Vec<OpmlFeed>,
}

/// Parses OPML content and extracts feed subscriptions in document order.
///
/// Any `<outline>` carrying a non-empty `xmlUrl` is a feed. Outlines with
/// children are folders: their title (or text) becomes the category of
/// everything nested inside, and an untitled folder passes its parent's
/// category through. An outline can be both a feed and a folder.
///
/// # Errors
///
/// - [`OpmlError::MissingRoot`] - document root is not `<opml>`
/// - [`OpmlError::MaxDepthExceeded`] - outlines nested deeper than [`MAX_OPML_DEPTH`]
/// - [`OpmlError::XmlParse`] - content is not well-formed XML
///
/// # Security
///
/// XXE is mitigated at the XML layer: quick-xml (0.37) never parses
/// `<!ENTITY>` declarations, so `&xxe;` survives as literal text.
pub fn parse_opml(content: &str) -> Result<OpmlDocument, OpmlError> {
    let root = xml::parse_document(content)?;
    if root.name != "opml" {
        return Err(OpmlError::MissingRoot);
    }

    let title = root
        .child("head")
        .and_then(|head| head.child_text("title"))
        .map(str::to_string);

    let mut feeds = Vec::new();
    if let Some(body) = root.child("body") {
        collect_outlines(&body.all("outline"), None, 1, &mut feeds)?;
    }

    tracing::debug!(feeds = feeds.len(), "Parsed OPML");
    Ok(OpmlDocument { title, feeds })
}

fn collect_outlines(
    outlines: &[&Element],
    category: Option<&str>,
    depth: usize,
    feeds: &mut Vec<OpmlFeed>,
) -> Result<(), OpmlError> {
    // SEC-003: Reject excessively nested OPMLs
    if depth > MAX_OPML_DEPTH {
        return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
    }

    for outline in outlines {
        let label = non_empty_attr(outline, "title").or_else(|| non_empty_attr(outline, "text"));

        if let Some(xml_url) = non_empty_attr(outline, "xmlUrl") {
            feeds.push(OpmlFeed {
                title: label.unwrap_or(UNTITLED).to_string(),
                xml_url: xml_url.to_string(),
                html_url: non_empty_attr(outline, "htmlUrl").map(str::to_string),
                category: category.map(str::to_string),
            });
        }

        let nested = outline.all("outline");
        if !nested.is_empty() {
            collect_outlines(&nested, label.or(category), depth + 1, feeds)?;
        }
    }

    Ok(())
}

fn non_empty_attr<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
