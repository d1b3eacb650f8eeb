use serde::{Deserialize, Serialize};

/// A normalized feed, independent of the source dialect (RSS 2.0, Atom, RDF).
///
/// Built fresh for each request and handed to the caller; nothing here is
/// cached or persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Items in original document order, already sliced to the requested count.
    pub items: Vec<Item>,
}

/// A single feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Plain text: markup stripped, whitespace collapsed. Empty when the
    /// entry carried no content at all.
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Source `guid`/`id`, falling back to `link`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Canonical UTC timestamp (`2024-01-01T00:00:00.000Z`), or the raw source
    /// string when it could not be parsed as a date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Never `Some(vec![])`; an entry without categories omits the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
}
