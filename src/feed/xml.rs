//! Generic, attribute-aware XML tree used by the feed and OPML parsers.
//!
//! Element names are kept exactly as written, prefix included (`content:encoded`,
//! `dc:creator`, `rdf:RDF`), so callers look fields up the way they appear in
//! feeds. Children are always stored as a list: a lone `<category>` and five
//! of them are read through the same [`Element::all`] call, so no consumer ever
//! has to tell a single value from a repeated one.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted from untrusted documents.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Syntax(String),

    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("Document has no root element")]
    NoRoot,

    #[error("Unexpected closing tag </{0}>")]
    UnbalancedClose(String),

    #[error("Unclosed element <{0}>")]
    Unclosed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Direct text and CDATA content, concatenated in document order.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Name without namespace prefix (`rdf:RDF` -> `RDF`).
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Every child named `name`, in document order. Zero, one or many
    /// occurrences all come back as a list.
    pub fn all(&self, name: &str) -> Vec<&Element> {
        self.children.iter().filter(|c| c.name == name).collect()
    }

    /// First child named `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child whose name matches any of `names`, trying names in order.
    pub fn first_of(&self, names: &[&str]) -> Option<&Element> {
        names.iter().find_map(|n| self.child(n))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed direct text, `None` when blank.
    pub fn text_value(&self) -> Option<&str> {
        let t = self.text.trim();
        (!t.is_empty()).then_some(t)
    }

    /// Trimmed text of the first child named `name`, `None` when missing or blank.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::text_value)
    }

    /// All text beneath this element, descendants included, in document order.
    ///
    /// Atom `type="xhtml"` content arrives as child elements rather than as
    /// text, so content extraction reads through this.
    pub fn deep_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                out.push(' ');
            }
            child.collect_text(out);
        }
    }
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

/// Parses a document into its root element.
///
/// XXE: quick-xml (0.37) never expands `<!ENTITY>` declarations, so a DOCTYPE
/// cannot pull in files or URLs. Text containing entities outside the five
/// XML builtins is kept verbatim (`&nbsp;` survives as written) instead of
/// failing the document; the HTML reducer decodes the common ones later.
pub fn parse_document(content: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::MaxDepthExceeded(MAX_DEPTH));
                }
                stack.push(start_element(&e, &reader));
            }
            Ok(Event::Empty(e)) => {
                let element = start_element(&e, &reader);
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(e)) => {
                let qname = e.name();
                let name = reader.decoder().decode(qname.as_ref()).map_err(syntax)?;
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::UnbalancedClose(name.into_owned()))?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    match e.unescape() {
                        Ok(text) => current.text.push_str(&text),
                        Err(_) => current.text.push_str(&String::from_utf8_lossy(&e)),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(syntax(e)),
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::NoRoot)
}

fn syntax(e: impl std::fmt::Display) -> XmlError {
    XmlError::Syntax(e.to_string())
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        // Only the first top-level element counts as the root.
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn start_element(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Element {
    let decoder = reader.decoder();
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(err) => {
                tracing::debug!(element = %name, error = %err, "Skipping malformed XML attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.decode_and_unescape_value(decoder) {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.push((key, value));
    }

    Element::new(name, attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_repeated_children_read_alike() {
        let doc = parse_document("<r><a>1</a><b>x</b><b>y</b></r>").unwrap();
        assert_eq!(doc.all("a").len(), 1);
        assert_eq!(doc.all("b").len(), 2);
        assert!(doc.all("c").is_empty());
        assert_eq!(doc.all("b")[1].text, "y");
    }

    #[test]
    fn test_attributes_distinct_from_text() {
        let doc = parse_document(r#"<r><link href="https://x.example" rel="alternate">text</link></r>"#)
            .unwrap();
        let link = doc.child("link").unwrap();
        assert_eq!(link.attr("href"), Some("https://x.example"));
        assert_eq!(link.attr("rel"), Some("alternate"));
        assert_eq!(link.text, "text");
        assert_eq!(link.attr("missing"), None);
    }

    #[test]
    fn test_prefixed_names_preserved() {
        let doc = parse_document(
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><dc:creator>me</dc:creator></rdf:RDF>"#,
        )
        .unwrap();
        assert_eq!(doc.name, "rdf:RDF");
        assert_eq!(doc.local_name(), "RDF");
        assert_eq!(doc.child_text("dc:creator"), Some("me"));
    }

    #[test]
    fn test_closing_tags_rebuild_nesting() {
        let doc = parse_document("<r><a:x><b>1</b></a:x><c/></r>").unwrap();
        assert_eq!(doc.children.len(), 2);
        let x = doc.child("a:x").unwrap();
        assert_eq!(x.child_text("b"), Some("1"));
        assert!(doc.child("c").is_some());
    }

    #[test]
    fn test_cdata_kept_raw() {
        let doc = parse_document("<r><d><![CDATA[<p>Hi &amp; bye</p>]]></d></r>").unwrap();
        assert_eq!(doc.child_text("d"), Some("<p>Hi &amp; bye</p>"));
    }

    #[test]
    fn test_builtin_entities_unescaped() {
        let doc = parse_document("<r><d>&lt;b&gt;bold&lt;/b&gt; &amp; more</d></r>").unwrap();
        assert_eq!(doc.child_text("d"), Some("<b>bold</b> & more"));
    }

    #[test]
    fn test_unknown_entity_kept_verbatim() {
        let doc = parse_document("<r><d>a&nbsp;b</d></r>").unwrap();
        assert_eq!(doc.child_text("d"), Some("a&nbsp;b"));
    }

    #[test]
    fn test_deep_text_walks_descendants() {
        let doc = parse_document("<c><div><p>one</p><p>two</p></div></c>").unwrap();
        assert_eq!(doc.deep_text().split_whitespace().collect::<Vec<_>>(), ["one", "two"]);
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(parse_document("<not valid xml").is_err());
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("").is_err());
        assert!(parse_document("just text").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut doc = String::new();
        for _ in 0..(MAX_DEPTH + 1) {
            doc.push_str("<x>");
        }
        for _ in 0..(MAX_DEPTH + 1) {
            doc.push_str("</x>");
        }
        assert!(matches!(
            parse_document(&doc),
            Err(XmlError::MaxDepthExceeded(MAX_DEPTH))
        ));
    }

    #[test]
    fn test_xxe_entity_not_expanded() {
        let doc = r#"<?xml version="1.0"?>
<!DOCTYPE r [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<r><t>&xxe;</t></r>"#;
        match parse_document(doc) {
            Ok(root) => {
                let text = root.child("t").map(|t| t.text.clone()).unwrap_or_default();
                assert!(!text.contains("root:"), "XXE expansion detected: {text}");
            }
            Err(_) => {}
        }
    }
}
