// src/ingest/dom.rs
//! Minimal tag/attribute-queryable tree over a raw feed document.
//!
//! Lookups work on qualified names as written in the document
//! (`media:content`, `dc:date`), mirroring DOM `getElementsByTagName`.
//! Text and attribute values are entity-decoded leniently: HTML entities
//! that are not legal XML (`&nbsp;`) are accepted instead of failing the feed.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::FeedError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attrs = start
            .attributes()
            .with_checks(false)
            .flatten()
            .map(|a| {
                let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                let raw = String::from_utf8_lossy(&a.value);
                (key, html_escape::decode_html_entities(&raw).into_owned())
            })
            .collect();
        Self {
            name,
            attrs,
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by name; empty values count as absent.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Direct text content (trimmed), excluding children.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First descendant with the given name, depth-first in document order.
    pub fn find_first(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(hit) = child.find_first(name) {
                return Some(hit);
            }
        }
        None
    }

    /// All descendants with the given name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect(name, &mut out);
        out
    }

    fn collect<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect(name, out);
        }
    }

    /// Text of the first descendant named `name`, if non-empty.
    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.find_first(name)
            .map(Element::text)
            .filter(|t| !t.is_empty())
    }
}

/// Parsed feed document. The root is synthetic and holds the top-level elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn parse(xml: &str) -> Result<Self, FeedError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = vec![Element::default()];

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Element::open(&start)),
                Ok(Event::Empty(start)) => {
                    let el = Element::open(&start);
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(el);
                    }
                }
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return Err(FeedError::Xml("unbalanced closing tag".to_string()));
                    }
                    if let Some(done) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(done);
                        }
                    }
                }
                Ok(Event::Text(t)) => {
                    let raw = String::from_utf8_lossy(&t);
                    if let Some(cur) = stack.last_mut() {
                        cur.text.push_str(&html_escape::decode_html_entities(&raw));
                    }
                }
                // CDATA usually wraps HTML, whose entities are decoded here
                // like any other text. Nothing downstream decodes again.
                Ok(Event::CData(c)) => {
                    let raw = String::from_utf8_lossy(&c);
                    if let Some(cur) = stack.last_mut() {
                        cur.text.push_str(&html_escape::decode_html_entities(&raw));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(FeedError::Xml(e.to_string())),
            }
        }

        // Truncated documents: fold whatever is still open into its parent.
        while stack.len() > 1 {
            if let Some(done) = stack.pop() {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(done);
                }
            }
        }

        let root = stack.pop().unwrap_or_default();
        if root.children.is_empty() {
            return Err(FeedError::Xml("document has no elements".to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Entry nodes: `<item>` for RSS, `<entry>` for Atom.
    pub fn entries(&self) -> Vec<&Element> {
        let items = self.root.find_all("item");
        if !items.is_empty() {
            return items;
        }
        self.root.find_all("entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example</title>
    <item>
      <title><![CDATA[First &amp; foremost]]></title>
      <link>https://example.test/1</link>
      <media:content url="https://cdn.test/1.jpg" medium="image"/>
    </item>
    <item>
      <title>Second&nbsp;item</title>
      <enclosure url="https://cdn.test/2.png" type="image/png" length="1"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn finds_items_and_qualified_names() {
        let doc = Document::parse(RSS).expect("parse rss");
        let entries = doc.entries();
        assert_eq!(entries.len(), 2);

        let media = entries[0].find_first("media:content").expect("media node");
        assert_eq!(media.attr("url"), Some("https://cdn.test/1.jpg"));
        assert!(entries[0].find_first("content").is_none());

        let enc = entries[1].find_first("enclosure").expect("enclosure");
        assert_eq!(enc.attr("type"), Some("image/png"));
    }

    #[test]
    fn cdata_and_html_entities_are_decoded_once() {
        let doc = Document::parse(RSS).expect("parse rss");
        let entries = doc.entries();
        assert_eq!(entries[0].text_of("title"), Some("First & foremost"));
        assert_eq!(entries[1].text_of("title"), Some("Second\u{a0}item"));

        let doc = Document::parse(
            "<rss><channel><item><title>Q3 &lt; $5B &amp;amp;copy</title></item></channel></rss>",
        )
        .expect("parse escaped");
        assert_eq!(doc.entries()[0].text_of("title"), Some("Q3 < $5B &amp;copy"));
    }

    #[test]
    fn atom_entries_and_link_attributes() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <title>Atom</title>
            <entry>
              <title>A</title>
              <link rel="alternate" href="https://a.test/post"/>
              <link rel="enclosure" type="image/jpeg" href="https://a.test/pic.jpg"/>
              <id>urn:uuid:1</id>
            </entry>
        </feed>"#;
        let doc = Document::parse(xml).expect("parse atom");
        let entries = doc.entries();
        assert_eq!(entries.len(), 1);
        let links = entries[0].find_all("link");
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].attr("rel"), Some("enclosure"));
        assert_eq!(entries[0].text_of("id"), Some("urn:uuid:1"));
    }

    #[test]
    fn empty_attribute_counts_as_absent() {
        let doc = Document::parse(r#"<rss><item><link href=""/></item></rss>"#).expect("parse");
        let link = doc.entries()[0].find_first("link").expect("link");
        assert_eq!(link.attr("href"), None);
    }

    #[test]
    fn mismatched_tags_and_garbage_are_errors() {
        assert!(Document::parse("<rss><item></channel></rss>").is_err());
        assert!(Document::parse("not xml at all").is_err());
        assert!(Document::parse("").is_err());
    }
}
