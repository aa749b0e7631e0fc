// src/ingest/normalize.rs
//! Normalizer: one parsed feed document -> canonical items.
//!
//! Pure mapping. RSS `<item>` and Atom `<entry>` nodes go through the same
//! tag lookups; entries that end up without a title, a link or a parseable
//! date are rejected rather than defaulted.

use url::Url;

use crate::error::FeedError;
use crate::ingest::clean_text;
use crate::ingest::dates::parse_published;
use crate::ingest::dom::{Document, Element};
use crate::ingest::types::CanonicalItem;

pub const TITLE_MAX_CHARS: usize = 300;
pub const DESCRIPTION_MAX_CHARS: usize = 1500;

/// Date tags in lookup order. `published` and `dc:date` cover feeds that
/// omit both `pubDate` and `updated`.
const DATE_TAGS: [&str; 4] = ["pubDate", "updated", "published", "dc:date"];

/// Result of normalizing one document.
#[derive(Debug, Default)]
pub struct Normalized {
    pub items: Vec<CanonicalItem>,
    /// Why each dropped entry was dropped.
    pub rejected: Vec<FeedError>,
}

/// Map every entry of `doc` into a canonical item tagged with `source_name`,
/// keeping at most `max_items` valid items.
pub fn normalize_document(doc: &Document, source_name: &str, max_items: usize) -> Normalized {
    let mut out = Normalized::default();
    for entry in doc.entries() {
        if out.items.len() >= max_items {
            break;
        }
        match map_entry(entry, source_name) {
            Ok(item) => out.items.push(item),
            Err(e) => out.rejected.push(e),
        }
    }
    out
}

pub fn map_entry(entry: &Element, source_name: &str) -> Result<CanonicalItem, FeedError> {
    let title = entry
        .text_of("title")
        .map(|t| clean_text(t, TITLE_MAX_CHARS))
        .filter(|t| !t.is_empty())
        .ok_or(FeedError::ItemValidation { field: "title" })?;

    let link = entry_link(entry).ok_or(FeedError::ItemValidation { field: "link" })?;

    let raw_date = DATE_TAGS
        .iter()
        .find_map(|tag| entry.text_of(tag))
        .ok_or(FeedError::ItemValidation {
            field: "publishedAt",
        })?;
    let published_at = parse_published(raw_date)?;

    let description = entry
        .text_of("description")
        .or_else(|| entry.text_of("summary"))
        .map(|d| clean_text(d, DESCRIPTION_MAX_CHARS))
        .filter(|d| !d.is_empty());

    let media_url = media_candidate(entry).and_then(|m| resolve_media(m, &link));

    Ok(CanonicalItem {
        title,
        link,
        description,
        media_url,
        source_name: source_name.to_string(),
        published_at,
    })
}

/// `href` of a page `<link>`, then link text, then the `href` of any other
/// `<link>`, then `<guid>`, then `<id>`. Enclosure and image links only
/// serve as the item link when nothing else is available.
fn entry_link(entry: &Element) -> Option<String> {
    let links = entry.find_all("link");
    links
        .iter()
        .filter(|l| !is_media_link(l))
        .find_map(|l| l.attr("href"))
        .or_else(|| links.iter().map(|l| l.text()).find(|t| !t.is_empty()))
        .or_else(|| links.iter().find_map(|l| l.attr("href")))
        .or_else(|| entry.text_of("guid"))
        .or_else(|| entry.text_of("id"))
        .map(str::to_string)
}

fn is_media_link(link: &Element) -> bool {
    link.attr("rel") == Some("enclosure") || link.attr("type").is_some_and(|t| t.starts_with("image"))
}

/// Media lookup in priority order:
/// enclosure `url`, then `media:content`/`content` `url`|`src`, then a
/// `<link>` that is an enclosure or points at an image.
fn media_candidate(entry: &Element) -> Option<&str> {
    entry
        .find_all("enclosure")
        .into_iter()
        .find_map(|e| e.attr("url"))
        .or_else(|| {
            ["media:content", "content"]
                .iter()
                .flat_map(|name| entry.find_all(name))
                .find_map(|e| e.attr("url").or_else(|| e.attr("src")))
        })
        .or_else(|| {
            entry
                .find_all("link")
                .into_iter()
                .filter(|l| is_media_link(l))
                .find_map(|l| l.attr("href"))
        })
}

/// Absolute URLs pass through untouched; relative ones are joined onto the
/// item link. Anything unresolvable is treated as no media.
fn resolve_media(raw: &str, link: &str) -> Option<String> {
    match Url::parse(raw) {
        Ok(_) => Some(raw.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(link)
            .ok()?
            .join(raw)
            .ok()
            .map(String::from),
        Err(_) => None,
    }
}
