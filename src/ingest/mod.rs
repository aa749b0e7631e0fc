// src/ingest/mod.rs
pub mod dates;
pub mod dom;
pub mod fetcher;
pub mod normalize;
pub mod transport;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;

pub use fetcher::SourceFetcher;
pub use transport::{FeedTransport, FixtureTransport, LiveTransport};
pub use types::{CanonicalItem, FeedSource};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_items_parsed_total",
            "Canonical items produced by the normalizer."
        );
        describe_counter!(
            "feed_items_dropped_total",
            "Entries dropped for a missing title, link or date."
        );
        describe_counter!(
            "feed_source_errors_total",
            "Source fetch/parse failures (per source)."
        );
        describe_histogram!("feed_fetch_ms", "Fetch + parse time per source in milliseconds.");
        describe_gauge!("feed_pool_size", "Items in the current preload pool.");
        describe_counter!("feed_load_cycles_total", "Completed aggregation cycles.");
        describe_counter!("feed_rotation_ticks_total", "Committed window rotations.");
        describe_gauge!("feed_rotation_offset", "Current display window offset.");
    });
}

/// Clean feed text for display: strip markup, collapse whitespace, cap at
/// `max_chars`.
///
/// Input is already entity-decoded by [`dom::Document`], so a literal `<` or
/// `&` here is text, not markup. Only `<` followed by a tag name (or `/`
/// and a tag name) starts a tag.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    // 1) Block-level breaks become spaces, remaining tags vanish
    static RE_BREAKS: OnceCell<Regex> = OnceCell::new();
    let re_breaks = RE_BREAKS
        .get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6])\s*>").unwrap());
    let mut out = re_breaks.replace_all(s, " ").to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)</?[A-Za-z][^<>]*>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 2) Collapse whitespace (includes NBSP)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 3) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_markup_and_folds_ws() {
        let s = "  <p>Hello\u{a0}<b>world</b></p><p>again</p>\n\t ";
        assert_eq!(clean_text(s, 100), "Hello world again");
    }

    #[test]
    fn clean_text_keeps_literal_angle_brackets_and_entities() {
        assert_eq!(
            clean_text("Q3 < $5B as margins > 10%", 100),
            "Q3 < $5B as margins > 10%"
        );
        assert_eq!(clean_text("&amp;copy stays", 100), "&amp;copy stays");
        assert_eq!(clean_text("x < <em>y</em>", 100), "x < y");
    }

    #[test]
    fn clean_text_keeps_plain_text_and_unicode_quotes() {
        assert_eq!(clean_text("“Quoted” café", 100), "“Quoted” café");
        assert_eq!(clean_text("", 10), "");
    }

    #[test]
    fn clean_text_caps_on_char_boundary() {
        let s = "é".repeat(50);
        let out = clean_text(&s, 10);
        assert_eq!(out.chars().count(), 10);
    }
}
