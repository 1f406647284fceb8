//! Anchor extraction from bulletin markup.
//!
//! The seam is intentionally narrow — `extract_links` is the only thing
//! attachment resolution knows about the markup — so the scanner can be
//! swapped without touching the resolution rules.

use regex::Regex;

use crate::formatting::strip_tags;

/// One anchor: raw `href` plus its flattened display text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub text: String,
}

pub fn extract_links(markup: &str) -> Vec<Link> {
    let anchor =
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#)
            .expect("valid regex");

    anchor
        .captures_iter(markup)
        .map(|caps| Link {
            href: caps[1].to_string(),
            text: strip_tags(&caps[2]),
        })
        .collect()
}
