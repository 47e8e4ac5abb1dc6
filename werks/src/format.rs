use std::cmp::Ordering;
use std::fmt::Write;

use crate::parse::{WerkParseResult, WERK_V2_MARKER};

/// Table rows come first in this order, all other keys follow alphabetically
const CANONICAL_KEY_ORDER: [&str; 7] = [
    "date",
    "version",
    "class",
    "edition",
    "component",
    "level",
    "compatible",
];

/// Keys that live outside of the metadata table
const NON_TABLE_KEYS: [&str; 2] = ["id", "title"];

fn key_rank(key: &str) -> usize {
    CANONICAL_KEY_ORDER
        .iter()
        .position(|k| *k == key)
        .unwrap_or(CANONICAL_KEY_ORDER.len())
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    key_rank(a).cmp(&key_rank(b)).then_with(|| a.cmp(b))
}

/// Render a parsed werk as markdown.
pub fn format_as_markdown_werk(werk: &WerkParseResult) -> String {
    let mut keys: Vec<&str> = werk
        .metadata
        .keys()
        .map(String::as_str)
        .filter(|key| !NON_TABLE_KEYS.contains(key))
        .collect();
    keys.sort_by(|a, b| compare_keys(a, b));

    let mut out = String::new();
    out.push_str(WERK_V2_MARKER);
    out.push('\n');
    let _ = writeln!(out, "# {}", werk.title());
    out.push('\n');
    out.push_str("key | value\n--- | ---\n");
    for key in keys {
        let _ = writeln!(out, "{} | {}", key, werk.metadata[key]);
    }
    out.push('\n');
    out.push_str(&werk.description);
    out.push('\n');
    out
}
