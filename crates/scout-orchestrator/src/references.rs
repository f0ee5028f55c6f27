//! Reference (URL) extraction from worker output.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"))
}

/// Extract `http(s)://` URLs from `text`.
///
/// Each match runs to the next whitespace; trailing `)`, `,`, `.` and `;` are
/// stripped. Duplicates are dropped, keeping first-seen order.
pub fn extract_references(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    url_pattern()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches([')', ',', '.', ';']))
        .filter(|url| url.split_once("://").is_some_and(|(_, rest)| !rest.is_empty()))
        .filter(|url| seen.insert(url.to_string()))
        .map(str::to_string)
        .collect()
}
