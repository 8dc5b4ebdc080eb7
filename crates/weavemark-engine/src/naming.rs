//! The pure, reversible mapping between a remote record's identity and its
//! bookmark name. Records arrive with a query index and a stable integer
//! item id; the bookmark name encodes both.

use std::sync::OnceLock;

use regex::Regex;

static NAME_RE: OnceLock<Regex> = OnceLock::new();

/// Bookmark name for the item `item_id` produced by query `query_index`,
/// e.g. `"Q 0 W 100"`.
pub fn bookmark_name(query_index: usize, item_id: u64) -> String {
    format!("Q {query_index} W {item_id}")
}

/// Inverse of [`bookmark_name`]. `None` for names this engine did not mint.
pub fn parse_bookmark_name(name: &str) -> Option<(usize, u64)> {
    let re = NAME_RE
        .get_or_init(|| Regex::new(r"^Q (\d+) W (\d+)$").expect("invalid bookmark name regex"));
    let captures = re.captures(name)?;
    let query_index = captures[1].parse().ok()?;
    let item_id = captures[2].parse().ok()?;
    Some((query_index, item_id))
}
