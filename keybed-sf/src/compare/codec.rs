//! Shareable compare route encoding
//!
//! The compared set maps to a single path segment: ids joined with `+`.
//! The empty set has no segment and maps to the base route `/compare`.
//! Identifiers are restricted to URL-unreserved characters other than the
//! delimiter, so a segment never needs percent-encoding.

use super::CompareEntry;

/// Delimiter between identifiers in the route segment
pub const ROUTE_DELIMITER: char = '+';

/// Route for the empty comparison set
pub const COMPARE_BASE_ROUTE: &str = "/compare";

/// Whether `id` can be carried in a route segment unchanged
pub fn is_valid_item_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

/// Join ids into a segment; `None` for an empty sequence
pub fn encode_segment<'a, I>(ids: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut segment = String::new();
    for id in ids {
        if !segment.is_empty() {
            segment.push(ROUTE_DELIMITER);
        }
        segment.push_str(id);
    }
    (!segment.is_empty()).then_some(segment)
}

/// Split a segment into ids, discarding empty tokens
pub fn decode_segment(segment: &str) -> Vec<String> {
    segment
        .split(ROUTE_DELIMITER)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical route for a compared set
pub fn route_for(entries: &[CompareEntry]) -> String {
    route_for_ids(entries.iter().map(|e| e.item_id.as_str()))
}

/// Canonical route for an ordered id sequence
pub fn route_for_ids<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    match encode_segment(ids) {
        Some(segment) => format!("{}/{}", COMPARE_BASE_ROUTE, segment),
        None => COMPARE_BASE_ROUTE.to_string(),
    }
}

/// Parse a compare route path
///
/// Returns `None` when `path` is not a compare route, `Some(vec![])` for the
/// base route and `Some(ids)` for a populated one. A query string or trailing
/// slash is ignored.
pub fn parse_route(path: &str) -> Option<Vec<String>> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let rest = path.strip_prefix(COMPARE_BASE_ROUTE)?;

    if rest.is_empty() || rest == "/" {
        return Some(Vec::new());
    }

    let segment = rest.strip_prefix('/')?;
    let segment = segment.strip_suffix('/').unwrap_or(segment);
    if segment.contains('/') {
        return None;
    }
    Some(decode_segment(segment))
}
