//! URL-fragment codec for search state.
//!
//! A query serializes into `key=value` segments joined by `&`:
//!
//! ```text
//! text=llm%20ops&filters[taxonomy]=topic:ml;ops&filters[boolean]=starred&pager=0:25
//! ```
//!
//! Multi-entry segments separate entries with `?`, a field from its value
//! list with `:`, and list items with `;`. Every field, term and bound is
//! percent-encoded on its own before joining, so user values containing
//! the separator characters survive a round trip. Decoding is tolerant:
//! anything malformed becomes a [`DecodeWarning`] and is skipped, never an
//! error.

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{DateRange, IntervalRange, Pager, Query, SortDirection};

const KEY_TEXT: &str = "text";
const KEY_TAXONOMY: &str = "filters[taxonomy]";
const KEY_BOOLEAN: &str = "filters[boolean]";
const KEY_INTERVALS: &str = "intervals";
const KEY_DATES: &str = "dates";
const KEY_SORT: &str = "sort";
const KEY_PAGER: &str = "pager";

/// A recoverable problem found while decoding a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeWarning {
    /// Segment key the problem was found under
    pub segment: String,

    pub message: String,
}

impl DecodeWarning {
    fn new(segment: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(segment = segment, message = %message, "Skipping malformed state segment");
        Self {
            segment: segment.to_string(),
            message,
        }
    }
}

/// Serialize a query into a URL fragment.
///
/// Empty containers, unselected terms and ranges without bounds are left
/// out, so the fragment only carries what the user actually chose.
pub fn encode(query: &Query) -> String {
    let mut segments = Vec::new();

    if let Some(text) = query.effective_text() {
        segments.push(format!("{KEY_TEXT}={}", encode_atom(text)));
    }

    let taxonomy: Vec<String> = query
        .filters
        .taxonomy
        .keys()
        .filter_map(|field| {
            let terms = query.filters.selected_terms(field);
            if terms.is_empty() {
                return None;
            }
            let joined: Vec<String> = terms.iter().map(|t| encode_atom(t)).collect();
            Some(format!("{}:{}", encode_atom(field), joined.join(";")))
        })
        .collect();
    if !taxonomy.is_empty() {
        segments.push(format!("{KEY_TAXONOMY}={}", taxonomy.join("?")));
    }

    let boolean: Vec<String> = query
        .filters
        .boolean
        .iter()
        .filter(|(_, enabled)| **enabled)
        .map(|(field, _)| encode_atom(field))
        .collect();
    if !boolean.is_empty() {
        segments.push(format!("{KEY_BOOLEAN}={}", boolean.join("?")));
    }

    let intervals: Vec<String> = query
        .intervals
        .iter()
        .filter(|(_, range)| !range.is_empty())
        .map(|(field, range)| encode_bounds(field, &range.from, &range.to))
        .collect();
    if !intervals.is_empty() {
        segments.push(format!("{KEY_INTERVALS}={}", intervals.join("?")));
    }

    let dates: Vec<String> = query
        .dates
        .iter()
        .filter(|(_, range)| !range.is_empty())
        .map(|(field, range)| encode_bounds(field, &range.from, &range.to))
        .collect();
    if !dates.is_empty() {
        segments.push(format!("{KEY_DATES}={}", dates.join("?")));
    }

    let sort: Vec<String> = query
        .sort
        .iter()
        .map(|(field, direction)| format!("{};{direction}", encode_atom(field)))
        .collect();
    if !sort.is_empty() {
        segments.push(format!("{KEY_SORT}={}", sort.join("?")));
    }

    if let Some(pager) = &query.pager {
        segments.push(format!("{KEY_PAGER}={}:{}", pager.page, pager.size));
    }

    segments.join("&")
}

/// Parse a URL fragment back into a query.
///
/// Never fails: unknown keys and malformed entries are reported as
/// warnings and skipped. A leading `#` is accepted and stripped.
pub fn decode(fragment: &str) -> (Query, Vec<DecodeWarning>) {
    let mut query = Query::default();
    let mut warnings = Vec::new();

    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    if fragment.is_empty() {
        return (query, warnings);
    }

    for segment in fragment.split('&') {
        if segment.is_empty() {
            continue;
        }
        let Some((key, value)) = segment.split_once('=') else {
            warnings.push(DecodeWarning::new(segment, "segment has no '='"));
            continue;
        };

        match key {
            KEY_TEXT => match decode_atom(value) {
                Ok(text) if !text.trim().is_empty() => query.text = Some(text),
                Ok(_) => {}
                Err(message) => warnings.push(DecodeWarning::new(key, message)),
            },
            KEY_TAXONOMY => decode_taxonomy(value, &mut query, &mut warnings),
            KEY_BOOLEAN => decode_boolean(value, &mut query, &mut warnings),
            KEY_INTERVALS => {
                decode_ranged(key, value, &mut warnings, |field, from, to| {
                    query
                        .intervals
                        .insert(field, IntervalRange { from, to });
                });
            }
            KEY_DATES => {
                decode_ranged(key, value, &mut warnings, |field, from, to| {
                    query.dates.insert(field, DateRange { from, to });
                });
            }
            KEY_SORT => decode_sort(value, &mut query, &mut warnings),
            KEY_PAGER => decode_pager(value, &mut query, &mut warnings),
            other => {
                warnings.push(DecodeWarning::new(other, "unknown state key"));
            }
        }
    }

    (query, warnings)
}

fn decode_taxonomy(value: &str, query: &mut Query, warnings: &mut Vec<DecodeWarning>) {
    for entry in value.split('?').filter(|e| !e.is_empty()) {
        let Some((field, terms)) = entry.split_once(':') else {
            warnings.push(DecodeWarning::new(
                KEY_TAXONOMY,
                format!("entry '{entry}' is not field:terms"),
            ));
            continue;
        };
        let field = match decode_atom(field) {
            Ok(f) if !f.is_empty() => f,
            Ok(_) => {
                warnings.push(DecodeWarning::new(KEY_TAXONOMY, "empty field name"));
                continue;
            }
            Err(message) => {
                warnings.push(DecodeWarning::new(KEY_TAXONOMY, message));
                continue;
            }
        };
        for term in terms.split(';').filter(|t| !t.is_empty()) {
            match decode_atom(term) {
                Ok(term) => query.filters.select_term(field.clone(), term),
                Err(message) => warnings.push(DecodeWarning::new(KEY_TAXONOMY, message)),
            }
        }
    }
}

fn decode_boolean(value: &str, query: &mut Query, warnings: &mut Vec<DecodeWarning>) {
    for field in value.split('?').filter(|f| !f.is_empty()) {
        match decode_atom(field) {
            Ok(field) if !field.is_empty() => query.filters.set_boolean(field, true),
            Ok(_) => {}
            Err(message) => warnings.push(DecodeWarning::new(KEY_BOOLEAN, message)),
        }
    }
}

fn decode_ranged(
    key: &str,
    value: &str,
    warnings: &mut Vec<DecodeWarning>,
    mut insert: impl FnMut(String, Option<String>, Option<String>),
) {
    for entry in value.split('?').filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(';').collect();
        if parts.len() != 3 {
            warnings.push(DecodeWarning::new(
                key,
                format!("entry '{entry}' is not field;from;to"),
            ));
            continue;
        }
        let field = match decode_atom(parts[0]) {
            Ok(f) if !f.is_empty() => f,
            Ok(_) => {
                warnings.push(DecodeWarning::new(key, "empty field name"));
                continue;
            }
            Err(message) => {
                warnings.push(DecodeWarning::new(key, message));
                continue;
            }
        };
        let bound = |raw: &str, warnings: &mut Vec<DecodeWarning>| -> Option<String> {
            if raw.is_empty() {
                return None;
            }
            match decode_atom(raw) {
                Ok(b) => Some(b),
                Err(message) => {
                    warnings.push(DecodeWarning::new(key, message));
                    None
                }
            }
        };
        let from = bound(parts[1], warnings);
        let to = bound(parts[2], warnings);
        if from.is_none() && to.is_none() {
            continue;
        }
        insert(field, from, to);
    }
}

fn decode_sort(value: &str, query: &mut Query, warnings: &mut Vec<DecodeWarning>) {
    for entry in value.split('?').filter(|e| !e.is_empty()) {
        let Some((field, direction)) = entry.split_once(';') else {
            warnings.push(DecodeWarning::new(
                KEY_SORT,
                format!("entry '{entry}' is not field;direction"),
            ));
            continue;
        };
        let field = match decode_atom(field) {
            Ok(f) if !f.is_empty() => f,
            _ => {
                warnings.push(DecodeWarning::new(KEY_SORT, "empty field name"));
                continue;
            }
        };
        match direction.parse::<SortDirection>() {
            Ok(direction) => {
                query.sort.insert(field, direction);
            }
            Err(_) => warnings.push(DecodeWarning::new(
                KEY_SORT,
                format!("unknown sort direction '{direction}'"),
            )),
        }
    }
}

fn decode_pager(value: &str, query: &mut Query, warnings: &mut Vec<DecodeWarning>) {
    let Some((page, size)) = value.split_once(':') else {
        warnings.push(DecodeWarning::new(KEY_PAGER, "pager is not page:size"));
        return;
    };
    match (page.parse::<u32>(), size.parse::<u32>()) {
        (Ok(page), Ok(size)) => query.pager = Some(Pager { page, size }),
        _ => warnings.push(DecodeWarning::new(
            KEY_PAGER,
            format!("pager '{value}' is not numeric"),
        )),
    }
}

fn encode_bounds(field: &str, from: &Option<String>, to: &Option<String>) -> String {
    format!(
        "{};{};{}",
        encode_atom(field),
        from.as_deref().map(encode_atom).unwrap_or_default(),
        to.as_deref().map(encode_atom).unwrap_or_default(),
    )
}

fn encode_atom(raw: &str) -> String {
    utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()
}

fn decode_atom(raw: &str) -> std::result::Result<String, String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| format!("invalid utf-8 in '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_emits_known_segment_order() {
        let mut query = Query::with_text("llm ops");
        query.filters.select_term("topic", "ml");
        query.filters.set_boolean("starred", true);
        query.pager = Some(Pager::new(0, 25));

        assert_eq!(
            encode(&query),
            "text=llm%20ops&filters[taxonomy]=topic:ml&filters[boolean]=starred&pager=0:25"
        );
    }

    #[test]
    fn test_decode_empty_fragment() {
        let (query, warnings) = decode("");
        assert_eq!(query, Query::default());
        assert!(warnings.is_empty());

        let (query, warnings) = decode("#");
        assert_eq!(query, Query::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unknown_key_warns_and_skips() {
        let (query, warnings) = decode("text=rust&flavor=mint");
        assert_eq!(query.text.as_deref(), Some("rust"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].segment, "flavor");
    }

    #[test]
    fn test_unselected_terms_do_not_encode() {
        let mut query = Query::default();
        query
            .filters
            .taxonomy
            .entry("topic".to_string())
            .or_default()
            .insert("muted".to_string(), false);

        assert_eq!(encode(&query), "");
    }

    #[test]
    fn test_half_open_interval_round_trip() {
        let mut query = Query::default();
        query.intervals.insert(
            "pages".to_string(),
            IntervalRange {
                from: None,
                to: Some("10".to_string()),
            },
        );

        let encoded = encode(&query);
        assert_eq!(encoded, "intervals=pages;;10");

        let (decoded, warnings) = decode(&encoded);
        assert!(warnings.is_empty());
        assert_eq!(decoded, query);
    }

    #[test]
    fn test_malformed_pager_is_skipped() {
        let (query, warnings) = decode("pager=abc:def");
        assert!(query.pager.is_none());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].segment, "pager");
    }
}
