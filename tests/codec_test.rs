//! Round-trip and tolerance tests for the state fragment codec

mod common;

use searchbox::codec::{decode, encode};
use searchbox::models::{Pager, Query, SortDirection};

#[test]
fn test_full_state_survives_a_round_trip() {
    let query = common::full_query();

    let fragment = encode(&query);
    let (decoded, warnings) = decode(&fragment);

    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    assert_eq!(decoded, query);
}

#[test]
fn test_text_with_spaces_and_pager_round_trip() {
    let mut query = Query::with_text("foo bar");
    query.pager = Some(Pager::new(2, 10));

    let fragment = encode(&query);
    assert_eq!(fragment, "text=foo%20bar&pager=2:10");

    let (decoded, warnings) = decode(&fragment);
    assert!(warnings.is_empty());
    assert_eq!(decoded.effective_text(), Some("foo bar"));
    assert_eq!(decoded.pager, Some(Pager::new(2, 10)));
}

#[test]
fn test_separator_characters_in_values_round_trip() {
    let mut query = Query::with_text("a&b?c:d;e=f");
    query.filters.select_term("topic&sub", "term:with;everything?");
    query
        .filters
        .set_boolean("flag=weird", true);

    let fragment = encode(&query);
    let (decoded, warnings) = decode(&fragment);

    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    assert_eq!(decoded.effective_text(), Some("a&b?c:d;e=f"));
    assert_eq!(
        decoded.filters.selected_terms("topic&sub"),
        vec!["term:with;everything?"]
    );
    assert_eq!(decoded.filters.boolean.get("flag=weird"), Some(&true));
}

#[test]
fn test_unselected_terms_are_not_encoded() {
    let mut query = Query::default();
    query.filters.select_term("topic", "ml");
    query
        .filters
        .taxonomy
        .get_mut("topic")
        .unwrap()
        .insert("ops".to_string(), false);

    let fragment = encode(&query);
    assert_eq!(fragment, "filters[taxonomy]=topic:ml");
}

#[test]
fn test_leading_hash_is_stripped() {
    let (query, warnings) = decode("#text=llm");
    assert!(warnings.is_empty());
    assert_eq!(query.effective_text(), Some("llm"));
}

#[test]
fn test_decode_collects_warnings_instead_of_failing() {
    // One good segment surrounded by junk; the empty intervals value is
    // simply ignored
    let fragment = "text=ok&unknown=1&pager=notanumber:10&dates=published;2024-01-01&intervals=";
    let (query, warnings) = decode(fragment);

    assert_eq!(query.effective_text(), Some("ok"));
    assert!(query.pager.is_none());
    assert!(query.dates.is_empty());
    assert!(query.intervals.is_empty());
    assert_eq!(warnings.len(), 3, "got: {warnings:?}");
}

#[test]
fn test_decode_garbage_yields_empty_query() {
    let (query, warnings) = decode("%%%&&&;;;:::???");
    assert!(query.is_empty());
    assert!(!warnings.is_empty());
}

#[test]
fn test_empty_fragment_decodes_to_empty_query() {
    let (query, warnings) = decode("");
    assert!(query.is_empty());
    assert!(warnings.is_empty());
}

#[test]
fn test_sort_and_pager_segments() {
    let mut query = Query::default();
    query.sort.insert("published".to_string(), SortDirection::Desc);
    query.pager = Some(Pager::new(2, 50));

    let fragment = encode(&query);
    assert_eq!(fragment, "sort=published;desc&pager=2:50");

    let (decoded, warnings) = decode(&fragment);
    assert!(warnings.is_empty());
    assert_eq!(decoded, query);
}
