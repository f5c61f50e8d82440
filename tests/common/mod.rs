//! Shared fixtures for the integration tests

use std::collections::BTreeMap;

use searchbox::config::{AutocompleteConfig, DateFieldMapping, ProviderConfig};
use searchbox::models::{
    DateRange, FilterDescriptor, IntervalRange, Pager, Query, SortDirection,
};

/// Provider with every capability switched on
pub fn rich_provider() -> ProviderConfig {
    let mut provider =
        ProviderConfig::new("documents", vec!["title".to_string(), "body".to_string()]);
    provider.boost = BTreeMap::from([("title".to_string(), 2.0)]);
    provider.sorting = BTreeMap::from([("published".to_string(), SortDirection::Desc)]);
    provider.pager = Some(Pager::new(0, 20));
    provider.filters = vec![
        FilterDescriptor::taxonomy("topic", "Topic", ["ml", "ops", "security"]),
        FilterDescriptor::boolean("starred", "Starred"),
    ];
    provider.intervals = vec!["pages".to_string()];
    provider.dates = BTreeMap::from([(
        "published".to_string(),
        DateFieldMapping {
            from: "published_from".to_string(),
            to: "published_to".to_string(),
        },
    )]);
    provider.autocomplete = Some(AutocompleteConfig::default());
    provider
}

/// Query exercising every selection kind
pub fn full_query() -> Query {
    let mut query = Query::with_text("llm ops");
    query.filters.select_term("topic", "ml");
    query.filters.set_boolean("starred", true);
    query.intervals.insert(
        "pages".to_string(),
        IntervalRange {
            from: Some("10".to_string()),
            to: Some("200".to_string()),
        },
    );
    query.dates.insert(
        "published".to_string(),
        DateRange {
            from: Some("2024-01-01".to_string()),
            to: Some("2024-12-31".to_string()),
        },
    );
    query.sort.insert("title".to_string(), SortDirection::Asc);
    query.pager = Some(Pager::new(1, 25));
    query
}
