use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumString};

/// One facet a provider offers for filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Backend field the facet aggregates over
    pub field: String,

    /// Display name
    pub name: String,

    /// Facet kind
    pub kind: FilterKind,

    /// Known terms, taxonomy facets only
    #[serde(default)]
    pub terms: BTreeSet<String>,
}

impl FilterDescriptor {
    pub fn taxonomy(
        field: impl Into<String>,
        name: impl Into<String>,
        terms: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            field: field.into(),
            name: name.into(),
            kind: FilterKind::Taxonomy,
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    pub fn boolean(field: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            name: name.into(),
            kind: FilterKind::Boolean,
            terms: BTreeSet::new(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FilterKind {
    Taxonomy,
    Boolean,
}

/// A selection the provider always applies. Forced filters join the
/// compiled request after the caller's own clauses and never appear in
/// published state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcedFilter {
    pub kind: FilterKind,

    pub field: String,

    /// Terms for taxonomy kind; ignored for boolean kind
    #[serde(default)]
    pub values: Vec<String>,
}

/// Facet counts for display beside the filter controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    /// field -> per-term document counts
    #[serde(default)]
    pub taxonomy: BTreeMap<String, TaxonomyCounts>,

    /// field -> count of documents with the flag set
    #[serde(default)]
    pub boolean: BTreeMap<String, BooleanCount>,
}

impl Filters {
    /// Count for one taxonomy term, if the field and term are known
    pub fn term_count(&self, field: &str, term: &str) -> Option<u64> {
        self.taxonomy
            .get(field)
            .and_then(|counts| counts.items.get(term))
            .copied()
    }
}

/// Counts for one taxonomy facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyCounts {
    /// Display name from the descriptor
    pub name: String,

    /// term -> document count
    #[serde(default)]
    pub items: BTreeMap<String, u64>,
}

/// Count for one boolean facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BooleanCount {
    /// Display name from the descriptor
    pub name: String,

    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_constructors() {
        let topics = FilterDescriptor::taxonomy("topic", "Topics", ["ml", "ops"]);
        assert_eq!(topics.kind, FilterKind::Taxonomy);
        assert!(topics.terms.contains("ml"));

        let starred = FilterDescriptor::boolean("starred", "Starred");
        assert_eq!(starred.kind, FilterKind::Boolean);
        assert!(starred.terms.is_empty());
    }

    #[test]
    fn test_term_count_lookup() {
        let mut filters = Filters::default();
        filters.taxonomy.insert(
            "topic".to_string(),
            TaxonomyCounts {
                name: "Topics".to_string(),
                items: BTreeMap::from([("ml".to_string(), 7)]),
            },
        );

        assert_eq!(filters.term_count("topic", "ml"), Some(7));
        assert_eq!(filters.term_count("topic", "ops"), None);
        assert_eq!(filters.term_count("missing", "ml"), None);
    }

    #[test]
    fn test_filter_kind_round_trip() {
        assert_eq!(FilterKind::Taxonomy.to_string(), "taxonomy");
        assert_eq!(
            "boolean".parse::<FilterKind>().ok(),
            Some(FilterKind::Boolean)
        );
    }
}
