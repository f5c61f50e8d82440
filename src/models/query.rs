use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// A structured search query, the state behind the search UI.
///
/// All keyed containers are `BTreeMap`s so that encoding and request
/// fingerprints come out identical no matter the order selections were
/// made in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Free-text input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Taxonomy and boolean facet selections
    #[serde(default, skip_serializing_if = "FilterSelection::is_empty")]
    pub filters: FilterSelection,

    /// Numeric range selections, keyed by field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intervals: BTreeMap<String, IntervalRange>,

    /// Date-window selections, keyed by logical field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dates: BTreeMap<String, DateRange>,

    /// Per-field sort overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sort: BTreeMap<String, SortDirection>,

    /// Result window (zero-based page)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pager: Option<Pager>,
}

impl Query {
    /// Create a text-only query
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Trimmed text, with empty input treated as absent
    pub fn effective_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// True when nothing at all is selected
    pub fn is_empty(&self) -> bool {
        self.effective_text().is_none()
            && self.filters.is_empty()
            && self.intervals.is_empty()
            && self.dates.is_empty()
            && self.sort.is_empty()
            && self.pager.is_none()
    }
}

/// Facet selections split by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    /// field -> term -> selected
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub taxonomy: BTreeMap<String, BTreeMap<String, bool>>,

    /// field -> enabled
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub boolean: BTreeMap<String, bool>,
}

impl FilterSelection {
    pub fn is_empty(&self) -> bool {
        self.taxonomy.is_empty() && self.boolean.is_empty()
    }

    /// Selected terms for a taxonomy field, in lexicographic order
    pub fn selected_terms(&self, field: &str) -> Vec<String> {
        self.taxonomy
            .get(field)
            .map(|terms| {
                terms
                    .iter()
                    .filter(|(_, selected)| **selected)
                    .map(|(term, _)| term.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mark a taxonomy term as selected
    pub fn select_term(&mut self, field: impl Into<String>, term: impl Into<String>) {
        self.taxonomy
            .entry(field.into())
            .or_default()
            .insert(term.into(), true);
    }

    /// Enable or disable a boolean facet
    pub fn set_boolean(&mut self, field: impl Into<String>, enabled: bool) {
        self.boolean.insert(field.into(), enabled);
    }
}

/// Inclusive numeric bounds; either side may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl IntervalRange {
    /// Neither bound carries a value
    pub fn is_empty(&self) -> bool {
        !bound_set(&self.from) && !bound_set(&self.to)
    }
}

/// A date window over a logical field with physical from/to columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl DateRange {
    /// Overlap clauses need both window edges
    pub fn is_complete(&self) -> bool {
        bound_set(&self.from) && bound_set(&self.to)
    }

    pub fn is_empty(&self) -> bool {
        !bound_set(&self.from) && !bound_set(&self.to)
    }
}

fn bound_set(bound: &Option<String>) -> bool {
    bound.as_deref().map_or(false, |b| !b.trim().is_empty())
}

/// Result window; `page` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    pub page: u32,
    pub size: u32,
}

impl Pager {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Offset of the first hit in the window
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_text_trims_and_drops_empty() {
        assert_eq!(Query::with_text("  llm  ").effective_text(), Some("llm"));
        assert_eq!(Query::with_text("   ").effective_text(), None);
        assert_eq!(Query::default().effective_text(), None);
    }

    #[test]
    fn test_selected_terms_are_sorted_and_filtered() {
        let mut selection = FilterSelection::default();
        selection.select_term("topic", "zebra");
        selection.select_term("topic", "alpha");
        selection
            .taxonomy
            .get_mut("topic")
            .unwrap()
            .insert("muted".to_string(), false);

        assert_eq!(selection.selected_terms("topic"), vec!["alpha", "zebra"]);
        assert!(selection.selected_terms("missing").is_empty());
    }

    #[test]
    fn test_range_emptiness() {
        assert!(IntervalRange::default().is_empty());
        assert!(IntervalRange {
            from: Some("  ".to_string()),
            to: None
        }
        .is_empty());
        assert!(!IntervalRange {
            from: Some("3".to_string()),
            to: None
        }
        .is_empty());

        let half_open = DateRange {
            from: Some("2024-01-01".to_string()),
            to: None,
        };
        assert!(!half_open.is_complete());
        assert!(!half_open.is_empty());
    }

    #[test]
    fn test_pager_offset() {
        assert_eq!(Pager::new(0, 20).offset(), 0);
        assert_eq!(Pager::new(3, 25).offset(), 75);
    }

    #[test]
    fn test_sort_direction_round_trip() {
        assert_eq!(SortDirection::Desc.to_string(), "desc");
        assert_eq!("ASC".parse::<SortDirection>().ok(), Some(SortDirection::Asc));
    }
}
