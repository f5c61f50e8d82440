//! Facet aggregation mapping.
//!
//! The request side asks for one terms aggregation per configured facet;
//! the response side folds the returned buckets over a zero-count seed
//! built from the same configuration. Anything the backend reports that
//! the configuration does not know is a mismatch: logged and skipped,
//! never an error.

use std::collections::BTreeMap;
use tracing::warn;

use crate::compiler::TermsAggregation;
use crate::models::{
    AggregationPayload, BooleanCount, FilterDescriptor, FilterKind, Filters, TaxonomyCounts,
};

/// Taxonomy facets aggregate over the keyword sub-field, boolean facets
/// over the field itself.
fn aggregation_field(descriptor: &FilterDescriptor) -> String {
    match descriptor.kind {
        FilterKind::Taxonomy => format!("{}.raw", descriptor.field),
        FilterKind::Boolean => descriptor.field.clone(),
    }
}

/// One terms aggregation per configured facet, keyed by the plain field
/// name so responses map straight back onto the configuration.
pub fn build_aggregation_request(
    descriptors: &[FilterDescriptor],
) -> BTreeMap<String, TermsAggregation> {
    descriptors
        .iter()
        .map(|descriptor| {
            (
                descriptor.field.clone(),
                TermsAggregation::over(aggregation_field(descriptor)),
            )
        })
        .collect()
}

/// Zero counts for every configured facet and term.
pub fn raw_filters(descriptors: &[FilterDescriptor]) -> Filters {
    let mut filters = Filters::default();
    for descriptor in descriptors {
        match descriptor.kind {
            FilterKind::Taxonomy => {
                filters.taxonomy.insert(
                    descriptor.field.clone(),
                    TaxonomyCounts {
                        name: descriptor.name.clone(),
                        items: descriptor.terms.iter().map(|term| (term.clone(), 0)).collect(),
                    },
                );
            }
            FilterKind::Boolean => {
                filters.boolean.insert(
                    descriptor.field.clone(),
                    BooleanCount {
                        name: descriptor.name.clone(),
                        count: 0,
                    },
                );
            }
        }
    }
    filters
}

/// Fold an aggregation payload over the configured seed.
pub fn parse_aggregations(
    payload: &AggregationPayload,
    descriptors: &[FilterDescriptor],
) -> Filters {
    let mut filters = raw_filters(descriptors);

    for (field, result) in payload {
        let Some(descriptor) = descriptors.iter().find(|d| d.field == *field) else {
            warn!(field = %field, "Aggregation result for unconfigured field");
            continue;
        };

        match descriptor.kind {
            FilterKind::Taxonomy => {
                let Some(counts) = filters.taxonomy.get_mut(&descriptor.field) else {
                    continue;
                };
                for bucket in &result.buckets {
                    let term = bucket.key.as_term();
                    match counts.items.get_mut(&term) {
                        Some(count) => *count = bucket.doc_count,
                        None => warn!(
                            field = %descriptor.field,
                            term = %term,
                            "Aggregation bucket for unconfigured term"
                        ),
                    }
                }
            }
            FilterKind::Boolean => {
                let count = result
                    .buckets
                    .iter()
                    .find(|bucket| bucket.key.is_truthy() && bucket.doc_count > 0)
                    .map(|bucket| bucket.doc_count)
                    .unwrap_or(0);
                if let Some(entry) = filters.boolean.get_mut(&descriptor.field) {
                    entry.count = count;
                }
            }
        }
    }

    filters
}
