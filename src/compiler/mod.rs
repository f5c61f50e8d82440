//! Query compilation.
//!
//! [`QueryCompiler`] turns a structured [`Query`] into the exact request
//! body the backend executes. Compilation is deterministic: two queries
//! with the same meaning produce byte-identical requests and therefore the
//! same fingerprint, which is what the result cache and the channel key
//! on.

pub mod request;

pub use request::*;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::aggregations;
use crate::config::{DateFieldMapping, ProviderConfig};
use crate::error::{Error, Result};
use crate::models::{FilterKind, Query};

pub struct QueryCompiler {
    provider: Arc<ProviderConfig>,
}

impl QueryCompiler {
    pub fn new(provider: Arc<ProviderConfig>) -> Self {
        Self { provider }
    }

    /// Normalize a query against what the provider supports.
    ///
    /// Returns a copy with unusable selections removed: intervals without
    /// bounds or on fields the provider does not accept, date windows
    /// missing an edge or a field mapping, and pagers with a zero size.
    /// Every drop is logged.
    pub fn sanitize(&self, query: &Query) -> Query {
        let mut clean = query.clone();
        clean.text = query.effective_text().map(str::to_string);

        if self.provider.intervals.is_empty() {
            if !clean.intervals.is_empty() {
                warn!(
                    count = clean.intervals.len(),
                    "Dropping interval selections, provider accepts none"
                );
                clean.intervals.clear();
            }
        } else {
            let provider = &self.provider;
            clean.intervals.retain(|field, range| {
                if range.is_empty() {
                    warn!(field = %field, "Dropping interval without bounds");
                    return false;
                }
                if !provider.accepts_interval(field) {
                    warn!(field = %field, "Dropping interval on unsupported field");
                    return false;
                }
                true
            });
        }

        let provider = &self.provider;
        clean.dates.retain(|field, range| {
            if !provider.dates.contains_key(field) {
                warn!(field = %field, "Dropping date window without a field mapping");
                return false;
            }
            if !range.is_complete() {
                warn!(field = %field, "Dropping date window missing an edge");
                return false;
            }
            true
        });

        if let Some(pager) = clean.pager {
            if pager.size == 0 {
                warn!("Dropping pager with zero size");
                clean.pager = None;
            }
        }

        clean
    }

    /// Compile a query into a sealed search request.
    ///
    /// Applies [`Self::sanitize`] first and merges the provider's forced
    /// selections in, so the output is fully specified no matter what the
    /// caller hands over.
    pub fn compile(&self, query: &Query) -> Result<CompiledRequest> {
        let query = self.apply_forced_filters(self.sanitize(query));

        let base = match query.effective_text() {
            Some(text) => BaseQuery::multi_match(
                text,
                self.boosted_fields(),
                self.provider.analyzer.clone(),
            ),
            None => BaseQuery::match_all(),
        };

        let must = self.filter_clauses(&query);
        let filter = (!must.is_empty()).then(|| BoolFilter::must(must));

        let mut request = CompiledRequest {
            index: self.provider.index.clone(),
            query: QueryContainer::filtered(base, filter),
            sort: self.sort_specs(&query),
            aggs: aggregations::build_aggregation_request(&self.provider.filters),
            size: query.pager.map(|p| u64::from(p.size)),
            from: query.pager.map(|p| p.offset()),
            uuid: None,
        };
        request.seal()?;
        Ok(request)
    }

    /// Compile the facet-count request used to seed filter counts.
    pub fn compile_count(&self) -> Result<CountRequest> {
        let mut request = CountRequest {
            index: self.provider.index.clone(),
            aggs: aggregations::build_aggregation_request(&self.provider.filters),
            uuid: None,
        };
        request.seal()?;
        Ok(request)
    }

    /// Compile a prefix-completion request.
    pub fn compile_autocomplete(&self, prefix: &str) -> Result<CompiledRequest> {
        let autocomplete = self
            .provider
            .autocomplete
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("autocomplete".to_string()))?;

        let mut request = CompiledRequest {
            index: autocomplete
                .index
                .clone()
                .unwrap_or_else(|| self.provider.index.clone()),
            query: QueryContainer::Plain(BaseQuery::phrase_prefix(
                autocomplete.field.clone(),
                prefix,
            )),
            sort: BTreeMap::new(),
            aggs: BTreeMap::new(),
            size: Some(u64::from(autocomplete.size)),
            from: None,
            uuid: None,
        };
        request.seal()?;
        Ok(request)
    }

    /// Forced selections replace whatever the caller chose on the same
    /// field. They are part of the compiled request only, never of
    /// published state.
    fn apply_forced_filters(&self, mut query: Query) -> Query {
        for forced in &self.provider.force {
            match forced.kind {
                FilterKind::Taxonomy => {
                    let terms = forced
                        .values
                        .iter()
                        .map(|value| (value.clone(), true))
                        .collect();
                    query.filters.taxonomy.insert(forced.field.clone(), terms);
                }
                FilterKind::Boolean => {
                    query.filters.boolean.insert(forced.field.clone(), true);
                }
            }
        }
        query
    }

    fn filter_clauses(&self, query: &Query) -> Vec<FilterClause> {
        let mut clauses = Vec::new();

        for field in query.filters.taxonomy.keys() {
            let terms = query.filters.selected_terms(field);
            if !terms.is_empty() {
                clauses.push(FilterClause::terms(format!("{field}.raw"), terms));
            }
        }

        for (field, enabled) in &query.filters.boolean {
            if *enabled {
                clauses.push(FilterClause::flag(field.clone()));
            }
        }

        for (field, range) in &query.intervals {
            clauses.push(FilterClause::range(
                field.clone(),
                RangeBounds::between(range.from.clone(), range.to.clone()),
            ));
        }

        for (field, range) in &query.dates {
            let (Some(mapping), Some(from), Some(to)) = (
                self.provider.dates.get(field),
                range.from.as_deref(),
                range.to.as_deref(),
            ) else {
                continue;
            };
            clauses.push(date_window(mapping, from, to));
        }

        clauses
    }

    fn sort_specs(&self, query: &Query) -> BTreeMap<String, SortSpec> {
        let mut merged = self.provider.sorting.clone();
        for (field, direction) in &query.sort {
            merged.insert(field.clone(), *direction);
        }
        merged
            .into_iter()
            .map(|(field, order)| (field, SortSpec { order }))
            .collect()
    }

    fn boosted_fields(&self) -> Vec<String> {
        self.provider
            .fields
            .iter()
            .map(|field| match self.provider.boost.get(field) {
                Some(boost) => format!("{field}^{boost}"),
                None => field.clone(),
            })
            .collect()
    }
}

/// A document with physical start/end columns overlaps the requested
/// window when it straddles the window start, straddles the window end,
/// or lies entirely inside. The three cases OR together and the group as
/// a whole ANDs with the other filters.
fn date_window(mapping: &DateFieldMapping, from: &str, to: &str) -> FilterClause {
    let straddles_start = BoolFilter::must(vec![
        FilterClause::range(mapping.from.clone(), RangeBounds::lte(from)),
        FilterClause::range(mapping.to.clone(), RangeBounds::gt(from)),
    ]);
    let straddles_end = BoolFilter::must(vec![
        FilterClause::range(mapping.from.clone(), RangeBounds::lt(to)),
        FilterClause::range(mapping.to.clone(), RangeBounds::gte(to)),
    ]);
    let contained = BoolFilter::must(vec![
        FilterClause::range(mapping.from.clone(), RangeBounds::gte(from)),
        FilterClause::range(mapping.to.clone(), RangeBounds::lte(to)),
    ]);

    FilterClause::group(BoolFilter::should(vec![
        FilterClause::group(straddles_start),
        FilterClause::group(straddles_end),
        FilterClause::group(contained),
    ]))
}
