//! Search orchestration: compile, cache, execute, publish.
//!
//! `SearchProxy` is the surface the embedding application talks to. It
//! owns the compiler, the result caches and the facet-count snapshot, and
//! drives the backend through the [`SearchBackend`] seam so tests can
//! script responses without a live connection.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::aggregations;
use crate::backend::SearchBackend;
use crate::cache::ResultCache;
use crate::codec::{self, DecodeWarning};
use crate::compiler::QueryCompiler;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::models::{
    AggregationPayload, Filters, Query, ResultPayload, SearchResults, Suggestions,
};

/// Receives the encoded fragment whenever a search publishes its state.
///
/// In a browser embedding this writes the location hash; the in-memory
/// implementation below serves tests and headless use.
pub trait StateSink: Send + Sync {
    fn publish(&self, fragment: &str);
}

/// Sink that remembers the most recently published fragment.
#[derive(Debug, Default)]
pub struct MemoryStateSink {
    fragment: RwLock<Option<String>>,
}

impl MemoryStateSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<String> {
        self.fragment.read().clone()
    }
}

impl StateSink for MemoryStateSink {
    fn publish(&self, fragment: &str) {
        *self.fragment.write() = Some(fragment.to_string());
    }
}

/// Per-call switches for [`SearchProxy::search_with_options`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Publish the encoded state to the sink. Turned off by callers that
    /// are restoring state rather than creating it.
    pub publish_state: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            publish_state: true,
        }
    }
}

/// Decoded startup state: the query a fragment described, plus zeroed
/// facet counts to render before the first response arrives.
#[derive(Debug, Clone, Serialize)]
pub struct SearchState {
    pub query: Query,
    pub filters: Filters,
    pub warnings: Vec<DecodeWarning>,
}

struct FilterSnapshot {
    sequence: u64,
    filters: Filters,
}

/// The search surface the embedding application drives.
pub struct SearchProxy {
    provider: Arc<ProviderConfig>,
    compiler: QueryCompiler,
    backend: Arc<dyn SearchBackend>,
    sink: Arc<dyn StateSink>,
    results: ResultCache<ResultPayload>,
    counts: ResultCache<AggregationPayload>,
    suggestions: ResultCache<Suggestions>,
    snapshot: RwLock<Option<FilterSnapshot>>,
    sequence: AtomicU64,
}

impl SearchProxy {
    pub fn new(
        provider: Arc<ProviderConfig>,
        backend: Arc<dyn SearchBackend>,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let result_ttl = Duration::from_secs(provider.cache_expire_secs);
        let suggestion_ttl = Duration::from_secs(
            provider
                .autocomplete
                .as_ref()
                .map(|a| a.cache_expire_secs)
                .unwrap_or(5),
        );

        Self {
            compiler: QueryCompiler::new(Arc::clone(&provider)),
            backend,
            sink,
            results: ResultCache::new(1_000, result_ttl),
            counts: ResultCache::new(100, result_ttl),
            suggestions: ResultCache::new(1_000, suggestion_ttl),
            snapshot: RwLock::new(None),
            sequence: AtomicU64::new(0),
            provider,
        }
    }

    /// Run a search and publish its state.
    pub async fn search(&self, query: &Query) -> Result<SearchResults> {
        self.search_with_options(query, &SearchOptions::default())
            .await
    }

    /// Run a search.
    ///
    /// The query is sanitized, given the provider's default window when it
    /// carries none, published to the state sink, compiled and executed
    /// through the result cache. Identical queries in flight at the same
    /// time share one backend call. When the response carries
    /// aggregations, the facet-count snapshot is refreshed, unless a later
    /// search already installed its own.
    pub async fn search_with_options(
        &self,
        query: &Query,
        options: &SearchOptions,
    ) -> Result<SearchResults> {
        let sequence = self.next_sequence();

        let mut query = self.compiler.sanitize(query);
        if query.pager.is_none() {
            query.pager = self.provider.pager;
        }

        if options.publish_state {
            let fragment = codec::encode(&query);
            debug!(fragment = %fragment, "Publishing search state");
            self.sink.publish(&fragment);
        }

        let request = self.compiler.compile(&query)?;
        let key = request.correlation_key()?;

        let backend = Arc::clone(&self.backend);
        let payload = self
            .results
            .get_or_fetch(&key, async move { backend.execute(&request).await })
            .await?;

        // Cached payloads still carry their aggregations, so a cache hit
        // refreshes the facet counts exactly like a fresh response
        if let Some(aggs) = &payload.aggregations {
            let filters = aggregations::parse_aggregations(aggs, &self.provider.filters);
            self.install_snapshot(sequence, filters);
        }

        info!(total = payload.total, hits = payload.hits.len(), "Search completed");

        Ok(SearchResults {
            hits: payload.hits,
            total: payload.total,
            pager: query.pager,
        })
    }

    /// Current facet counts.
    ///
    /// Serves the snapshot left by the latest search when one exists,
    /// otherwise runs an unconstrained count request so the UI can render
    /// corpus-wide counts before the first search.
    pub async fn get_filters(&self) -> Result<Filters> {
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            return Ok(snapshot.filters.clone());
        }
        if self.provider.filters.is_empty() {
            return Ok(Filters::default());
        }

        let sequence = self.next_sequence();
        let request = self.compiler.compile_count()?;
        let key = request.correlation_key()?;

        let backend = Arc::clone(&self.backend);
        let payload = self
            .counts
            .get_or_fetch(&key, async move { backend.count(&request).await })
            .await?;

        let filters = aggregations::parse_aggregations(&payload, &self.provider.filters);
        self.install_snapshot(sequence, filters.clone());
        Ok(filters)
    }

    /// Zero counts for every configured facet, for first paint.
    pub fn raw_filters(&self) -> Filters {
        aggregations::raw_filters(&self.provider.filters)
    }

    /// Prefix completions from the configured autocomplete field.
    ///
    /// An empty prefix short-circuits to no suggestions without touching
    /// the backend.
    pub async fn autocomplete(&self, prefix: &str) -> Result<Suggestions> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Suggestions::default());
        }

        let autocomplete = self
            .provider
            .autocomplete
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("autocomplete".to_string()))?;
        let field = autocomplete.field.clone();
        let size = autocomplete.size as usize;

        let request = self.compiler.compile_autocomplete(prefix)?;
        let key = request.correlation_key()?;

        let backend = Arc::clone(&self.backend);
        self.suggestions
            .get_or_fetch(&key, async move {
                let payload = backend.execute(&request).await?;
                Ok(extract_suggestions(&payload, &field, size))
            })
            .await
    }

    /// Decode a fragment into the state to restore on startup.
    pub fn initial_state(&self, fragment: &str) -> SearchState {
        let (query, warnings) = codec::decode(fragment);
        SearchState {
            query,
            filters: self.raw_filters(),
            warnings,
        }
    }

    /// Canonical fragment for a query, after sanitization.
    pub fn encode_state(&self, query: &Query) -> String {
        codec::encode(&self.compiler.sanitize(query))
    }

    pub fn decode_state(&self, fragment: &str) -> (Query, Vec<DecodeWarning>) {
        codec::decode(fragment)
    }

    /// Drop every cached result, count, suggestion and the facet snapshot.
    pub async fn clear_caches(&self) {
        self.results.invalidate_all().await;
        self.counts.invalidate_all().await;
        self.suggestions.invalidate_all().await;
        *self.snapshot.write() = None;
        info!("Search caches cleared");
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Install a facet snapshot unless a later search already did.
    fn install_snapshot(&self, sequence: u64, filters: Filters) {
        let mut snapshot = self.snapshot.write();
        match snapshot.as_ref() {
            Some(current) if current.sequence >= sequence => {
                debug!(
                    held = current.sequence,
                    offered = sequence,
                    "Dropping superseded facet snapshot"
                );
            }
            _ => *snapshot = Some(FilterSnapshot { sequence, filters }),
        }
    }
}

/// Distinct values of `field` across autocomplete hits, in hit order.
fn extract_suggestions(payload: &ResultPayload, field: &str, size: usize) -> Suggestions {
    let mut items: Vec<String> = Vec::new();
    for hit in &payload.hits {
        // Hits nest the document under `_source` on some backend versions
        let document = hit.get("_source").unwrap_or(hit);
        let Some(value) = document.get(field).and_then(|v| v.as_str()) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || items.iter().any(|existing| existing == value) {
            continue;
        }
        items.push(value.to_string());
        if items.len() == size {
            break;
        }
    }
    Suggestions { items }
}
