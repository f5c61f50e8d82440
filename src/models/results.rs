use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Pager;

/// Raw payload the backend delivers for one search request. This is the
/// unit the result cache stores, so a cache hit carries the same
/// aggregations a fresh response would.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Matched documents, left as raw JSON for the embedding host
    #[serde(default)]
    pub hits: Vec<serde_json::Value>,

    /// Total matches across all pages
    #[serde(default)]
    pub total: u64,

    /// Facet buckets, present when the request asked for them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<AggregationPayload>,
}

/// field -> bucket list
pub type AggregationPayload = BTreeMap<String, AggregationResult>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    #[serde(default)]
    pub buckets: Vec<AggregationBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationBucket {
    pub key: BucketKey,

    #[serde(default)]
    pub doc_count: u64,
}

/// Bucket keys arrive as strings, booleans or numbers depending on the
/// field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketKey {
    Text(String),
    Flag(bool),
    Integer(i64),
    Float(f64),
}

impl BucketKey {
    /// Key rendered the way configuration terms are written
    pub fn as_term(&self) -> String {
        match self {
            BucketKey::Text(s) => s.clone(),
            BucketKey::Flag(b) => b.to_string(),
            BucketKey::Integer(n) => n.to_string(),
            BucketKey::Float(f) => f.to_string(),
        }
    }

    /// Truthiness rules for boolean facet buckets
    pub fn is_truthy(&self) -> bool {
        match self {
            BucketKey::Text(s) => matches!(s.as_str(), "T" | "true" | "1"),
            BucketKey::Flag(b) => *b,
            BucketKey::Integer(n) => *n == 1,
            BucketKey::Float(f) => *f == 1.0,
        }
    }
}

/// What a search call hands back to its caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<serde_json::Value>,

    pub total: u64,

    /// The window these hits were fetched with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pager: Option<Pager>,
}

/// Autocomplete completions for a text prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub items: Vec<String>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_key_shapes_deserialize() {
        let payload: AggregationPayload = serde_json::from_str(
            r#"{
                "topic": {"buckets": [
                    {"key": "ml", "doc_count": 4},
                    {"key": true, "doc_count": 2},
                    {"key": 7, "doc_count": 1},
                    {"key": 2.5, "doc_count": 1}
                ]}
            }"#,
        )
        .unwrap();

        let buckets = &payload["topic"].buckets;
        assert_eq!(buckets[0].key, BucketKey::Text("ml".to_string()));
        assert_eq!(buckets[1].key, BucketKey::Flag(true));
        assert_eq!(buckets[2].key, BucketKey::Integer(7));
        assert_eq!(buckets[3].key, BucketKey::Float(2.5));
    }

    #[test]
    fn test_bucket_truthiness() {
        assert!(BucketKey::Text("T".to_string()).is_truthy());
        assert!(BucketKey::Text("true".to_string()).is_truthy());
        assert!(BucketKey::Text("1".to_string()).is_truthy());
        assert!(BucketKey::Flag(true).is_truthy());
        assert!(BucketKey::Integer(1).is_truthy());
        assert!(!BucketKey::Text("F".to_string()).is_truthy());
        assert!(!BucketKey::Integer(0).is_truthy());
    }

    #[test]
    fn test_payload_defaults_for_missing_fields() {
        let payload: ResultPayload = serde_json::from_str(r#"{"total": 3}"#).unwrap();
        assert_eq!(payload.total, 3);
        assert!(payload.hits.is_empty());
        assert!(payload.aggregations.is_none());
    }
}
