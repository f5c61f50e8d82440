//! Typed model of the backend request body.
//!
//! Serialization order is fixed: struct fields serialize in declaration
//! order and every keyed container is a `BTreeMap`, so the same request
//! always produces the same bytes. The fingerprint depends on that.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::SortDirection;

/// One search request as the wire expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledRequest {
    /// Index the request runs against
    pub index: String,

    pub query: QueryContainer,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sort: BTreeMap<String, SortSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, TermsAggregation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,

    /// Correlation id; the request fingerprint once sealed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl CompiledRequest {
    /// Deterministic identity of this request: SHA-256 over the canonical
    /// JSON with the correlation id blanked, rendered as lowercase hex.
    pub fn fingerprint(&self) -> Result<String> {
        let mut blank = self.clone();
        blank.uuid = None;
        fingerprint_json(&blank)
    }

    /// Compute the fingerprint and store it as the correlation id
    pub fn seal(&mut self) -> Result<String> {
        let fingerprint = self.fingerprint()?;
        self.uuid = Some(fingerprint.clone());
        Ok(fingerprint)
    }

    /// The stored correlation id, computed fresh when the request was
    /// never sealed
    pub fn correlation_key(&self) -> Result<String> {
        match &self.uuid {
            Some(uuid) => Ok(uuid.clone()),
            None => self.fingerprint(),
        }
    }
}

/// A facet-count request: aggregations only, no hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRequest {
    pub index: String,

    pub aggs: BTreeMap<String, TermsAggregation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl CountRequest {
    pub fn fingerprint(&self) -> Result<String> {
        let mut blank = self.clone();
        blank.uuid = None;
        fingerprint_json(&blank)
    }

    pub fn seal(&mut self) -> Result<String> {
        let fingerprint = self.fingerprint()?;
        self.uuid = Some(fingerprint.clone());
        Ok(fingerprint)
    }

    pub fn correlation_key(&self) -> Result<String> {
        match &self.uuid {
            Some(uuid) => Ok(uuid.clone()),
            None => self.fingerprint(),
        }
    }
}

pub(crate) fn fingerprint_json<T: Serialize>(value: &T) -> Result<String> {
    use sha2::{Digest, Sha256};

    let canonical = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Either a filtered query (search) or a bare one (autocomplete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryContainer {
    Filtered { filtered: FilteredQuery },
    Plain(BaseQuery),
}

impl QueryContainer {
    pub fn filtered(query: BaseQuery, filter: Option<BoolFilter>) -> Self {
        QueryContainer::Filtered {
            filtered: FilteredQuery {
                query,
                filter: filter.map(|bool_filter| FilterContainer { bool_filter }),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredQuery {
    pub query: BaseQuery,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterContainer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterContainer {
    #[serde(rename = "bool")]
    pub bool_filter: BoolFilter,
}

/// The scoring part of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BaseQuery {
    MatchAll {
        match_all: MatchAllBody,
    },
    MultiMatch {
        multi_match: MultiMatchBody,
    },
    MatchPhrasePrefix {
        match_phrase_prefix: BTreeMap<String, PhrasePrefixBody>,
    },
}

impl BaseQuery {
    pub fn match_all() -> Self {
        BaseQuery::MatchAll {
            match_all: MatchAllBody {},
        }
    }

    pub fn multi_match(text: impl Into<String>, fields: Vec<String>, analyzer: impl Into<String>) -> Self {
        BaseQuery::MultiMatch {
            multi_match: MultiMatchBody {
                query: text.into(),
                fields,
                analyzer: analyzer.into(),
            },
        }
    }

    pub fn phrase_prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        BaseQuery::MatchPhrasePrefix {
            match_phrase_prefix: BTreeMap::from([(
                field.into(),
                PhrasePrefixBody {
                    query: prefix.into(),
                },
            )]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAllBody {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMatchBody {
    pub query: String,

    /// Field list with `^boost` suffixes already applied
    pub fields: Vec<String>,

    pub analyzer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhrasePrefixBody {
    pub query: String,
}

/// One clause inside a bool filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterClause {
    Terms {
        terms: TermsBody,
    },
    Term {
        term: BTreeMap<String, bool>,
    },
    Range {
        range: BTreeMap<String, RangeBounds>,
    },
    Bool {
        #[serde(rename = "bool")]
        bool_filter: BoolFilter,
    },
}

impl FilterClause {
    /// AND-semantics terms clause over a keyword field
    pub fn terms(field: impl Into<String>, values: Vec<String>) -> Self {
        FilterClause::Terms {
            terms: TermsBody {
                execution: "and".to_string(),
                fields: BTreeMap::from([(field.into(), values)]),
            },
        }
    }

    /// Exact-value clause for an enabled boolean facet
    pub fn flag(field: impl Into<String>) -> Self {
        FilterClause::Term {
            term: BTreeMap::from([(field.into(), true)]),
        }
    }

    pub fn range(field: impl Into<String>, bounds: RangeBounds) -> Self {
        FilterClause::Range {
            range: BTreeMap::from([(field.into(), bounds)]),
        }
    }

    /// Nested bool clause, used for date overlap groups
    pub fn group(filter: BoolFilter) -> Self {
        FilterClause::Bool {
            bool_filter: filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsBody {
    /// Always "and": a document must carry every selected term
    pub execution: String,

    #[serde(flatten)]
    pub fields: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<String>,
}

impl RangeBounds {
    pub fn gte(value: impl Into<String>) -> Self {
        Self {
            gte: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn lte(value: impl Into<String>) -> Self {
        Self {
            lte: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn gt(value: impl Into<String>) -> Self {
        Self {
            gt: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn lt(value: impl Into<String>) -> Self {
        Self {
            lt: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn between(from: Option<String>, to: Option<String>) -> Self {
        Self {
            gte: from,
            lte: to,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<FilterClause>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<FilterClause>,
}

impl BoolFilter {
    pub fn must(clauses: Vec<FilterClause>) -> Self {
        Self {
            must: clauses,
            should: Vec::new(),
        }
    }

    pub fn should(clauses: Vec<FilterClause>) -> Self {
        Self {
            must: Vec::new(),
            should: clauses,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub order: SortDirection,
}

/// Terms aggregation over one field; `size: 0` asks for every bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsAggregation {
    pub terms: TermsAggregationBody,
}

impl TermsAggregation {
    pub fn over(field: impl Into<String>) -> Self {
        Self {
            terms: TermsAggregationBody {
                field: field.into(),
                size: 0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsAggregationBody {
    pub field: String,

    pub size: u64,
}
