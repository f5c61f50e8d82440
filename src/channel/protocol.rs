//! Wire protocol for the search channel.
//!
//! Frames are JSON text messages tagged by `type`. Every request carries
//! its fingerprint as `uuid` and the backend echoes it on the matching
//! reply, so any number of requests can share one connection.

use serde::{Deserialize, Serialize};

use crate::compiler::{CompiledRequest, CountRequest};
use crate::models::{AggregationPayload, ResultPayload};

/// Frame sent from client to backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Execute a search
    Search {
        #[serde(flatten)]
        request: CompiledRequest,
    },
    /// Fetch facet counts only
    Count {
        #[serde(flatten)]
        request: CountRequest,
    },
    /// Keepalive reply
    Pong,
}

impl ClientFrame {
    /// Correlation id the reply will carry
    pub fn uuid(&self) -> Option<&str> {
        match self {
            ClientFrame::Search { request } => request.uuid.as_deref(),
            ClientFrame::Count { request } => request.uuid.as_deref(),
            ClientFrame::Pong => None,
        }
    }
}

/// Frame sent from backend to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Hits and optional aggregations for one search
    Result {
        uuid: String,
        #[serde(flatten)]
        payload: ResultPayload,
    },
    /// Facet counts for one count request
    Counts {
        uuid: String,
        aggregations: AggregationPayload,
    },
    /// Request failure; `uuid` is absent only for connection-scoped errors
    #[serde(rename = "searchError")]
    SearchError {
        #[serde(default)]
        uuid: Option<String>,
        message: String,
    },
    /// Keepalive
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    use crate::compiler::{BaseQuery, QueryContainer};

    #[test]
    fn test_search_frame_carries_type_and_uuid() {
        let mut request = CompiledRequest {
            index: "documents".to_string(),
            query: QueryContainer::filtered(BaseQuery::match_all(), None),
            sort: BTreeMap::new(),
            aggs: BTreeMap::new(),
            size: None,
            from: None,
            uuid: None,
        };
        request.seal().unwrap();
        let frame = ClientFrame::Search { request };

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "search");
        assert_eq!(value["index"], "documents");
        assert_eq!(frame.uuid().map(str::len), Some(64));
    }

    #[test]
    fn test_result_frame_round_trip() {
        let text = json!({
            "type": "result",
            "uuid": "abc",
            "hits": [{"title": "LLM ops"}],
            "total": 1,
            "aggregations": {"topic": {"buckets": [{"key": "ml", "doc_count": 1}]}}
        })
        .to_string();

        let frame: ServerFrame = serde_json::from_str(&text).unwrap();
        match frame {
            ServerFrame::Result { uuid, payload } => {
                assert_eq!(uuid, "abc");
                assert_eq!(payload.total, 1);
                assert_eq!(payload.hits.len(), 1);
                assert!(payload.aggregations.is_some());
            }
            other => panic!("expected result frame, got {other:?}"),
        }
    }

    #[test]
    fn test_error_frame_uuid_is_optional() {
        let correlated: ServerFrame =
            serde_json::from_str(r#"{"type": "searchError", "uuid": "abc", "message": "boom"}"#)
                .unwrap();
        match correlated {
            ServerFrame::SearchError { uuid, message } => {
                assert_eq!(uuid.as_deref(), Some("abc"));
                assert_eq!(message, "boom");
            }
            other => panic!("expected error frame, got {other:?}"),
        }

        let uncorrelated: ServerFrame =
            serde_json::from_str(r#"{"type": "searchError", "message": "boom"}"#).unwrap();
        match uncorrelated {
            ServerFrame::SearchError { uuid, .. } => assert!(uuid.is_none()),
            other => panic!("expected error frame, got {other:?}"),
        }
    }

    #[test]
    fn test_keepalive_frames() {
        let ping: ServerFrame = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert!(matches!(ping, ServerFrame::Ping));
        assert_eq!(serde_json::to_string(&ClientFrame::Pong).unwrap(), r#"{"type":"pong"}"#);
    }
}
