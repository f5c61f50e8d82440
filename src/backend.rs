//! Seam between the proxy and whatever executes compiled requests.

use async_trait::async_trait;
use std::sync::Arc;

use crate::channel::{Channel, ClientFrame, ServerResponse};
use crate::compiler::{CompiledRequest, CountRequest};
use crate::error::{Error, Result};
use crate::models::{AggregationPayload, ResultPayload};

/// Executes compiled requests against a search backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a full search and return hits plus aggregations
    async fn execute(&self, request: &CompiledRequest) -> Result<ResultPayload>;

    /// Run an aggregation-only count request
    async fn count(&self, request: &CountRequest) -> Result<AggregationPayload>;
}

/// Backend that talks to the node search service over the channel.
pub struct NodeBackend {
    channel: Arc<Channel>,
}

impl NodeBackend {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SearchBackend for NodeBackend {
    async fn execute(&self, request: &CompiledRequest) -> Result<ResultPayload> {
        let frame = ClientFrame::Search {
            request: request.clone(),
        };
        match self.channel.send(frame).await? {
            ServerResponse::Result(payload) => Ok(payload),
            ServerResponse::Counts(_) => Err(Error::Backend(
                "counts reply to a search request".to_string(),
            )),
        }
    }

    async fn count(&self, request: &CountRequest) -> Result<AggregationPayload> {
        let frame = ClientFrame::Count {
            request: request.clone(),
        };
        match self.channel.send(frame).await? {
            ServerResponse::Counts(aggregations) => Ok(aggregations),
            ServerResponse::Result(payload) => {
                // Some backends answer counts with a full result envelope
                payload.aggregations.ok_or_else(|| {
                    Error::Backend("count reply carried no aggregations".to_string())
                })
            }
        }
    }
}
