//! Authenticated WebSocket channel to the search backend.
//!
//! A single connection multiplexes every in-flight request. The frame for
//! a given correlation id is written once, by the first caller waiting on
//! that id; later callers with the same id attach to the pending entry
//! instead of re-sending. A reader task fans replies out by id, answers
//! keepalives and, when the connection drops, rejects everything pending
//! so no caller is left hanging.

pub mod auth;
pub mod protocol;

pub use auth::{AuthClient, SessionToken};
pub use protocol::{ClientFrame, ServerFrame};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use crate::models::{AggregationPayload, ResultPayload};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, tungstenite::Message>;
type PendingWaiters = Vec<oneshot::Sender<Result<ServerResponse>>>;
type SharedConnect = Shared<BoxFuture<'static, Result<()>>>;

/// Lifecycle of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Authentication was rejected; stays failed until the next explicit
    /// connection attempt
    Failed,
}

/// Payload of a correlated reply
#[derive(Debug, Clone)]
pub enum ServerResponse {
    Result(ResultPayload),
    Counts(AggregationPayload),
}

/// Handle to the shared connection. Cheap to clone.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelCore>,
}

struct ChannelCore {
    config: ChannelConfig,
    auth: AuthClient,
    state: parking_lot::RwLock<ChannelState>,
    token: parking_lot::Mutex<Option<SessionToken>>,
    sink: tokio::sync::Mutex<Option<WsSink>>,
    pending: DashMap<String, PendingWaiters>,
    connect_slot: tokio::sync::Mutex<Option<SharedConnect>>,
    /// Id of the connection currently installed; readers of replaced
    /// connections must not tear the new one down
    current_connection: parking_lot::Mutex<Option<Uuid>>,
}

impl Channel {
    pub fn new(config: ChannelConfig) -> Result<Self> {
        let auth = AuthClient::new(config.auth.clone(), config.connect_timeout_secs)?;

        Ok(Self {
            inner: Arc::new(ChannelCore {
                config,
                auth,
                state: parking_lot::RwLock::new(ChannelState::Disconnected),
                token: parking_lot::Mutex::new(None),
                sink: tokio::sync::Mutex::new(None),
                pending: DashMap::new(),
                connect_slot: tokio::sync::Mutex::new(None),
                current_connection: parking_lot::Mutex::new(None),
            }),
        })
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.read()
    }

    /// Establish the connection if it is not already up.
    ///
    /// Concurrent callers share a single attempt; its outcome is delivered
    /// to all of them. A previous authentication failure does not block a
    /// new attempt.
    pub async fn connect(&self) -> Result<()> {
        let shared = {
            let mut slot = self.inner.connect_slot.lock().await;
            if *self.inner.state.read() == ChannelState::Connected {
                return Ok(());
            }
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let core = Arc::clone(&self.inner);
                    let attempt = async move {
                        let outcome = ChannelCore::establish(&core).await;
                        *core.connect_slot.lock().await = None;
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };
        shared.await
    }

    /// Send a request frame and wait for its correlated reply.
    ///
    /// The channel is dialed lazily, so the first request after a drop
    /// transparently reconnects.
    pub async fn send(&self, frame: ClientFrame) -> Result<ServerResponse> {
        let uuid = frame
            .uuid()
            .ok_or_else(|| {
                Error::Serialization("request frame is missing a correlation id".to_string())
            })?
            .to_string();

        self.connect().await?;

        let (tx, rx) = oneshot::channel();
        let first_waiter = {
            let mut entry = self.inner.pending.entry(uuid.clone()).or_default();
            entry.push(tx);
            entry.len() == 1
        };

        if first_waiter {
            if let Err(err) = self.inner.write_frame(&frame).await {
                // Nothing was sent; nobody will answer this id
                self.inner.fail_pending(&uuid, &err);
                return Err(err);
            }
            debug!(uuid = %uuid, "Request frame sent");
        } else {
            debug!(uuid = %uuid, "Joined in-flight request");
        }

        let timeout = Duration::from_secs(self.inner.config.request_timeout_secs);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::Transport(
                "request abandoned before a reply arrived".to_string(),
            )),
            Err(_) => {
                warn!(uuid = %uuid, timeout_secs = self.inner.config.request_timeout_secs, "Request timed out");
                let err = Error::Timeout(timeout.as_millis() as u64);
                self.inner.fail_pending(&uuid, &err);
                Err(err)
            }
        }
    }

    /// Close the connection and reject everything still pending. The next
    /// send dials a fresh connection.
    pub async fn close(&self) {
        let Some(connection_id) = *self.inner.current_connection.lock() else {
            return;
        };
        {
            let mut sink = self.inner.sink.lock().await;
            if let Some(sink) = sink.as_mut() {
                let _ = sink.send(tungstenite::Message::Close(None)).await;
            }
        }
        self.inner.teardown(connection_id, "closed by client").await;
    }
}

impl ChannelCore {
    async fn establish(core: &Arc<ChannelCore>) -> Result<()> {
        core.set_state(ChannelState::Connecting);

        // Reuse a live session token, otherwise fetch a fresh one
        let cached = core.token.lock().clone();
        let token = match cached {
            Some(token) if !token.is_expired(core.config.auth.token_max_age_secs) => token,
            _ => match core.auth.acquire().await {
                Ok(token) => {
                    *core.token.lock() = Some(token.clone());
                    token
                }
                Err(err) => {
                    if matches!(err, Error::Auth { .. }) {
                        *core.token.lock() = None;
                        core.set_state(ChannelState::Failed);
                    } else {
                        core.set_state(ChannelState::Disconnected);
                    }
                    return Err(err);
                }
            },
        };

        let url = format!(
            "{}?token={}",
            core.config.host,
            utf8_percent_encode(&token.token, NON_ALPHANUMERIC)
        );

        let upgrade = tokio::time::timeout(
            Duration::from_secs(core.config.connect_timeout_secs),
            connect_async(url),
        )
        .await;

        let (stream, _response) = match upgrade {
            Err(_) => {
                core.set_state(ChannelState::Disconnected);
                return Err(Error::Timeout(core.config.connect_timeout_secs * 1000));
            }
            Ok(Err(tungstenite::Error::Http(response))) => {
                let status = response.status().as_u16();
                if status == 401 || status == 403 {
                    // The token was not good enough; force a fresh one next time
                    *core.token.lock() = None;
                    core.set_state(ChannelState::Failed);
                    return Err(Error::Auth {
                        status,
                        message: "connection upgrade rejected".to_string(),
                    });
                }
                core.set_state(ChannelState::Disconnected);
                return Err(Error::Transport(format!(
                    "connection upgrade failed with status {}",
                    status
                )));
            }
            Ok(Err(e)) => {
                core.set_state(ChannelState::Disconnected);
                return Err(Error::Transport(format!("connection failed: {}", e)));
            }
            Ok(Ok(pair)) => pair,
        };

        let (sink, stream) = stream.split();
        let connection_id = Uuid::new_v4();
        *core.sink.lock().await = Some(sink);
        *core.current_connection.lock() = Some(connection_id);
        core.set_state(ChannelState::Connected);

        info!(connection_id = %connection_id, host = %core.config.host, "Search channel connected");

        let reader = Arc::clone(core);
        tokio::spawn(async move {
            reader.read_loop(stream, connection_id).await;
        });

        Ok(())
    }

    async fn read_loop(self: Arc<Self>, mut stream: SplitStream<WsStream>, connection_id: Uuid) {
        while let Some(message) = stream.next().await {
            match message {
                Ok(tungstenite::Message::Text(text)) => self.dispatch_text(&text).await,
                Ok(tungstenite::Message::Close(_)) => {
                    info!(connection_id = %connection_id, "Backend closed the connection");
                    break;
                }
                // Protocol pings are answered by the transport itself
                Ok(_) => {}
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "Connection error");
                    break;
                }
            }
        }
        self.teardown(connection_id, "connection lost").await;
    }

    async fn dispatch_text(&self, text: &str) {
        let frame: ServerFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Discarding unparseable frame");
                return;
            }
        };

        match frame {
            ServerFrame::Result { uuid, payload } => {
                self.resolve(&uuid, Ok(ServerResponse::Result(payload)));
            }
            ServerFrame::Counts { uuid, aggregations } => {
                self.resolve(&uuid, Ok(ServerResponse::Counts(aggregations)));
            }
            ServerFrame::SearchError { uuid, message } => match uuid {
                Some(uuid) => self.resolve(&uuid, Err(Error::Backend(message))),
                None => error!(message = %message, "Backend error without a correlation id"),
            },
            ServerFrame::Ping => {
                if let Err(e) = self.write_frame(&ClientFrame::Pong).await {
                    warn!(error = %e, "Failed to answer keepalive");
                }
            }
        }
    }

    /// Deliver a reply to every waiter registered under `uuid`.
    fn resolve(&self, uuid: &str, outcome: Result<ServerResponse>) {
        match self.pending.remove(uuid) {
            Some((_, waiters)) => {
                debug!(uuid = %uuid, waiters = waiters.len(), "Reply delivered");
                for waiter in waiters {
                    let _ = waiter.send(outcome.clone());
                }
            }
            None => warn!(uuid = %uuid, "Reply without a pending request"),
        }
    }

    fn fail_pending(&self, uuid: &str, err: &Error) {
        if let Some((_, waiters)) = self.pending.remove(uuid) {
            for waiter in waiters {
                let _ = waiter.send(Err(err.clone()));
            }
        }
    }

    async fn write_frame(&self, frame: &ClientFrame) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err(Error::Transport("channel is not connected".to_string()));
        };
        sink.send(tungstenite::Message::Text(text))
            .await
            .map_err(|e| Error::Transport(format!("failed to write frame: {}", e)))
    }

    /// Tear down `connection_id`, unless it has already been replaced by a
    /// newer connection. A reader that outlives a close/redial cycle must
    /// not clear the fresh sink or reject the fresh waiters.
    async fn teardown(&self, connection_id: Uuid, reason: &str) {
        {
            let mut current = self.current_connection.lock();
            if *current != Some(connection_id) {
                debug!(connection_id = %connection_id, "Skipping teardown of a replaced connection");
                return;
            }
            *current = None;
        }

        *self.sink.lock().await = None;
        // An authentication failure stays visible through the state
        if *self.state.read() != ChannelState::Failed {
            self.set_state(ChannelState::Disconnected);
        }

        let stranded: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        if !stranded.is_empty() {
            info!(stranded = stranded.len(), reason = reason, "Rejecting pending requests");
        }
        for uuid in stranded {
            self.fail_pending(&uuid, &Error::Transport(reason.to_string()));
        }
    }

    fn set_state(&self, next: ChannelState) {
        let mut state = self.state.write();
        if *state != next {
            debug!(from = %*state, to = %next, "Channel state changed");
            *state = next;
        }
    }
}
