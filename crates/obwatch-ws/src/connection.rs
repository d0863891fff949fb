//! WebSocket connection manager.
//!
//! Handles the connection lifecycle for one upstream stream: session start and
//! teardown, subscription on open, inbound frame dispatch with sequence
//! checking, and fixed-delay reconnection.
//!
//! Every session carries a generation id. Callbacks from the session task check
//! it before touching state, so a superseded session can never mutate the
//! current one.

use crate::error::{WsError, WsResult};
use crate::message::{InboundMessage, ServerNotice, StreamEvent};
use crate::reconnect::{ReconnectPolicy, DEFAULT_RECONNECT_DELAY_MS};
use crate::sequence::{SequenceCheck, SequenceCursor};
use crate::subscription::{SubscriptionRequest, SubscriptionStatus, SubscriptionTarget};
use crate::ws_write_handle::WsWriteHandle;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use obwatch_telemetry::Metrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_STREAMER_URL: &str = "wss://streamer.cryptocompare.com/v2";

/// Connection configuration.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Streamer base URL.
    pub url: String,
    /// API key appended as `api_key` query parameter.
    pub api_key: Option<String>,
    pub subscription: SubscriptionTarget,
    /// Fixed delay before a scheduled reconnect.
    pub reconnect_delay_ms: u64,
    /// Outbound queue capacity per session.
    pub outbound_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAMER_URL.to_string(),
            api_key: None,
            subscription: SubscriptionTarget::default(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            outbound_buffer: 100,
        }
    }
}

// api_key stays out of Debug output.
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("subscription", &self.subscription)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("outbound_buffer", &self.outbound_buffer)
            .finish()
    }
}

impl ConnectionConfig {
    /// Full endpoint including the API key, percent-encoded as a query pair.
    pub fn endpoint(&self) -> WsResult<String> {
        let mut url = Url::parse(&self.url)?;
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            url.query_pairs_mut().append_pair("api_key", key);
        }
        Ok(url.into())
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Client rejection reported by the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Unauthorized,
    RateLimited,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// Last rejection seen. Cleared on the next successful open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Point-in-time view of the connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub is_loading: bool,
    pub generation: u64,
    pub channel: String,
    pub last_sequence: Option<u64>,
    pub last_rejection: Option<Rejection>,
    pub reconnect_pending: bool,
    pub reconnect_count: u64,
    pub subscription: SubscriptionStatus,
}

pub(crate) struct Session {
    pub(crate) generation: u64,
    cancel: CancellationToken,
    pub(crate) outbound_tx: mpsc::Sender<String>,
}

pub(crate) struct Inner {
    pub(crate) state: ConnectionState,
    is_loading: bool,
    generation: u64,
    pub(crate) session: Option<Session>,
    cursor: SequenceCursor,
    reconnect: ReconnectPolicy,
    subscription: SubscriptionStatus,
    last_rejection: Option<Rejection>,
    reconnect_count: u64,
    open_attempts: u64,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        Metrics::ws_state_set(state.as_str());
    }

    /// Cancel and drop the current session. Returns true if one existed.
    fn teardown(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        session.cancel.cancel();
        self.cursor.clear();
        self.subscription.reset();
        self.set_state(ConnectionState::Disconnected);
        true
    }
}

/// What to do once the state lock is released.
enum Dispatch {
    Forward(StreamEvent),
    Reconnect(&'static str),
    Nothing,
}

/// WebSocket connection manager.
///
/// Cheap to clone; clones share the same connection. `connect`, `disconnect`
/// and `reconnect` return immediately and must be called from within a Tokio
/// runtime.
#[derive(Clone)]
pub struct ConnectionManager {
    config: Arc<ConnectionConfig>,
    inner: Arc<Mutex<Inner>>,
    events_tx: mpsc::Sender<StreamEvent>,
}

impl ConnectionManager {
    /// Create a new connection manager forwarding accepted updates to `events_tx`.
    pub fn new(config: ConnectionConfig, events_tx: mpsc::Sender<StreamEvent>) -> Self {
        let reconnect = ReconnectPolicy::new(Duration::from_millis(config.reconnect_delay_ms));
        Self {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                is_loading: false,
                generation: 0,
                session: None,
                cursor: SequenceCursor::new(),
                reconnect,
                subscription: SubscriptionStatus::default(),
                last_rejection: None,
                reconnect_count: 0,
                open_attempts: 0,
            })),
            events_tx,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get a write handle for sending messages.
    pub fn write_handle(&self) -> WsWriteHandle {
        WsWriteHandle::new(self.inner.clone())
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Open a session unless one is already connecting or connected.
    pub fn connect(&self) {
        let mut inner = self.inner.lock();
        if inner.session.is_some()
            && matches!(
                inner.state,
                ConnectionState::Connecting | ConnectionState::Connected
            )
        {
            debug!(state = ?inner.state, "connect() ignored, session already active");
            return;
        }
        if inner.reconnect.supersede() {
            debug!("Pending reconnect superseded by connect()");
        }
        self.start_session(&mut inner);
    }

    /// Close the current session. Idempotent.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();
        let superseded = inner.reconnect.supersede();
        let had_session = inner.teardown();
        if superseded || had_session {
            inner.is_loading = false;
            info!(had_session, superseded, "Disconnected");
        }
    }

    /// Drop the current session and connect again after the fixed delay.
    pub fn reconnect(&self) {
        self.schedule_reconnect("manual");
    }

    /// Send a text frame. Dropped unless connected.
    pub fn send_message(&self, text: impl Into<String>) -> bool {
        match self.write_handle().send_text(text.into()) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Outbound message dropped");
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().is_loading
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.inner.lock().cursor.last()
    }

    pub fn last_rejection(&self) -> Option<Rejection> {
        self.inner.lock().last_rejection.clone()
    }

    /// Reconnects scheduled since creation.
    pub fn reconnect_count(&self) -> u64 {
        self.inner.lock().reconnect_count
    }

    /// Sessions started since creation.
    pub fn open_attempts(&self) -> u64 {
        self.inner.lock().open_attempts
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.inner.lock().reconnect.is_pending()
    }

    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.inner.lock().subscription
    }

    pub fn status(&self) -> ConnectionStatus {
        let inner = self.inner.lock();
        ConnectionStatus {
            state: inner.state,
            is_loading: inner.is_loading,
            generation: inner.generation,
            channel: self.config.subscription.channel(),
            last_sequence: inner.cursor.last(),
            last_rejection: inner.last_rejection.clone(),
            reconnect_pending: inner.reconnect.is_pending(),
            reconnect_count: inner.reconnect_count,
            subscription: inner.subscription,
        }
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    fn start_session(&self, inner: &mut Inner) {
        inner.generation += 1;
        inner.open_attempts += 1;
        inner.is_loading = true;
        inner.cursor.clear();
        inner.subscription.reset();
        inner.set_state(ConnectionState::Connecting);

        let generation = inner.generation;
        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_buffer.max(1));
        inner.session = Some(Session {
            generation,
            cancel: cancel.clone(),
            outbound_tx,
        });

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_session(generation, cancel, outbound_rx).await;
        });
    }

    fn schedule_reconnect(&self, reason: &'static str) {
        let (ticket, delay) = {
            let mut inner = self.inner.lock();
            let Some(ticket) = inner.reconnect.try_schedule() else {
                debug!(reason, "Reconnect already pending");
                return;
            };
            inner.teardown();
            inner.is_loading = true;
            inner.reconnect_count += 1;
            (ticket, inner.reconnect.delay())
        };

        Metrics::ws_reconnect(reason);
        warn!(reason, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.fire_scheduled_reconnect(ticket);
        });
    }

    fn fire_scheduled_reconnect(&self, ticket: u64) {
        let mut inner = self.inner.lock();
        if !inner.reconnect.take(ticket) {
            debug!(ticket, "Reconnect timer superseded");
            return;
        }
        if inner.session.is_some() {
            return;
        }
        info!(ticket, "Reconnecting");
        self.start_session(&mut inner);
    }

    async fn run_session(
        &self,
        generation: u64,
        cancel: CancellationToken,
        mut outbound_rx: mpsc::Receiver<String>,
    ) {
        info!(
            url = %self.config.url,
            channel = %self.config.subscription.channel(),
            generation,
            "Connecting to WebSocket"
        );

        let endpoint = match self.config.endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.on_error(generation, e).await;
                return;
            }
        };
        let opened = tokio::select! {
            () = cancel.cancelled() => {
                debug!(generation, "Session cancelled before open");
                return;
            }
            result = connect_async_tls_with_config(endpoint.as_str(), None, true, None) => result,
        };

        let ws_stream = match opened {
            Ok((stream, _response)) => stream,
            Err(e) => {
                self.on_error(generation, e.into()).await;
                return;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        let request = SubscriptionRequest::sub_add(&self.config.subscription)
            .to_text()
            .map_err(WsError::from);
        let Some(subscribe) = self.complete_open(generation, request).await else {
            let _ = write.send(Message::Close(None)).await;
            return;
        };
        if let Err(e) = write.send(Message::Text(subscribe)).await {
            self.on_error(generation, e.into()).await;
            return;
        }

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!(generation, "Session cancelled, closing");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(?e, "Failed to send Close frame");
                    }
                    return;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(generation, &text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                self.on_error(generation, e.into()).await;
                                return;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            self.on_close(generation, code, &reason);
                            return;
                        }
                        Some(Err(e)) => {
                            self.on_error(generation, e.into()).await;
                            return;
                        }
                        None => {
                            self.on_close(generation, 1006, "Stream ended");
                            return;
                        }
                        _ => {}
                    }
                }

                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                self.on_error(generation, e.into()).await;
                                return;
                            }
                        }
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Returns the subscription frame to send, or `None` if the session is
    /// stale or failed to open. A failure goes through `on_error`.
    async fn complete_open(&self, generation: u64, request: WsResult<String>) -> Option<String> {
        match self.on_open(generation, request) {
            Ok(subscribe) => subscribe,
            Err(e) => {
                self.on_error(generation, e).await;
                None
            }
        }
    }

    /// Returns the subscription frame to send if the session is still current.
    fn on_open(&self, generation: u64, request: WsResult<String>) -> WsResult<Option<String>> {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            debug!(generation, "Stale session opened, discarding");
            return Ok(None);
        }
        let request = request?;

        inner.set_state(ConnectionState::Connected);
        inner.is_loading = false;
        inner.last_rejection = None;
        info!(
            generation,
            channel = %self.config.subscription.channel(),
            "WebSocket connected, subscribing"
        );
        Ok(Some(request))
    }

    fn on_close(&self, generation: u64, code: u16, reason: &str) {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            return;
        }
        inner.teardown();
        inner.is_loading = false;
        warn!(generation, code, reason, "WebSocket closed");
    }

    async fn on_error(&self, generation: u64, err: WsError) {
        {
            let mut inner = self.inner.lock();
            if !inner.is_current(generation) {
                debug!(generation, error = %err, "Error from stale session ignored");
                return;
            }
            inner.teardown();
            inner.is_loading = false;
        }
        error!(generation, error = %err, "WebSocket error");

        if self.events_tx.send(StreamEvent::Reset).await.is_err() {
            warn!("Event receiver dropped");
        }
    }

    async fn handle_text_message(&self, generation: u64, text: &str) {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                Metrics::ws_decode_error();
                warn!(error = %e, "Dropping undecodable frame");
                return;
            }
        };
        Metrics::ws_message(message.kind_label());

        let (dispatch, cancel) = {
            let mut inner = self.inner.lock();
            let Some(cancel) = inner
                .session
                .as_ref()
                .filter(|s| s.generation == generation)
                .map(|s| s.cancel.clone())
            else {
                debug!(generation, kind = message.kind_label(), "Frame from stale session ignored");
                return;
            };
            (Self::dispatch(&mut inner, message), cancel)
        };

        match dispatch {
            Dispatch::Forward(event) => {
                // A full consumer channel must not let a torn-down session
                // deliver after the fact.
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        debug!(generation, "Session torn down while forwarding, event dropped");
                    }
                    sent = self.events_tx.send(event) => {
                        if sent.is_err() {
                            warn!("Event receiver dropped");
                        }
                    }
                }
            }
            Dispatch::Reconnect(reason) => self.schedule_reconnect(reason),
            Dispatch::Nothing => {}
        }
    }

    fn dispatch(inner: &mut Inner, message: InboundMessage) -> Dispatch {
        match message {
            InboundMessage::Update(update) => match inner.cursor.accept(update.sequence) {
                SequenceCheck::Accepted => Dispatch::Forward(StreamEvent::Update(update)),
                SequenceCheck::Gap { expected, received } => {
                    Metrics::sequence_gap();
                    warn!(?expected, received, "Sequence gap detected");
                    Dispatch::Reconnect("sequence_gap")
                }
            },
            InboundMessage::Snapshot { sequence } => {
                inner.cursor.reset_to(sequence);
                debug!(sequence, "Snapshot received, cursor re-baselined");
                Dispatch::Nothing
            }
            InboundMessage::ServerError(notice) => {
                error!(notice = %notice.describe(), "Server error");
                Dispatch::Reconnect("server_error")
            }
            InboundMessage::Unauthorized(notice) => {
                Self::record_rejection(inner, RejectionKind::Unauthorized, &notice);
                Dispatch::Nothing
            }
            InboundMessage::RateLimited(notice) => {
                Self::record_rejection(inner, RejectionKind::RateLimited, &notice);
                Dispatch::Nothing
            }
            InboundMessage::SubscribeComplete => {
                inner.subscription.mark_subscribed(Utc::now());
                info!("Subscription complete");
                Dispatch::Nothing
            }
            InboundMessage::LoadComplete => {
                inner.subscription.mark_loaded();
                debug!("Load complete");
                Dispatch::Nothing
            }
            InboundMessage::Unknown(kind) => {
                debug!(%kind, "Unknown message type");
                Dispatch::Nothing
            }
            other => {
                debug!(kind = other.kind_label(), "Control frame");
                Dispatch::Nothing
            }
        }
    }

    fn record_rejection(inner: &mut Inner, kind: RejectionKind, notice: &ServerNotice) {
        let message = notice.describe();
        Metrics::rejection(kind.as_str());
        warn!(kind = kind.as_str(), %message, "Client rejected by upstream");
        inner.last_rejection = Some(Rejection {
            kind,
            message,
            at: Utc::now(),
        });
    }
}
