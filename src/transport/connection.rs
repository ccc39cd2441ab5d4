//! Debugging-socket connection and event loop.
//!
//! This module owns the WebSocket to the browser's remote-debugging
//! endpoint, including request/response correlation and event routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Inbound frames from the browser (responses, events)
//! - Outbound commands from the host API
//! - Request/response correlation by monotonic request ID
//! - Event handler callbacks keyed by event method
//!
//! Every inbound frame is parsed once and dispatched by a single
//! first-match rule: a frame with an `id` matching a pending request
//! resolves that request; otherwise a frame with a `method` matching a
//! registered handler invokes it; anything else is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};
use crate::protocol::{CdpError, Command, EvaluateResult, Request};

// ============================================================================
// Types
// ============================================================================

/// WebSocket stream to the debugging endpoint.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Value>>>;

/// Event handler callback type.
///
/// Called with the event's `params` object. Handlers run on the event-loop
/// task and must not block; hand work off through a channel.
pub type EventHandler = Box<dyn Fn(Value) + Send + Sync>;

/// Map of event method names to handlers. One handler per method; a later
/// registration replaces the earlier one.
type HandlerMap = FxHashMap<String, EventHandler>;

// ============================================================================
// ConnectionInfo
// ============================================================================

/// Metadata discovered from the debugging endpoint's `/json/version` path.
///
/// Immutable once fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionInfo {
    /// Browser product and version string.
    #[serde(rename = "Browser", default)]
    pub browser: String,

    /// DevTools protocol version.
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,

    /// User agent the browser reports.
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,

    /// V8 engine version.
    #[serde(rename = "V8-Version", default)]
    pub v8_version: String,

    /// WebKit/Blink engine version string.
    #[serde(rename = "WebKit-Version", default)]
    pub webkit_version: String,

    /// WebSocket endpoint address for the browser-level debugging socket.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for its response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Value>>,
    },
    /// Remove a correlation entry abandoned by a timed-out caller.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Connection to the browser's remote-debugging socket.
///
/// Handles request/response correlation and event routing. The connection
/// spawns an internal event-loop task on creation.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone; clones share the same
/// socket, correlation table and handler table.
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Event handlers (shared with event loop).
    handlers: Arc<Mutex<HandlerMap>>,
    /// Next request ID. Host-scoped, starts at 0.
    next_id: Arc<AtomicU64>,
    /// Metadata fetched during connect.
    info: Arc<ConnectionInfo>,
    /// Default timeout applied by `send`. `None` (the default) waits forever.
    command_timeout: Option<Duration>,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            correlation: Arc::clone(&self.correlation),
            handlers: Arc::clone(&self.handlers),
            next_id: Arc::clone(&self.next_id),
            info: Arc::clone(&self.info),
            command_timeout: self.command_timeout,
        }
    }
}

impl Connection {
    /// Connects to the debugging endpoint on the given local port.
    ///
    /// Fetches [`ConnectionInfo`] from `/json/version`, opens the WebSocket
    /// at the address it reports, and spawns the event-loop task. Completes
    /// only once the socket is open.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] if the metadata fetch fails
    /// - [`Error::Connection`] if the socket never opens
    pub async fn connect(port: u16) -> Result<Self> {
        let info: ConnectionInfo = reqwest::get(format!("http://127.0.0.1:{port}/json/version"))
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(
            browser = %info.browser,
            protocol = %info.protocol_version,
            "Fetched debugging endpoint metadata"
        );

        // Connecting through the "localhost" alias can stall on hosts where
        // its resolution is slow; use the literal loopback address.
        let ws_url = info
            .web_socket_debugger_url
            .replace("localhost", "127.0.0.1");

        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|e| Error::connection(format!("WebSocket open failed: {e}")))?;

        debug!(url = %ws_url, "Debugging socket connected");

        Ok(Self::from_stream(ws_stream, info))
    }

    /// Creates a connection from an already-open WebSocket stream.
    ///
    /// Spawns the event-loop task internally.
    pub(crate) fn from_stream(ws_stream: WsStream, info: ConnectionInfo) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let handlers: Arc<Mutex<HandlerMap>> = Arc::new(Mutex::new(HandlerMap::default()));

        // Spawn event loop task
        let correlation_clone = Arc::clone(&correlation);
        let handlers_clone = Arc::clone(&handlers);

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            correlation_clone,
            handlers_clone,
        ));

        Self {
            command_tx,
            correlation,
            handlers,
            next_id: Arc::new(AtomicU64::new(0)),
            info: Arc::new(info),
            command_timeout: None,
        }
    }

    /// Sets a default timeout applied by every [`send`](Self::send).
    ///
    /// Off by default; the untimed behavior is the contract, this is the
    /// opt-out for hosts that prefer failing over leaking.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Returns the metadata fetched during connect.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Registers an event handler for the given event method.
    ///
    /// A later registration for the same method replaces the earlier one.
    pub fn on_event(&self, method: impl Into<String>, handler: EventHandler) {
        let method = method.into();
        let replaced = self.handlers.lock().insert(method.clone(), handler);
        if replaced.is_some() {
            debug!(%method, "Replaced existing event handler");
        }
    }

    /// Sends a command and waits for its response.
    ///
    /// By default no timeout is enforced: a response that never arrives
    /// suspends the caller forever and leaks the pending entry. Opt into a
    /// timeout with [`with_command_timeout`](Self::with_command_timeout) or
    /// per-call via [`send_with_timeout`](Self::send_with_timeout).
    ///
    /// # Errors
    ///
    /// - [`Error::Precondition`] if the connection is closed, or if the
    ///   command is session-scoped and `session_id` is `None`
    /// - [`Error::ConnectionClosed`] if the connection closes while waiting
    /// - [`Error::Cdp`] if the browser reports a command error
    pub async fn send(&self, command: Command, session_id: Option<&SessionId>) -> Result<Value> {
        if let Some(timeout) = self.command_timeout {
            return self.send_with_timeout(command, session_id, timeout).await;
        }

        let (_, response_rx) = self.submit(command, session_id)?;

        match response_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Sends a command and waits for its response, up to `request_timeout`.
    ///
    /// On timeout the pending entry is removed so a late response cannot
    /// resolve a caller that already gave up.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus [`Error::RequestTimeout`].
    pub async fn send_with_timeout(
        &self,
        command: Command,
        session_id: Option<&SessionId>,
        request_timeout: Duration,
    ) -> Result<Value> {
        let (request_id, response_rx) = self.submit(command, session_id)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Evaluates an expression in the page and unwraps the returned value.
    ///
    /// Convenience over `Runtime.evaluate` with `returnByValue`. Resolves to
    /// `Null` when the expression evaluates to `undefined`.
    ///
    /// # Errors
    ///
    /// - everything [`send`](Self::send) can return
    /// - [`Error::Script`] if the expression threw in the page
    pub async fn evaluate_result(&self, code: &str, session_id: &SessionId) -> Result<Value> {
        let value = self.send(Command::evaluate(code), Some(session_id)).await?;
        let evaluated: EvaluateResult = serde_json::from_value(value)?;

        if let Some(details) = evaluated.exception_details {
            let message = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("uncaught exception")
                .to_string();
            return Err(Error::script(message));
        }

        Ok(evaluated.result.value.unwrap_or(Value::Null))
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Shuts down the connection.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Allocates the next request ID and hands the request to the event
    /// loop. Returns the receiver the response will arrive on.
    fn submit(
        &self,
        command: Command,
        session_id: Option<&SessionId>,
    ) -> Result<(RequestId, oneshot::Receiver<Result<Value>>)> {
        if command.requires_session() && session_id.is_none() {
            return Err(Error::precondition(
                "session-scoped command issued without a session ID",
            ));
        }

        let request_id = RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = Request::new(request_id, command, session_id.cloned());

        let (response_tx, response_rx) = oneshot::channel();

        // No implicit queueing: a closed event loop rejects the send.
        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::precondition("send on closed connection"))?;

        Ok((request_id, response_rx))
    }

    /// Event loop that owns the socket halves.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        handlers: Arc<Mutex<HandlerMap>>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Inbound frames from the browser
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_frame(&text, &correlation, &handlers);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the host API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(%request_id, "Removed abandoned correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Fail all pending requests on shutdown
        Self::fail_pending_requests(&correlation);

        debug!("Event loop terminated");
    }

    /// Dispatches one inbound frame.
    ///
    /// Parsed once, matched once: pending `id` first, handler `method`
    /// second, silent drop third.
    fn handle_incoming_frame(
        text: &str,
        correlation: &Mutex<CorrelationMap>,
        handlers: &Mutex<HandlerMap>,
    ) {
        let frame: Value = match from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to parse inbound frame");
                return;
            }
        };

        if let Some(id) = frame.get("id").and_then(Value::as_u64) {
            let request_id = RequestId::new(id);
            let tx = correlation.lock().remove(&request_id);

            if let Some(tx) = tx {
                let outcome = match frame.get("error") {
                    Some(err) => match serde_json::from_value::<CdpError>(err.clone()) {
                        Ok(err) => Err(Error::cdp(err.code, err.message)),
                        Err(_) => Err(Error::protocol(format!("malformed error object: {err}"))),
                    },
                    // Resolve with the result field, or the whole frame when
                    // the response carries none.
                    None => Ok(frame.get("result").cloned().unwrap_or(frame)),
                };

                let _ = tx.send(outcome);
                return;
            }

            // An id matching no pending request does not claim the frame;
            // it may still carry a dispatchable method.
            warn!(%request_id, "Response for unknown request");
        }

        if let Some(method) = frame.get("method").and_then(Value::as_str) {
            let handlers = handlers.lock();
            if let Some(handler) = handlers.get(method) {
                trace!(method, "Dispatching event");
                let params = frame.get("params").cloned().unwrap_or(Value::Null);
                handler(params);
            } else {
                trace!(method, "No handler for event");
            }
            return;
        }

        trace!("Dropping frame with neither id nor method");
    }

    /// Writes one request to the socket after recording its correlation.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Value>>,
        ws_write: &mut SplitSink<WsStream, Message>,
        correlation: &Mutex<CorrelationMap>,
    ) {
        let request_id = request.id;

        // Serialize request
        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        // Send over WebSocket
        if let Err(e) = ws_write.send(Message::Text(json.into())).await
            && let Some(tx) = correlation.lock().remove(&request_id)
        {
            let _ = tx.send(Err(Error::connection(e.to_string())));
            return;
        }

        trace!(%request_id, "Request sent");
    }

    /// Fails all pending requests with `ConnectionClosed`.
    fn fail_pending_requests(correlation: &Mutex<CorrelationMap>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
