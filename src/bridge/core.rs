//! Host-side bridge: readiness tracking and the drain loop.
//!
//! The debugging protocol only lets the host push code into the page and
//! only lets the page signal the host with a short opaque string. This
//! module turns that asymmetric pair into the host half of a symmetric
//! call/response RPC: every binding signal is funneled through one channel
//! into a task that pops queued work out of the page, dispatches it, and
//! pushes the result back.
//!
//! # Ordering hazard
//!
//! Each `"recv"` signal drains at most one item, and the pop takes the
//! *most recently pushed* item (contract version 1 pins this). Because every
//! page-side push emits its own signal and the event path delivers signals
//! in order, pushes and drains balance out. A lost or coalesced signal,
//! however, leaves one item stranded in the outbox until some later signal
//! happens to arrive. There is no multi-item drain loop to recover it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::protocol::{BINDING_CALLED, BindingCalledParams, Command, WindowBounds};
use crate::transport::Connection;

use super::contract::{self, WorkItem, WorkKind, WorkReply};
use super::registry::FunctionRegistry;
use super::session::Session;

// ============================================================================
// Types
// ============================================================================

/// The single global handler for page messages sent via `send`.
pub type MessageHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Value> + Send + Sync>;

/// Signals the page can raise through the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    /// Bootstrap finished installing.
    Ready,
    /// A work item was pushed to the outbox.
    Recv,
}

/// Buffered stream of decoded binding signals.
///
/// Obtained from [`Bridge::subscribe`] before session negotiation begins;
/// signals raised while setup commands are still in flight queue here
/// instead of being dropped for want of a handler.
pub struct SignalSource {
    rx: mpsc::UnboundedReceiver<Signal>,
}

// ============================================================================
// Bridge
// ============================================================================

/// Host half of the page bridge.
///
/// Created once after session negotiation; owns the readiness state and the
/// signal-processing task. The page-resident outbox is never touched
/// directly, only through evaluate calls.
#[derive(Clone)]
pub struct Bridge {
    /// Shared state with the signal task.
    inner: Arc<BridgeInner>,
}

/// State shared between the handle and the signal task.
struct BridgeInner {
    /// Connection the session lives on.
    connection: Connection,
    /// Negotiated session handles.
    session: Session,
    /// Functions invocable from the page.
    registry: Arc<FunctionRegistry>,
    /// Global handler for `send` messages.
    message_handler: MessageHandler,
    /// NotReady → Ready, set exactly once.
    ready: AtomicBool,
    /// Maximize the browser window when the page reports ready.
    maximize_on_ready: bool,
}

impl Bridge {
    /// Registers the binding-event handler and returns the signal stream.
    ///
    /// Must run before session negotiation: the page may announce itself
    /// the moment `Runtime.addBinding` takes effect, while later setup
    /// commands are still in flight. With the handler already installed
    /// those signals buffer in the returned [`SignalSource`] until
    /// [`start`](Self::start) begins consuming them.
    pub fn subscribe(connection: &Connection) -> SignalSource {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        connection.on_event(
            BINDING_CALLED,
            Box::new(move |params| {
                let params: BindingCalledParams = match serde_json::from_value(params) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "Malformed bindingCalled params");
                        return;
                    }
                };

                if params.name != contract::BINDING_NAME {
                    trace!(name = %params.name, "Ignoring unrelated binding");
                    return;
                }

                let signal = match params.payload.as_str() {
                    contract::SIGNAL_READY => Signal::Ready,
                    contract::SIGNAL_RECV => Signal::Recv,
                    other => {
                        warn!(payload = other, "Unknown bridge signal");
                        return;
                    }
                };

                let _ = signal_tx.send(signal);
            }),
        );

        SignalSource { rx: signal_rx }
    }

    /// Starts the bridge over a negotiated session.
    ///
    /// Spawns the signal task over the stream obtained from
    /// [`subscribe`](Self::subscribe), draining anything that buffered
    /// during negotiation first. Signals are processed one at a time to
    /// completion, in arrival order.
    pub fn start(
        connection: Connection,
        session: Session,
        registry: Arc<FunctionRegistry>,
        message_handler: MessageHandler,
        maximize_on_ready: bool,
        signals: SignalSource,
    ) -> Self {
        let inner = Arc::new(BridgeInner {
            connection,
            session,
            registry,
            message_handler,
            ready: AtomicBool::new(false),
            maximize_on_ready,
        });

        tokio::spawn(Self::run_signal_loop(Arc::clone(&inner), signals.rx));

        Self { inner }
    }

    /// Returns `true` once the page has confirmed its bootstrap installed.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Consumes signals one at a time, each to completion.
    async fn run_signal_loop(inner: Arc<BridgeInner>, mut signal_rx: mpsc::UnboundedReceiver<Signal>) {
        while let Some(signal) = signal_rx.recv().await {
            match signal {
                Signal::Ready => inner.handle_ready().await,
                Signal::Recv => {
                    if let Err(e) = inner.drain_one().await {
                        warn!(error = %e, "Bridge drain failed");
                    }
                }
            }
        }

        debug!("Bridge signal loop terminated");
    }
}

impl BridgeInner {
    /// Handles the one-time readiness confirmation from the page.
    async fn handle_ready(&self) {
        if self.ready.swap(true, Ordering::SeqCst) {
            warn!("Duplicate ready signal from page");
            return;
        }

        info!("Page bridge runtime ready");

        if self.maximize_on_ready
            && let Err(e) = self
                .connection
                .send(
                    Command::SetWindowBounds {
                        window_id: self.session.window_id,
                        bounds: WindowBounds::maximized(),
                    },
                    None,
                )
                .await
        {
            warn!(error = %e, "Failed to maximize window");
        }
    }

    /// Pops and dispatches at most one work item, then replies to the page.
    async fn drain_one(&self) -> Result<()> {
        if !self.ready.load(Ordering::SeqCst) {
            // The bootstrap announces ready before any send/callFn can run,
            // so a recv signal landing first is anomalous.
            warn!("Drain signal before ready; dropping");
            return Ok(());
        }

        let popped = self
            .connection
            .evaluate_result(&contract::pop_expression(), &self.session.session_id)
            .await?;

        // Empty outbox pops undefined
        if popped.is_null() {
            trace!("Outbox empty, nothing to drain");
            return Ok(());
        }

        let item: WorkItem = serde_json::from_value(popped)?;
        let token = item.token;

        let result = match item.kind {
            WorkKind::Message => {
                debug!(%token, "Dispatching page message");
                (self.message_handler)(item.message).await
            }
            WorkKind::FunctionCall => {
                let Some(name) = item.function.as_deref() else {
                    warn!(%token, "Function call without a function name");
                    return Ok(());
                };

                // Unknown names are ignored on both sides; the page's
                // Promise for this token stays pending forever.
                let Some(function) = self.registry.get(name) else {
                    debug!(%token, name, "No exposed function under this name");
                    return Ok(());
                };

                debug!(%token, name, "Calling exposed function");
                function(item.message).await
            }
        };

        let reply = WorkReply {
            token,
            message: result,
        };
        self.connection
            .evaluate_result(&contract::recv_expression(&reply)?, &self.session.session_id)
            .await?;

        trace!(%token, "Reply delivered to page");
        Ok(())
    }
}
