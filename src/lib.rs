//! Bidirectional RPC between Rust and in-page JavaScript over the Chrome
//! DevTools Protocol.
//!
//! The DevTools protocol is asymmetric: the host can push code into a page
//! and read its value, and the page can poke the host with a short opaque
//! string, nothing more. This crate layers a symmetric call/response RPC
//! on top of exactly those two primitives.
//!
//! # Architecture
//!
//! Two protocol layers, each with its own correlation domain:
//!
//! - **Connection**: JSON-RPC over the browser's debugging WebSocket.
//!   Monotonic request IDs correlate commands to responses; unsolicited
//!   events are demultiplexed to handlers by method name.
//! - **Bridge**: a page-resident outbox and token scheme. Page code calls
//!   `send`/`callFn` and awaits a Promise; the host drains the outbox via
//!   evaluate calls and resolves that Promise by pushing the result back.
//!
//! Data flow: page enqueues work → fires the signaling binding → the
//! connection's event path recognizes the signal → the bridge pops and
//! dispatches → the result is evaluated back into the page → the page
//! resolves the originating caller.
//!
//! # Quick Start
//!
//! ```no_run
//! use chrome_bridge::{App, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut app = App::builder()
//!         .url("http://127.0.0.1:8000")
//!         .on_message(|msg| async move { json!({"echo": msg}) })
//!         .launch()
//!         .await?;
//!
//!     // Callable from the page as __bridge.callFn("greet", {...})
//!     app.register_function("greet", |args| async move {
//!         json!({"hello": args})
//!     });
//!
//!     app.run_until_exit().await?;
//!     app.cleanup().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Session negotiation, page contract, drain loop, registry |
//! | [`driver`] | Browser launch and lifecycle |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | DevTools frame and command types (internal) |
//! | [`transport`] | Debugging-socket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// The host↔page bridge: negotiation, contract, drain loop, registry.
pub mod bridge;

/// Browser launch and lifecycle.
///
/// Use [`App::builder()`] to configure and launch.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// DevTools wire protocol message types.
///
/// Internal module defining command/response/event structures.
pub mod protocol;

/// Debugging-socket transport layer.
///
/// Internal module handling the WebSocket connection and event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{Bridge, FunctionRegistry, MessageHandler, Session, SignalSource, WorkItem, WorkKind};

// Driver types
pub use driver::{App, AppBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SessionId, TargetId, Token, WindowId};

// Transport types
pub use transport::{Connection, ConnectionInfo};
