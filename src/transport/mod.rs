//! Debugging-socket transport layer.
//!
//! This module handles communication with the browser's remote-debugging
//! endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │   Host (Rust)   │   GET /json/version          │  Browser        │
//! │                 │─────────────────────────────►│                 │
//! │   Connection    │         WebSocket            │  DevTools       │
//! │                 │◄────────────────────────────►│  endpoint       │
//! └─────────────────┘      127.0.0.1:PORT          └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` - Fetch endpoint metadata, open the socket
//! 2. `Connection::send` / `evaluate_result` - Issue commands
//! 3. `Connection::on_event` - Route unsolicited events
//! 4. `Connection::shutdown` - Close the socket

// ============================================================================
// Submodules
// ============================================================================

/// Debugging-socket connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionInfo, EventHandler};
