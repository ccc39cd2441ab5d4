//! The host↔page bridge.
//!
//! Builds a symmetric call/response RPC on top of two asymmetric
//! primitives: host→page code injection (`Runtime.evaluate` /
//! `Page.addScriptToEvaluateOnNewDocument`) and page→host string signaling
//! (`Runtime.bindingCalled`).
//!
//! Two independent correlation domains are in play and never share a
//! counter: the connection's request IDs (host-allocated) and the bridge
//! tokens (page-allocated). See [`contract`] for the pinned page-side
//! protocol.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] / [`negotiate`] | One-time setup sequence over the connection |
//! | [`contract`] | Versioned page-side contract and bootstrap source |
//! | [`Bridge`] | Readiness tracking and the drain loop |
//! | [`FunctionRegistry`] | Named async handlers invocable from the page |

// ============================================================================
// Submodules
// ============================================================================

/// Versioned page-side contract, work-item wire shapes, bootstrap source.
pub mod contract;

/// Readiness tracking and the drain loop.
pub mod core;

/// Host-side table of functions invocable from the page.
pub mod registry;

/// Session negotiation.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use contract::{WorkItem, WorkKind, WorkReply};
pub use core::{Bridge, MessageHandler, SignalSource};
pub use registry::{ExposedFunction, FunctionRegistry};
pub use session::{Session, negotiate};
