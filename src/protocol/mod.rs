//! DevTools wire protocol message types.
//!
//! This module defines the frame formats exchanged with the browser's
//! remote-debugging socket.
//!
//! # Protocol Overview
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `{id, method, params, sessionId?}` | Host → Browser | Command request |
//! | `{id, result}` / `{id, error}` | Browser → Host | Command response |
//! | `{method, params, sessionId?}` | Browser → Host | Event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Typed commands and their result types |
//! | `event` | Event params types |
//! | `request` | Outbound request frame, command error object |

// ============================================================================
// Submodules
// ============================================================================

/// Typed command definitions and result types.
pub mod command;

/// Event params types.
pub mod event;

/// Outbound request frame and command error object.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    AttachToTargetResult, Command, EvaluateResult, GetTargetsResult, GetWindowForTargetResult,
    RemoteObject, TargetInfo, WindowBounds, WindowState,
};
pub use event::{BINDING_CALLED, BindingCalledParams};
pub use request::{CdpError, Request};
