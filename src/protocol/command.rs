//! DevTools command definitions.
//!
//! Only the commands this crate actually issues are modeled. Commands follow
//! the `Domain.methodName` naming of the DevTools protocol.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | `getTargets`, `attachToTarget` |
//! | `Browser` | `getWindowForTarget`, `setWindowBounds` |
//! | `Page` | `enable`, `addScriptToEvaluateOnNewDocument` |
//! | `Runtime` | `enable`, `addBinding`, `evaluate` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{SessionId, TargetId, WindowId};

// ============================================================================
// Command
// ============================================================================

/// A DevTools command with its parameters.
///
/// Serializes the `method`/`params` pair of an outbound frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// List all debuggable targets.
    #[serde(rename = "Target.getTargets")]
    GetTargets,

    /// Attach to a target, requesting flattened session semantics.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Use flat session mode (`sessionId` on each frame).
        flatten: bool,
    },

    /// Resolve the window owning the current session's target.
    #[serde(rename = "Browser.getWindowForTarget")]
    GetWindowForTarget,

    /// Change window position/size/state.
    #[serde(rename = "Browser.setWindowBounds")]
    SetWindowBounds {
        /// Window to adjust.
        #[serde(rename = "windowId")]
        window_id: WindowId,
        /// Requested bounds.
        bounds: WindowBounds,
    },

    /// Enable page-lifecycle events.
    #[serde(rename = "Page.enable")]
    PageEnable,

    /// Install a script that runs in every new document before any other
    /// script executes.
    #[serde(rename = "Page.addScriptToEvaluateOnNewDocument")]
    AddScriptToEvaluateOnNewDocument {
        /// Script source text.
        source: String,
    },

    /// Enable runtime events and evaluation.
    #[serde(rename = "Runtime.enable")]
    RuntimeEnable,

    /// Register a named binding callable from the page with a string payload.
    #[serde(rename = "Runtime.addBinding")]
    AddBinding {
        /// Binding name exposed on the page's global object.
        name: String,
    },

    /// Evaluate an expression in the page.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// Expression source text.
        expression: String,
        /// Return the result by value rather than as a remote object handle.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
    },

}

impl Command {
    /// Builds an evaluate command with `returnByValue` set.
    #[inline]
    #[must_use]
    pub fn evaluate(expression: impl Into<String>) -> Self {
        Self::Evaluate {
            expression: expression.into(),
            return_by_value: true,
        }
    }

    /// Returns `true` if this command only makes sense scoped to an
    /// attached session.
    ///
    /// [`Connection::send`](crate::transport::Connection::send) rejects these
    /// when no session ID is supplied.
    #[inline]
    #[must_use]
    pub fn requires_session(&self) -> bool {
        matches!(self, Self::Evaluate { .. })
    }
}

// ============================================================================
// WindowBounds
// ============================================================================

/// Window placement parameters for `Browser.setWindowBounds`.
#[derive(Debug, Clone, Serialize)]
pub struct WindowBounds {
    /// Window state to apply.
    pub state: WindowState,
}

impl WindowBounds {
    /// Bounds requesting a maximized window.
    #[inline]
    #[must_use]
    pub const fn maximized() -> Self {
        Self {
            state: WindowState::Maximized,
        }
    }
}

/// Browser window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    /// Normal windowed state.
    Normal,
    /// Minimized.
    Minimized,
    /// Maximized.
    Maximized,
    /// Fullscreen.
    Fullscreen,
}

// ============================================================================
// Typed Results
// ============================================================================

/// One entry of a `Target.getTargets` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    /// Target identifier.
    #[serde(rename = "targetId")]
    pub target_id: TargetId,

    /// Target kind (`page`, `iframe`, `worker`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Document title, if any.
    #[serde(default)]
    pub title: String,

    /// Document URL, if any.
    #[serde(default)]
    pub url: String,
}

impl TargetInfo {
    /// Returns `true` if this is a page-type target.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

/// Result of `Target.getTargets`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetTargetsResult {
    /// All known targets.
    #[serde(rename = "targetInfos")]
    pub target_infos: Vec<TargetInfo>,
}

/// Result of `Target.attachToTarget`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachToTargetResult {
    /// Session handle for subsequent scoped commands.
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

/// Result of `Browser.getWindowForTarget`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetWindowForTargetResult {
    /// Window owning the target.
    #[serde(rename = "windowId")]
    pub window_id: WindowId,
}

/// A value returned from the page by `Runtime.evaluate`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteObject {
    /// JavaScript type of the result (`object`, `string`, `undefined`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// The value itself, present when returned by value and defined.
    #[serde(default)]
    pub value: Option<Value>,
}

/// Result of `Runtime.evaluate`.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateResult {
    /// Evaluation result.
    pub result: RemoteObject,

    /// Present when the expression threw.
    #[serde(rename = "exceptionDetails", default)]
    pub exception_details: Option<Value>,
}

// ============================================================================
// Tests
// ============================================================================
