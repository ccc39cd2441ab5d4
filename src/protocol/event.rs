//! Event message types.
//!
//! Events are unsolicited notifications pushed by the browser over the
//! debugging socket. Handlers are registered per event method on
//! [`Connection`](crate::transport::Connection) and receive the raw `params`
//! object; typed params exist only for the events this crate consumes.
//!
//! | Method | Params |
//! |--------|--------|
//! | `Runtime.bindingCalled` | [`BindingCalledParams`] |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;

// ============================================================================
// Constants
// ============================================================================

/// Event fired when the page invokes a binding registered with
/// `Runtime.addBinding`.
///
/// This is the single channel through which the page can asynchronously
/// notify the host.
pub const BINDING_CALLED: &str = "Runtime.bindingCalled";

// ============================================================================
// BindingCalledParams
// ============================================================================

/// Params of a `Runtime.bindingCalled` event.
#[derive(Debug, Clone, Deserialize)]
pub struct BindingCalledParams {
    /// Name of the invoked binding.
    pub name: String,

    /// Opaque string payload passed by the page. No structured data: the
    /// bridge encodes everything else in the page-resident outbox.
    pub payload: String,

    /// Execution context the call originated from.
    #[serde(rename = "executionContextId", default)]
    pub execution_context_id: i64,
}

// ============================================================================
// Tests
// ============================================================================
