//! The page-side bridge contract.
//!
//! The in-page runtime is an external collaborator: the host never touches
//! its state directly, only through evaluate calls over the debugging
//! socket. Everything the host relies on is pinned here as a versioned
//! contract (the global object name, the binding name, the signal strings
//! and the work-item wire shapes), together with the reference bootstrap
//! source installed during session negotiation.
//!
//! # Contract (version 1)
//!
//! | Name | Value |
//! |------|-------|
//! | Page global | `window.__bridge` |
//! | Signaling binding | `window.__bridgeSignal(payload)` |
//! | Signals | `"ready"`, `"recv"` |
//! | Load hook | `window.onBridgeReady` |
//! | Work item | `{tkn, msg, fn?, kind: 0\|1}` |
//! | Reply | `__bridge.recv({tkn, msg})` |
//!
//! The page runtime keeps an ordered outbox and a callback table keyed by
//! token. `send`/`callFn` mint a token from a page-local monotonic counter,
//! append a work item, fire the binding with `"recv"` and return a Promise
//! stored under the token. `recv` resolves and discards that Promise. The
//! bootstrap announces `"ready"` exactly once as it installs.

// ============================================================================
// Imports
// ============================================================================

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::Token;

// ============================================================================
// Constants
// ============================================================================

/// Version of the page-side contract this crate speaks.
pub const CONTRACT_VERSION: u32 = 1;

/// Name of the bridge runtime on the page's global object.
pub const PAGE_GLOBAL: &str = "__bridge";

/// Name of the signaling binding registered via `Runtime.addBinding`.
pub const BINDING_NAME: &str = "__bridgeSignal";

/// Optional page-defined hook invoked once the document has loaded.
pub const LOAD_HOOK: &str = "onBridgeReady";

/// Signal announcing the bootstrap has finished installing.
pub const SIGNAL_READY: &str = "ready";

/// Signal announcing a work item was pushed to the outbox.
pub const SIGNAL_RECV: &str = "recv";

/// Reference bootstrap source, installed in every new document before any
/// other script executes.
pub const BOOTSTRAP_SOURCE: &str = r#"
window.__bridge = {
  outbox: [],
  callbacks: {},
  nextToken: 0,
  send(msg) {
    const tkn = this.nextToken++;
    this.outbox.push({ tkn: tkn, msg: msg, kind: 0 });
    window.__bridgeSignal("recv");
    return new Promise((res) => {
      window.__bridge.callbacks[tkn.toString()] = res;
    });
  },
  callFn(name, params) {
    const tkn = this.nextToken++;
    this.outbox.push({ tkn: tkn, fn: name, msg: params, kind: 1 });
    window.__bridgeSignal("recv");
    return new Promise((res) => {
      window.__bridge.callbacks[tkn.toString()] = res;
    });
  },
  recv(data) {
    const tkn = data.tkn;
    window.__bridge.callbacks[tkn.toString()](data.msg);
    delete window.__bridge.callbacks[tkn.toString()];
  },
};
window.__bridgeSignal("ready");
document.addEventListener("DOMContentLoaded", () => {
  if (typeof window.onBridgeReady === "function") {
    window.onBridgeReady();
  }
});
"#;

// ============================================================================
// WorkKind
// ============================================================================

/// Discriminator of a work item, `kind` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    /// Deliver to the global message handler. Wire value 0.
    Message,
    /// Dispatch through the function registry. Wire value 1.
    FunctionCall,
}

impl Serialize for WorkKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            Self::Message => 0,
            Self::FunctionCall => 1,
        })
    }
}

impl<'de> Deserialize<'de> for WorkKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Self::Message),
            1 => Ok(Self::FunctionCall),
            other => Err(de::Error::invalid_value(
                de::Unexpected::Unsigned(u64::from(other)),
                &"work kind 0 or 1",
            )),
        }
    }
}

// ============================================================================
// WorkItem
// ============================================================================

/// One unit of work popped from the page's outbox.
///
/// Created by page-side `send`/`callFn`; consumed exactly once by the host
/// drain step.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkItem {
    /// Page-scoped correlation token.
    #[serde(rename = "tkn")]
    pub token: Token,

    /// Discriminator for dispatch.
    pub kind: WorkKind,

    /// Opaque structured payload.
    #[serde(rename = "msg", default)]
    pub message: Value,

    /// Target function name, present only for function calls.
    #[serde(rename = "fn", default)]
    pub function: Option<String>,
}

// ============================================================================
// WorkReply
// ============================================================================

/// Result pushed back into the page for one work item.
#[derive(Debug, Clone, Serialize)]
pub struct WorkReply {
    /// Token of the originating work item.
    #[serde(rename = "tkn")]
    pub token: Token,

    /// Handler result to resolve the page-side Promise with.
    #[serde(rename = "msg")]
    pub message: Value,
}

// ============================================================================
// Expressions
// ============================================================================

/// Expression popping the most recently pushed outbox item.
///
/// `Array.pop` takes from the tail: one signal drains at most one item and
/// the last-pushed item drains first. Contract version 1 pins this LIFO
/// single-item behavior; see DESIGN.md for the ordering hazard it implies.
#[inline]
#[must_use]
pub fn pop_expression() -> String {
    format!("window.{PAGE_GLOBAL}.outbox.pop()")
}

/// Expression delivering a reply to the page's `recv`.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if the reply cannot be
/// serialized.
pub fn recv_expression(reply: &WorkReply) -> Result<String> {
    let payload = serde_json::to_string(reply)?;
    Ok(format!("window.{PAGE_GLOBAL}.recv({payload})"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bootstrap_uses_contract_names() {
        assert!(BOOTSTRAP_SOURCE.contains(&format!("window.{PAGE_GLOBAL}")));
        assert!(BOOTSTRAP_SOURCE.contains(&format!("window.{BINDING_NAME}(\"{SIGNAL_RECV}\")")));
        assert!(BOOTSTRAP_SOURCE.contains(&format!("window.{BINDING_NAME}(\"{SIGNAL_READY}\")")));
        assert!(BOOTSTRAP_SOURCE.contains(&format!("window.{LOAD_HOOK}")));
    }

    #[test]
    fn test_bootstrap_announces_ready_once() {
        let announce = format!("window.{BINDING_NAME}(\"{SIGNAL_READY}\")");
        assert_eq!(BOOTSTRAP_SOURCE.matches(&announce).count(), 1);
    }

    #[test]
    fn test_work_item_message_parse() {
        let item: WorkItem =
            serde_json::from_value(json!({"tkn": 0, "msg": "systeminfo", "kind": 0}))
                .expect("parse");
        assert_eq!(item.token, Token::new(0));
        assert_eq!(item.kind, WorkKind::Message);
        assert_eq!(item.message, json!("systeminfo"));
        assert!(item.function.is_none());
    }

    #[test]
    fn test_work_item_function_call_parse() {
        let item: WorkItem = serde_json::from_value(
            json!({"tkn": 3, "fn": "greet", "msg": {"name": "world"}, "kind": 1}),
        )
        .expect("parse");
        assert_eq!(item.kind, WorkKind::FunctionCall);
        assert_eq!(item.function.as_deref(), Some("greet"));
    }

    #[test]
    fn test_work_item_rejects_unknown_kind() {
        let result =
            serde_json::from_value::<WorkItem>(json!({"tkn": 0, "msg": null, "kind": 2}));
        assert!(result.is_err());
    }

    #[test]
    fn test_pop_expression() {
        assert_eq!(pop_expression(), "window.__bridge.outbox.pop()");
    }

    #[test]
    fn test_recv_expression() {
        let reply = WorkReply {
            token: Token::new(4),
            message: json!({"ok": true}),
        };
        let expr = recv_expression(&reply).expect("serialize");
        assert_eq!(expr, r#"window.__bridge.recv({"tkn":4,"msg":{"ok":true}})"#);
    }
}
