//! Outbound request frames and command error objects.
//!
//! # Format
//!
//! Outbound command:
//! ```json
//! { "id": 0, "method": "Domain.method", "params": { ... }, "sessionId": "..." }
//! ```
//!
//! Inbound frames are either a command response:
//! ```json
//! { "id": 0, "result": { ... } }
//! { "id": 0, "error": { "code": -32000, "message": "..." } }
//! ```
//!
//! or an unsolicited event:
//! ```json
//! { "method": "Domain.event", "params": { ... }, "sessionId": "..." }
//! ```
//!
//! Inbound frames are dispatched from a single parse by
//! [`Connection`](crate::transport::Connection); only the error object has a
//! dedicated type here.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{RequestId, SessionId};

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// An outbound command frame.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Identifier for request/response correlation.
    pub id: RequestId,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,

    /// Session scope, required for session-scoped commands.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Request {
    /// Creates a request frame.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, command: Command, session_id: Option<SessionId>) -> Self {
        Self {
            id,
            command,
            session_id,
        }
    }
}

// ============================================================================
// CdpError
// ============================================================================

/// Error object carried by a failed command response.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpError {
    /// DevTools error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_without_session() {
        let request = Request::new(RequestId::new(0), Command::GetTargets, None);
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json, json!({"id": 0, "method": "Target.getTargets"}));
    }

    #[test]
    fn test_request_serialization_with_session() {
        let request = Request::new(
            RequestId::new(3),
            Command::evaluate("1"),
            Some(SessionId::new("S1")),
        );
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["id"], 3);
        assert_eq!(json["method"], "Runtime.evaluate");
        assert_eq!(json["sessionId"], "S1");
        assert_eq!(json["params"]["returnByValue"], true);
    }

    #[test]
    fn test_cdp_error_parse() {
        let err: CdpError =
            serde_json::from_value(json!({"code": -32601, "message": "method not found"}))
                .expect("parse");
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "method not found");
    }
}
