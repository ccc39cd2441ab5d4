//! Error types for the DevTools bridge.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use chrome_bridge::{App, Result};
//!
//! async fn example(app: &App) -> Result<()> {
//!     app.register_function("greet", |v| async move { v });
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Launch | [`Error::Launch`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`] |
//! | Protocol | [`Error::Precondition`], [`Error::Protocol`], [`Error::Cdp`], [`Error::NoPageTarget`] |
//! | Execution | [`Error::Script`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |
//!
//! A bridge dispatch miss (unknown function name from the page) is
//! deliberately *not* an error variant: it is logged and silently ignored,
//! on both sides.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when builder configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Failed to launch the browser process.
    #[error("Failed to launch browser: {message}")]
    Launch {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Debugging endpoint connection failed.
    ///
    /// Returned when the metadata fetch or the WebSocket open fails.
    /// Fatal: aborts startup.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while an operation was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Command response not received within the opt-in timeout.
    ///
    /// Only produced by `send_with_timeout`; the default send path waits
    /// indefinitely.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Precondition violated by the caller.
    ///
    /// Send attempted on a closed connection, or a session-scoped command
    /// issued without a session ID. Fatal to the calling operation, not to
    /// the process.
    #[error("Precondition violated: {message}")]
    Precondition {
        /// Description of the violated precondition.
        message: String,
    },

    /// Protocol violation or unexpected frame shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Error response from the browser for a command.
    #[error("CDP error {code}: {message}")]
    Cdp {
        /// DevTools error code.
        code: i64,
        /// DevTools error message.
        message: String,
    },

    /// No page-type target available to attach to.
    ///
    /// Fatal: aborts session negotiation.
    #[error("No page target available")]
    NoPageTarget,

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// JavaScript evaluation threw in the page.
    #[error("Script error: {message}")]
    Script {
        /// Exception text reported by the page.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error during the metadata fetch.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a launch error.
    #[inline]
    pub fn launch(err: IoError) -> Self {
        Self::Launch {
            message: err.to_string(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a precondition error.
    #[inline]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a CDP error from an error response.
    #[inline]
    pub fn cdp(code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            code,
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_) | Self::Http(_)
        )
    }

    /// Returns `true` if this error aborts startup entirely.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Launch { .. }
                | Self::Connection { .. }
                | Self::NoPageTarget
        )
    }

    /// Returns `true` if this is a caller precondition violation.
    #[inline]
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
