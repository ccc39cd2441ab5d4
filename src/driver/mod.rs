//! App driver module.
//!
//! This module provides the main entry point: launching the browser with a
//! temporary profile and remote debugging enabled, and owning the stack's
//! lifecycle.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`App`] | Running browser with connection and bridge |
//! | [`AppBuilder`] | Fluent configuration builder |
//!
//! # Example
//!
//! ```no_run
//! use chrome_bridge::App;
//! use serde_json::json;
//!
//! # async fn example() -> chrome_bridge::Result<()> {
//! let app = App::builder()
//!     .url("http://127.0.0.1:8000")
//!     .on_message(|msg| async move { json!({"echo": msg}) })
//!     .launch()
//!     .await?;
//!
//! app.cleanup().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for app configuration.
pub mod builder;

/// Core app implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::AppBuilder;
pub use core::App;
