//! Builder pattern for app configuration.
//!
//! Provides a fluent API for configuring and launching an [`App`].
//!
//! # Example
//!
//! ```no_run
//! use chrome_bridge::App;
//!
//! # async fn example() -> chrome_bridge::Result<()> {
//! let app = App::builder()
//!     .url("http://127.0.0.1:8000")
//!     .on_message(|msg| async move { msg })
//!     .launch()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::bridge::MessageHandler;
use crate::error::{Error, Result};

use super::core::App;

// ============================================================================
// AppBuilder
// ============================================================================

/// Builder for configuring and launching an [`App`].
///
/// Use [`App::builder()`] to create one.
#[derive(Default)]
pub struct AppBuilder {
    /// Application URL the browser opens.
    url: Option<String>,
    /// Browser binary path; auto-detected when unset.
    binary: Option<PathBuf>,
    /// Extra browser command-line arguments.
    extra_args: Vec<String>,
    /// Whether to negotiate a session and start the bridge.
    expose_api: Option<bool>,
    /// Whether to maximize the window on the ready signal.
    maximize_on_ready: Option<bool>,
    /// Global handler for page messages.
    message_handler: Option<MessageHandler>,
    /// Opt-in default command timeout.
    command_timeout: Option<Duration>,
}

/// Validated configuration handed to [`App::launch`].
pub(crate) struct AppConfig {
    pub url: String,
    pub binary: PathBuf,
    pub extra_args: Vec<String>,
    pub expose_api: bool,
    pub maximize_on_ready: bool,
    pub message_handler: MessageHandler,
    pub command_timeout: Option<Duration>,
}

impl AppBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application URL the browser opens. Required.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the browser binary path.
    ///
    /// When unset, well-known Edge/Chrome/Chromium install locations are
    /// probed.
    #[inline]
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Appends an extra browser command-line argument.
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Enables or disables the bridge. Defaults to enabled.
    ///
    /// With the bridge disabled no session is negotiated; the connection
    /// stays usable for raw commands only.
    #[inline]
    #[must_use]
    pub fn expose_api(mut self, expose: bool) -> Self {
        self.expose_api = Some(expose);
        self
    }

    /// Controls maximizing the window on the ready signal. Defaults to on.
    #[inline]
    #[must_use]
    pub fn maximize_on_ready(mut self, maximize: bool) -> Self {
        self.maximize_on_ready = Some(maximize);
        self
    }

    /// Sets the global handler for page messages sent via `send`.
    ///
    /// Without one, messages are logged and answered with `null`.
    #[must_use]
    pub fn on_message<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.message_handler = Some(Arc::new(move |msg| handler(msg).boxed()));
        self
    }

    /// Opts into a default timeout for every command.
    ///
    /// Off by default: an unanswered command waits forever.
    #[inline]
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Validates the configuration and launches the browser.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL is missing or not http(s), or no
    ///   browser binary could be found
    /// - anything [`App::launch`] can fail with
    pub async fn launch(self) -> Result<App> {
        let config = self.into_config()?;
        App::launch(config).await
    }

    /// Validates the builder into a launch configuration.
    fn into_config(self) -> Result<AppConfig> {
        let url = self.validate_url()?;
        let binary = self.validate_binary()?;

        let message_handler = self.message_handler.unwrap_or_else(|| {
            Arc::new(|msg| {
                async move {
                    warn!(?msg, "Page message received but no handler configured");
                    Value::Null
                }
                .boxed()
            })
        });

        Ok(AppConfig {
            url,
            binary,
            extra_args: self.extra_args,
            expose_api: self.expose_api.unwrap_or(true),
            maximize_on_ready: self.maximize_on_ready.unwrap_or(true),
            message_handler,
            command_timeout: self.command_timeout,
        })
    }

    /// Validates the URL configuration.
    fn validate_url(&self) -> Result<String> {
        let url = self.url.clone().ok_or_else(|| {
            Error::config(
                "Application URL is required. Use .url() to set it.\n\
                 Example: App::builder().url(\"http://127.0.0.1:8000\")",
            )
        })?;

        let parsed = Url::parse(&url)
            .map_err(|e| Error::config(format!("Invalid application URL {url:?}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Application URL must be http or https, got {:?}",
                parsed.scheme()
            )));
        }

        Ok(url)
    }

    /// Validates the binary path, probing defaults when unset.
    fn validate_binary(&self) -> Result<PathBuf> {
        if let Some(binary) = &self.binary {
            if !binary.exists() {
                return Err(Error::config(format!(
                    "Browser binary not found at: {}",
                    binary.display()
                )));
            }
            return Ok(binary.clone());
        }

        default_binary().ok_or_else(|| {
            Error::config(
                "No browser binary found in well-known locations. \
                 Use .binary() to point at a Chromium-family browser.",
            )
        })
    }
}

// ============================================================================
// Binary Detection
// ============================================================================

/// Well-known Chromium-family install locations, probed in order.
#[cfg(target_os = "windows")]
const BINARY_CANDIDATES: &[&str] = &[
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(target_os = "macos")]
const BINARY_CANDIDATES: &[&str] = &[
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const BINARY_CANDIDATES: &[&str] = &[
    "/usr/bin/microsoft-edge",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
];

/// Returns the first existing well-known browser binary, if any.
fn default_binary() -> Option<PathBuf> {
    BINARY_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

// ============================================================================
// Tests
// ============================================================================
