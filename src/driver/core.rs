//! App coordinator: browser process, connection and bridge lifecycle.
//!
//! The [`App`] owns the browser process, its temporary profile directory,
//! the debugging connection and (when enabled) the bridge. Lifecycle:
//!
//! 1. [`App::builder`]`...`[`launch`](super::builder::AppBuilder::launch):
//!    spawn the browser, connect, negotiate, start the bridge
//! 2. [`App::run_until_exit`]: await the user closing the browser
//! 3. [`App::cleanup`]: release the connection and profile directory
//!
//! # Example
//!
//! ```no_run
//! use chrome_bridge::App;
//! use serde_json::json;
//!
//! # async fn example() -> chrome_bridge::Result<()> {
//! let mut app = App::builder()
//!     .url("http://127.0.0.1:8000")
//!     .on_message(|msg| async move { json!({"echo": msg}) })
//!     .launch()
//!     .await?;
//!
//! app.register_function("version", |_| async { json!(env!("CARGO_PKG_VERSION")) });
//!
//! app.run_until_exit().await?;
//! app.cleanup().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::bridge::{self, Bridge, FunctionRegistry};
use crate::error::{Error, Result};
use crate::transport::{Connection, ConnectionInfo};

use super::builder::{AppBuilder, AppConfig};

// ============================================================================
// Constants
// ============================================================================

/// How long to wait for the freshly spawned browser to open its debugging
/// endpoint. Launch readiness only; commands themselves carry no timeout.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while waiting for the endpoint to come up.
const LAUNCH_POLL_INTERVAL: Duration = Duration::from_millis(200);

// ============================================================================
// App
// ============================================================================

/// A running browser app with a bridge to its page.
///
/// Owns the browser process, the temporary profile directory, the debugging
/// connection and the bridge. Dropping the `App` without
/// [`cleanup`](Self::cleanup) leaves the browser running but removes the
/// profile directory once the process exits.
pub struct App {
    /// Debugging connection.
    connection: Connection,
    /// Functions the page may invoke.
    registry: Arc<FunctionRegistry>,
    /// Bridge, present when the API was exposed.
    bridge: Option<Bridge>,
    /// Browser process handle.
    child: Child,
    /// Temporary profile directory, removed on cleanup.
    profile_dir: Option<TempDir>,
    /// Debugging port the browser was launched with.
    port: u16,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("port", &self.port)
            .field("bridge", &self.bridge.is_some())
            .field("functions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// App - Public API
// ============================================================================

impl App {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Registers a function the page can invoke via `callFn`.
    ///
    /// May be called before or during the session; a later registration
    /// under the same name replaces the earlier one.
    pub fn register_function<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.registry.register(name, handler);
    }

    /// Returns the debugging connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the endpoint metadata fetched at connect time.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &ConnectionInfo {
        self.connection.info()
    }

    /// Returns the bridge, if the API was exposed.
    #[inline]
    #[must_use]
    pub fn bridge(&self) -> Option<&Bridge> {
        self.bridge.as_ref()
    }

    /// Returns the debugging port the browser was launched with.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the browser process to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if waiting on the process fails.
    pub async fn run_until_exit(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().await?;
        info!(%status, "Browser process exited");
        Ok(status)
    }

    /// Waits for the browser to exit, then releases all resources.
    ///
    /// Shuts the connection down and removes the temporary profile
    /// directory. Best-effort: a failure to remove the profile is logged,
    /// not surfaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if waiting on the process fails.
    pub async fn cleanup(mut self) -> Result<()> {
        self.run_until_exit().await?;
        self.connection.shutdown();

        debug!("Cleaning up");
        if let Some(profile_dir) = self.profile_dir.take()
            && let Err(e) = profile_dir.close()
        {
            warn!(error = %e, "Failed to remove profile directory");
        }

        Ok(())
    }
}

// ============================================================================
// App - Launch
// ============================================================================

impl App {
    /// Launches the browser and brings the stack up.
    ///
    /// Spawns the process against a fresh profile, waits for the debugging
    /// endpoint and connects. Unless the API is disabled, it then
    /// negotiates a session and starts the bridge.
    pub(crate) async fn launch(config: AppConfig) -> Result<Self> {
        let profile_dir = TempDir::new()?;
        let port = pick_free_port().await?;

        let child = spawn_browser(&config, profile_dir.path(), port)?;
        info!(pid = child.id(), port, url = %config.url, "Browser process spawned");

        wait_for_endpoint(port).await?;

        let mut connection = Connection::connect(port).await?;
        if let Some(timeout) = config.command_timeout {
            connection = connection.with_command_timeout(timeout);
        }

        let registry = Arc::new(FunctionRegistry::new());

        let bridge = if config.expose_api {
            // Subscribe before negotiation: the page can announce itself as
            // soon as the binding is registered, mid-setup.
            let signals = Bridge::subscribe(&connection);
            let session = bridge::negotiate(&connection).await?;
            Some(Bridge::start(
                connection.clone(),
                session,
                Arc::clone(&registry),
                config.message_handler,
                config.maximize_on_ready,
                signals,
            ))
        } else {
            debug!("API not exposed; skipping session negotiation");
            None
        };

        Ok(Self {
            connection,
            registry,
            bridge,
            child,
            profile_dir: Some(profile_dir),
            port,
        })
    }
}

// ============================================================================
// Launch Helpers
// ============================================================================

/// Picks a free local port by binding port 0 and reading the assignment.
async fn pick_free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let port = listener.local_addr()?.port();
    debug!(port, "Selected debugging port");
    Ok(port)
}

/// Spawns the browser process with remote debugging enabled.
fn spawn_browser(config: &AppConfig, profile_dir: &Path, port: u16) -> Result<Child> {
    let mut cmd = Command::new(&config.binary);

    cmd.arg(format!("--user-data-dir={}", profile_dir.display()))
        .arg(format!("--remote-debugging-port={port}"))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--new-window")
        .arg(format!("--app={}", config.url));

    cmd.args(&config.extra_args);

    // Suppress stdio
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    cmd.spawn().map_err(Error::launch)
}

/// Polls the metadata endpoint until the browser starts listening.
async fn wait_for_endpoint(port: u16) -> Result<()> {
    let url = format!("http://127.0.0.1:{port}/json/version");
    let deadline = tokio::time::Instant::now() + LAUNCH_TIMEOUT;

    loop {
        match reqwest::get(&url).await {
            Ok(response) if response.status().is_success() => {
                debug!(port, "Debugging endpoint is up");
                return Ok(());
            }
            _ if tokio::time::Instant::now() >= deadline => {
                return Err(Error::connection(format!(
                    "debugging endpoint did not come up on port {port} within {}s",
                    LAUNCH_TIMEOUT.as_secs()
                )));
            }
            _ => sleep(LAUNCH_POLL_INTERVAL).await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pick_free_port() {
        let port = pick_free_port().await.expect("port");
        assert!(port > 0);
    }

    #[tokio::test]
    async fn test_wait_for_endpoint_times_out_quickly_when_nothing_listens() {
        // Bound then dropped, so nothing listens on it
        let port = pick_free_port().await.expect("port");

        let waiting = wait_for_endpoint(port);
        let outcome = tokio::time::timeout(Duration::from_secs(1), waiting).await;

        // Still polling (launch timeout is 30s); the point is it has not
        // succeeded against a dead port.
        assert!(outcome.is_err());
    }
}
