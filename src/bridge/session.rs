//! Session negotiation.
//!
//! A fixed, sequential setup protocol run once over a fresh connection.
//! Each step is an independent request depending on the prior one's result;
//! a failure at any step aborts negotiation and surfaces the triggering
//! error. There is no rollback: partial negotiation state is abandoned
//! as-is, leaving the connection usable for raw commands but without the
//! bridge active.

// ============================================================================
// Imports
// ============================================================================

use serde_json::from_value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId, WindowId};
use crate::protocol::{
    AttachToTargetResult, Command, GetTargetsResult, GetWindowForTargetResult,
};
use crate::transport::Connection;

use super::contract;

// ============================================================================
// Session
// ============================================================================

/// Handles produced by a completed negotiation.
///
/// Created exactly once per process lifetime; read-only afterwards. All
/// session-scoped commands must carry `session_id`; `window_id` is used
/// only for window-placement commands.
#[derive(Debug, Clone)]
pub struct Session {
    /// The attached page target.
    pub target_id: TargetId,

    /// Scope for all subsequent domain-scoped commands.
    pub session_id: SessionId,

    /// Window owning the target.
    pub window_id: WindowId,
}

// ============================================================================
// Negotiation
// ============================================================================

/// Runs the one-time setup sequence over the connection.
///
/// Steps, in exact order, each awaited before the next:
///
/// 1. List targets; select the first page-type target.
/// 2. Attach to it with flattened session semantics.
/// 3. Resolve the window owning the target.
/// 4. Enable the page-lifecycle domain.
/// 5. Register the bridge signaling binding.
/// 6. Install the bridge bootstrap for every new document.
/// 7. Enable the runtime-evaluation domain.
///
/// # Errors
///
/// - [`Error::NoPageTarget`] if step 1 finds no page target
/// - any transport or CDP error from the failing step
pub async fn negotiate(connection: &Connection) -> Result<Session> {
    // Step 1: discover the page target
    let targets: GetTargetsResult =
        from_value(connection.send(Command::GetTargets, None).await?)?;
    let target = targets
        .target_infos
        .into_iter()
        .find(|t| t.is_page())
        .ok_or(Error::NoPageTarget)?;
    debug!(target_id = %target.target_id, url = %target.url, "Selected page target");

    // Step 2: attach with flat session semantics
    let attached: AttachToTargetResult = from_value(
        connection
            .send(
                Command::AttachToTarget {
                    target_id: target.target_id.clone(),
                    flatten: true,
                },
                None,
            )
            .await?,
    )?;
    let session_id = attached.session_id;
    debug!(%session_id, "Attached to page target");

    // Step 3: resolve the owning window
    let window: GetWindowForTargetResult = from_value(
        connection
            .send(Command::GetWindowForTarget, Some(&session_id))
            .await?,
    )?;

    // Step 4: page-lifecycle domain
    connection
        .send(Command::PageEnable, Some(&session_id))
        .await?;

    // Step 5: the signaling binding, the page's only channel to the host
    connection
        .send(
            Command::AddBinding {
                name: contract::BINDING_NAME.to_string(),
            },
            Some(&session_id),
        )
        .await?;

    // Step 6: bootstrap runs in every new document before any other script
    connection
        .send(
            Command::AddScriptToEvaluateOnNewDocument {
                source: contract::BOOTSTRAP_SOURCE.to_string(),
            },
            Some(&session_id),
        )
        .await?;

    // Step 7: runtime-evaluation domain
    connection
        .send(Command::RuntimeEnable, Some(&session_id))
        .await?;

    info!(
        target_id = %target.target_id,
        %session_id,
        window_id = %window.window_id,
        "Session negotiated"
    );

    Ok(Session {
        target_id: target.target_id,
        session_id,
        window_id: window.window_id,
    })
}
