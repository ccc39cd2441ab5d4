//! Host-side table of functions invocable from the page.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

// ============================================================================
// Types
// ============================================================================

/// An async handler exposed to the page under a name.
pub type ExposedFunction = Arc<dyn Fn(Value) -> BoxFuture<'static, Value> + Send + Sync>;

// ============================================================================
// FunctionRegistry
// ============================================================================

/// Named async handlers the page can invoke through `callFn`.
///
/// Registration overwrites any prior handler under the same name; there is
/// no unregister. Lookups during dispatch never mutate the table.
///
/// # Example
///
/// ```ignore
/// let registry = FunctionRegistry::new();
/// registry.register("greet", |args| async move {
///     serde_json::json!({"hello": args})
/// });
/// ```
#[derive(Default)]
pub struct FunctionRegistry {
    /// Name → handler table.
    functions: Mutex<FxHashMap<String, ExposedFunction>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `name`, replacing any existing one.
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        let name = name.into();
        let handler: ExposedFunction = Arc::new(move |args| handler(args).boxed());

        let replaced = self.functions.lock().insert(name.clone(), handler);
        if replaced.is_some() {
            debug!(%name, "Replaced exposed function");
        } else {
            debug!(%name, "Registered exposed function");
        }
    }

    /// Looks up the handler registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ExposedFunction> {
        self.functions.lock().get(name).cloned()
    }

    /// Returns the number of registered functions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.lock().len()
    }

    /// Returns `true` if no functions are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
