//! Browser-callback registry.
//!
//! Client code in the browser can address named callbacks on the server
//! (`figwheel-event: "callback"`). Handlers are registered process-wide at
//! startup; unknown names are dropped by the caller.

use std::sync::LazyLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// A registered browser-callback handler.
pub type CallbackFn = Box<dyn Fn(serde_json::Value) + Send + Sync>;

static REGISTRY: LazyLock<RwLock<FxHashMap<String, CallbackFn>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

/// Register a handler under a callback name, replacing any previous one.
pub fn register(name: impl Into<String>, handler: impl Fn(serde_json::Value) + Send + Sync + 'static) {
    REGISTRY.write().insert(name.into(), Box::new(handler));
}

/// Remove a handler.
pub fn unregister(name: &str) {
    REGISTRY.write().remove(name);
}

/// Invoke the handler registered under `name` with the given content.
/// Returns whether a handler existed.
pub fn dispatch(name: &str, content: serde_json::Value) -> bool {
    let registry = REGISTRY.read();
    match registry.get(name) {
        Some(handler) => {
            handler(content);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispatch_invokes_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        register("test-dispatch-hit", move |content| {
            assert_eq!(content["x"], 1);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dispatch("test-dispatch-hit", serde_json::json!({"x": 1})));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        unregister("test-dispatch-hit");
    }

    #[test]
    fn test_unknown_name_reports_missing() {
        assert!(!dispatch("test-no-such-callback", serde_json::Value::Null));
    }

    #[test]
    fn test_unregister_removes_handler() {
        register("test-unregister", |_| {});
        assert!(dispatch("test-unregister", serde_json::Value::Null));

        unregister("test-unregister");
        assert!(!dispatch("test-unregister", serde_json::Value::Null));
    }
}
