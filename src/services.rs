//! Service registry — named services and their invocable methods.
//!
//! A service is a named group of async method handlers, registered wholesale
//! and unregistered wholesale. Re-registering under an existing name replaces
//! the whole method set (last writer wins). Calls that are in flight when a
//! replacement lands complete against the handler they captured at call time.
//!
//! ## Example
//!
//! ```
//! use deskbus::{Bus, ServiceMethods, WindowId};
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = Bus::default();
//! let handle = bus.handle(WindowId::new("calc-window"));
//!
//! handle.register_service(
//!     "calc",
//!     ServiceMethods::new().method("add", |args: Vec<Value>| async move {
//!         let a = args[0].as_i64().unwrap_or(0);
//!         let b = args[1].as_i64().unwrap_or(0);
//!         Ok(json!(a + b))
//!     }),
//! );
//!
//! let sum = handle.call_service("calc", "add", vec![json!(2), json!(3)]).await.unwrap();
//! assert_eq!(sum, json!(5));
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::error::{BusError, HandlerError};
use crate::message::WindowId;

/// Boxed future returned by a service method handler.
pub type MethodFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

/// A service method handler: positional JSON args in, eventual JSON out.
pub type MethodFn = dyn Fn(Vec<Value>) -> MethodFuture + Send + Sync;

/// The method set of a service, built with a chaining builder.
#[derive(Clone, Default)]
pub struct ServiceMethods {
    methods: HashMap<String, Arc<MethodFn>>,
}

impl ServiceMethods {
    /// Start an empty method set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method handler. Returns `self` for chaining.
    pub fn method<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.methods
            .insert(name.to_string(), Arc::new(move |args| Box::pin(handler(args))));
        self
    }

    /// Registered method names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether the set contains no methods.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn get(&self, name: &str) -> Option<Arc<MethodFn>> {
        self.methods.get(name).cloned()
    }
}

struct ServiceEntry {
    owner: WindowId,
    methods: ServiceMethods,
}

/// Registry of named services.
///
/// Cloning is cheap and shares the underlying table. Lookup and dispatch are
/// synchronous; only awaiting the handler's result suspends, so concurrent
/// calls to the same or different methods are independent.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    inner: Arc<RwLock<HashMap<String, ServiceEntry>>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `methods` under `name`, atomically replacing any prior
    /// registration with that name.
    pub fn register(&self, owner: WindowId, name: &str, methods: ServiceMethods) {
        let mut inner = self.inner.write().unwrap();
        let replaced = inner
            .insert(name.to_string(), ServiceEntry { owner, methods })
            .is_some();
        debug!(service = name, replaced, "service registered");
    }

    /// Remove the service. Unknown names are a no-op.
    pub fn unregister(&self, name: &str) {
        if self.inner.write().unwrap().remove(name).is_some() {
            debug!(service = name, "service unregistered");
        }
    }

    /// Remove every service registered by `window`. Returns how many were
    /// removed.
    pub fn remove_owner(&self, window: &WindowId) -> usize {
        let mut inner = self.inner.write().unwrap();
        let before = inner.len();
        inner.retain(|_, entry| entry.owner != *window);
        before - inner.len()
    }

    /// Invoke `method` on the service named `service`.
    ///
    /// Fails immediately with [`BusError::ServiceNotFound`] or
    /// [`BusError::MethodNotFound`] when lookup misses; otherwise awaits the
    /// handler captured at lookup time and returns its result.
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, BusError> {
        let handler = {
            let inner = self.inner.read().unwrap();
            let entry = inner
                .get(service)
                .ok_or_else(|| BusError::ServiceNotFound(service.to_string()))?;
            entry
                .methods
                .get(method)
                .ok_or_else(|| BusError::MethodNotFound {
                    service: service.to_string(),
                    method: method.to_string(),
                })?
        };

        handler(args).await.map_err(BusError::Handler)
    }

    /// Names of all registered services, sorted.
    pub fn services(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        let mut names: Vec<String> = inner.keys().cloned().collect();
        names.sort();
        names
    }

    /// Method names of one service, sorted. Empty when the service is
    /// unknown.
    pub fn service_methods(&self, name: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner
            .get(name)
            .map(|entry| entry.methods.names())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn calc_methods() -> ServiceMethods {
        ServiceMethods::new()
            .method("add", |args: Vec<Value>| async move {
                let a = args[0].as_i64().unwrap_or(0);
                let b = args[1].as_i64().unwrap_or(0);
                Ok(json!(a + b))
            })
            .method("neg", |args: Vec<Value>| async move {
                let a = args[0].as_i64().unwrap_or(0);
                Ok(json!(-a))
            })
    }

    #[tokio::test]
    async fn call_resolves_handler_result() {
        let registry = ServiceRegistry::new();
        registry.register(WindowId::new("w1"), "calc", calc_methods());

        let result = registry
            .call("calc", "add", vec![json!(2), json!(3)])
            .await
            .unwrap();
        assert_eq!(result, json!(5));
    }

    #[tokio::test]
    async fn missing_service_and_method_are_distinguishable() {
        let registry = ServiceRegistry::new();
        registry.register(WindowId::new("w1"), "calc", calc_methods());

        assert!(matches!(
            registry.call("nope", "add", vec![]).await,
            Err(BusError::ServiceNotFound(ref s)) if s == "nope"
        ));
        assert!(matches!(
            registry.call("calc", "sub", vec![]).await,
            Err(BusError::MethodNotFound { ref method, .. }) if method == "sub"
        ));
    }

    #[tokio::test]
    async fn handler_failure_propagates() {
        let registry = ServiceRegistry::new();
        registry.register(
            WindowId::new("w1"),
            "calc",
            ServiceMethods::new().method("fail", |_args| async {
                Err(HandlerError::Rejected("bad input".into()))
            }),
        );

        let result = registry.call("calc", "fail", vec![]).await;
        assert!(matches!(
            result,
            Err(BusError::Handler(HandlerError::Rejected(_)))
        ));
    }

    #[tokio::test]
    async fn reregistration_replaces_the_whole_method_set() {
        let registry = ServiceRegistry::new();
        registry.register(WindowId::new("w1"), "calc", calc_methods());
        registry.register(
            WindowId::new("w2"),
            "calc",
            ServiceMethods::new().method("mul", |args: Vec<Value>| async move {
                let a = args[0].as_i64().unwrap_or(0);
                let b = args[1].as_i64().unwrap_or(0);
                Ok(json!(a * b))
            }),
        );

        // Old method is gone, new one works.
        assert!(matches!(
            registry.call("calc", "add", vec![]).await,
            Err(BusError::MethodNotFound { .. })
        ));
        let result = registry
            .call("calc", "mul", vec![json!(4), json!(5)])
            .await
            .unwrap();
        assert_eq!(result, json!(20));
    }

    #[tokio::test]
    async fn in_flight_call_survives_replacement() {
        use tokio::sync::oneshot;

        let registry = ServiceRegistry::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = std::sync::Mutex::new(Some(release_rx));

        registry.register(
            WindowId::new("w1"),
            "slow",
            ServiceMethods::new().method("old", move |_args| {
                let rx = release_rx.lock().unwrap().take();
                async move {
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Ok(json!("old result"))
                }
            }),
        );

        let call = tokio::spawn({
            let registry = registry.clone();
            async move { registry.call("slow", "old", vec![]).await }
        });
        tokio::task::yield_now().await;

        // Replace while the first call is suspended inside the old handler.
        registry.register(WindowId::new("w1"), "slow", ServiceMethods::new());
        let _ = release_tx.send(());

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!("old result"));
    }

    #[test]
    fn unregister_and_introspection() {
        let registry = ServiceRegistry::new();
        assert!(registry.services().is_empty());
        assert!(registry.service_methods("calc").is_empty());

        registry.register(WindowId::new("w1"), "calc", calc_methods());
        registry.register(WindowId::new("w2"), "clock", ServiceMethods::new());

        assert_eq!(registry.services(), vec!["calc", "clock"]);
        assert_eq!(registry.service_methods("calc"), vec!["add", "neg"]);

        registry.unregister("calc");
        registry.unregister("calc");
        assert_eq!(registry.services(), vec!["clock"]);
    }

    #[test]
    fn remove_owner_drops_only_that_windows_services() {
        let registry = ServiceRegistry::new();
        registry.register(WindowId::new("w1"), "calc", calc_methods());
        registry.register(WindowId::new("w1"), "fmt", ServiceMethods::new());
        registry.register(WindowId::new("w2"), "clock", ServiceMethods::new());

        assert_eq!(registry.remove_owner(&WindowId::new("w1")), 2);
        assert_eq!(registry.services(), vec!["clock"]);
        assert_eq!(registry.remove_owner(&WindowId::new("w1")), 0);
    }
}
