//! The function registry side-table.
//!
//! Decorator metadata has nowhere to live on a bare function pointer, so
//! registration happens explicitly at startup: the generated handler
//! module registers each user callable (and class factory) by name, and
//! dispatch resolves through this table. One registry instance is shared
//! process-wide.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;

use flash_codec::PayloadValue;
use flash_domain::Result;

pub type Args = Vec<PayloadValue>;
pub type Kwargs = Vec<(String, PayloadValue)>;

pub type SyncFn = Arc<dyn Fn(Args, Kwargs) -> Result<PayloadValue> + Send + Sync>;
pub type AsyncFn =
    Arc<dyn Fn(Args, Kwargs) -> BoxFuture<'static, Result<PayloadValue>> + Send + Sync>;

/// A class registered for remote execution: constructed once, then invoked
/// by method name. Instances may be cached and reused across jobs.
pub trait ClassFactory: Send + Sync {
    fn construct(&self, args: Args, kwargs: Kwargs) -> Result<Box<dyn ClassInstance>>;
}

pub trait ClassInstance: Send {
    fn call_method(&mut self, method: &str, args: Args, kwargs: Kwargs) -> Result<PayloadValue>;
}

/// One registered callable.
#[derive(Clone)]
pub enum UserCallable {
    Sync(SyncFn),
    Async(AsyncFn),
    Class(Arc<dyn ClassFactory>),
}

/// Name → callable map for the current process.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: RwLock<HashMap<String, UserCallable>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, callable: UserCallable) {
        self.entries.write().insert(name.into(), callable);
    }

    /// Register a synchronous function.
    pub fn register_fn<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Args, Kwargs) -> Result<PayloadValue> + Send + Sync + 'static,
    {
        self.register(name, UserCallable::Sync(Arc::new(f)));
    }

    /// Register an async function.
    pub fn register_async<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Args, Kwargs) -> BoxFuture<'static, Result<PayloadValue>>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, UserCallable::Async(Arc::new(f)));
    }

    /// Register a class factory.
    pub fn register_class(&self, name: impl Into<String>, factory: Arc<dyn ClassFactory>) {
        self.register(name, UserCallable::Class(factory));
    }

    pub fn lookup(&self, name: &str) -> Option<UserCallable> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Sorted names, for "not found; available: …" diagnostics.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let registry = FunctionRegistry::new();
        registry.register_fn("double", |args, _kwargs| match args.first() {
            Some(PayloadValue::Int(n)) => Ok(PayloadValue::Int(n * 2)),
            _ => Ok(PayloadValue::Null),
        });

        assert!(registry.contains("double"));
        assert!(!registry.contains("triple"));

        match registry.lookup("double") {
            Some(UserCallable::Sync(f)) => {
                let out = f(vec![PayloadValue::Int(21)], Vec::new()).unwrap();
                assert_eq!(out, PayloadValue::Int(42));
            }
            _ => panic!("expected a sync callable"),
        }
    }

    #[test]
    fn names_are_sorted() {
        let registry = FunctionRegistry::new();
        registry.register_fn("zeta", |_, _| Ok(PayloadValue::Null));
        registry.register_fn("alpha", |_, _| Ok(PayloadValue::Null));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }
}
