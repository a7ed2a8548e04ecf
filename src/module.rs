//! Extension modules attached to a webview.
//!
//! A module is any `Send + Sync` type implementing [`Module`]. Each type gets a process-wide
//! sequential key the first time it is used; a webview holds at most one module per key and owns
//! it until the webview goes away.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::sync::lock;

lazy_static! {
    static ref MODULE_KEYS: Mutex<HashMap<TypeId, usize>> = Mutex::new(HashMap::new());
}

/// Stable key of `M` for this process. The first caller for a type allocates it.
pub fn module_key<M: 'static>() -> usize {
    let mut keys = lock(&MODULE_KEYS);
    let next = keys.len();
    *keys.entry(TypeId::of::<M>()).or_insert(next)
}

/// An optional feature attached to a webview.
pub trait Module: Send + Sync + 'static {
    /// Inspect a message coming from the page before the core decodes it.
    ///
    /// Return `true` to consume it.
    fn on_message(&self, _message: &str) -> bool {
        false
    }
}

struct Entry {
    key: usize,
    value: Arc<dyn Any + Send + Sync>,
    module: Arc<dyn Module>,
}

/// Modules owned by one webview, in the order they were added.
#[derive(Default)]
pub(crate) struct Modules {
    entries: Vec<Entry>,
}

impl Modules {
    pub fn get<M: Module>(&self) -> Option<Arc<M>> {
        let key = module_key::<M>();
        let entry = self.entries.iter().find(|e| e.key == key)?;
        entry.value.clone().downcast::<M>().ok()
    }

    pub fn contains<M: Module>(&self) -> bool {
        let key = module_key::<M>();
        self.entries.iter().any(|e| e.key == key)
    }

    /// Store `module` unless one of the same type is already present, in which case that one is
    /// returned and `module` is dropped.
    pub fn insert<M: Module>(&mut self, module: M) -> Arc<M> {
        if let Some(existing) = self.get::<M>() {
            log::warn!("module {} already added, keeping the first instance", std::any::type_name::<M>());
            return existing;
        }

        let module = Arc::new(module);
        self.entries.push(Entry {
            key: module_key::<M>(),
            value: module.clone(),
            module: module.clone(),
        });

        module
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn Module>> {
        self.entries.iter().map(|e| e.module.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Offer `message` to every module in order. Stops at the first one that consumes it.
pub(crate) fn intercept(modules: &[Arc<dyn Module>], message: &str) -> bool {
    modules.iter().any(|m| m.on_message(message))
}
