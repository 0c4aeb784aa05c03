use crate::change::Change;
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Callback invoked with the written value and the change detail.
pub type Handler = dyn Fn(&Value, &Change);

/// One registered handler.
///
/// `active` is cleared on removal so a notification pass that already
/// captured this entry skips it.
pub(crate) struct Listener {
    id: u64,
    active: Cell<bool>,
    handler: Box<Handler>,
}

impl Listener {
    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn call(&self, value: &Value, change: &Change) {
        (self.handler)(value, change)
    }
}

/// Handlers grouped by subscription key, each group in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    by_key: HashMap<String, Vec<Rc<Listener>>>,
}

impl Listeners {
    /// Register `handler` under `key` and return its id.
    pub(crate) fn insert(&mut self, key: &str, handler: Box<Handler>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.by_key
            .entry(key.to_string())
            .or_default()
            .push(Rc::new(Listener {
                id,
                active: Cell::new(true),
                handler,
            }));
        id
    }

    /// Remove the handler with `id` from `key`. Returns `false` if it was
    /// already gone.
    pub(crate) fn remove(&mut self, key: &str, id: u64) -> bool {
        let Some(group) = self.by_key.get_mut(key) else {
            return false;
        };
        let Some(pos) = group.iter().position(|l| l.id == id) else {
            return false;
        };
        group.remove(pos).active.set(false);
        if group.is_empty() {
            self.by_key.remove(key);
        }
        true
    }

    /// Clone out the handlers registered under `key` so they can be called
    /// without holding a borrow of the registry.
    pub(crate) fn snapshot(&self, key: &str) -> Vec<Rc<Listener>> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    pub(crate) fn count(&self, key: &str) -> usize {
        self.by_key.get(key).map_or(0, Vec::len)
    }

    pub(crate) fn clear(&mut self) {
        for listener in self.by_key.values().flatten() {
            listener.active.set(false);
        }
        self.by_key.clear();
    }
}
