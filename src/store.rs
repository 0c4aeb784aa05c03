use crate::change::Change;
use crate::config::{Config, EventStateBuilder};
use crate::error::{Error, Result};
use crate::listeners::{Handler, Listener, Listeners};
use crate::path;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

/// The four operations every collaborator of a store relies on.
///
/// Implemented by [`EventState`] and [`EventStatePlus`](crate::EventStatePlus),
/// so routers, bindings or persistence helpers can be written once against
/// either layer. The trait is object safe; the generic
/// [`EventState::subscribe`] is a thin wrapper over
/// [`subscribe_boxed`](StateStore::subscribe_boxed).
pub trait StateStore {
    /// Read the value at `path`, or the whole tree for the empty path.
    fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Write `value` at `path` and notify subscribers.
    fn set(&self, path: &str, value: Value) -> Result<Value>;

    /// Register a boxed handler under `key`.
    fn subscribe_boxed(&self, key: &str, handler: Box<Handler>) -> Result<Subscription>;

    /// Tear the store down. Idempotent.
    fn destroy(&self);

    /// Whether [`destroy`](StateStore::destroy) has been called.
    fn is_destroyed(&self) -> bool;
}

struct Inner {
    root: RefCell<Value>,
    listeners: RefCell<Listeners>,
    destroyed: Cell<bool>,
    on_destroy: RefCell<Vec<Box<dyn FnOnce()>>>,
    config: Config,
}

/// A JSON state tree with dot-path access and path-based notification.
///
/// `EventState` is a cheap handle: clones share the same tree and the same
/// subscribers. Construct one at the root of the application and hand clones
/// to whatever needs it.
///
/// Notification is synchronous. A write to `"user.profile.name"` calls, in
/// order, the handlers subscribed to `"user.profile.name"`, `"user.*"`,
/// `"user.profile.*"` and `"*"` before [`set`](EventState::set) returns.
///
/// # Examples
///
/// ```
/// use eventstate::EventState;
/// use serde_json::json;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let store = EventState::new(json!({"count": 0}));
/// let seen = Rc::new(Cell::new(0));
///
/// let sink = seen.clone();
/// let sub = store
///     .subscribe("count", move |value, _change| sink.set(value.as_i64().unwrap()))
///     .unwrap();
///
/// store.set("count", json!(5)).unwrap();
/// assert_eq!(seen.get(), 5);
///
/// sub.unsubscribe();
/// store.set("count", json!(6)).unwrap();
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Clone)]
pub struct EventState {
    inner: Rc<Inner>,
}

impl fmt::Debug for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventState")
            .field("root", &self.inner.root.borrow())
            .field("destroyed", &self.inner.destroyed.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for EventState {
    fn default() -> Self {
        EventState::new(Value::Object(Map::new()))
    }
}

impl EventState {
    /// Create a store owning `initial`.
    ///
    /// The store takes ownership, so later changes to the caller's data
    /// cannot reach it; clone first to keep a copy. A `null` initial value
    /// becomes an empty object.
    pub fn new(initial: Value) -> Self {
        Self::with_config(initial, Config::default())
    }

    /// Create a store from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `initial` cannot be represented as JSON.
    pub fn from_serialize<S: Serialize>(initial: &S) -> Result<Self> {
        Ok(Self::new(serde_json::to_value(initial)?))
    }

    /// Start configuring a store.
    pub fn builder(initial: Value) -> EventStateBuilder {
        EventStateBuilder::new(initial)
    }

    pub(crate) fn with_config(initial: Value, config: Config) -> Self {
        let root = match initial {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        EventState {
            inner: Rc::new(Inner {
                root: RefCell::new(root),
                listeners: RefCell::new(Listeners::default()),
                destroyed: Cell::new(false),
                on_destroy: RefCell::new(Vec::new()),
                config,
            }),
        }
    }

    /// Read the value at `path`.
    ///
    /// The empty path returns the whole tree. A missing segment, or a
    /// segment below a scalar, yields `Ok(None)`. The returned value is a
    /// copy; change the store through [`set`](EventState::set).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Destroyed`] after [`destroy`](EventState::destroy).
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        self.ensure_live()?;
        let root = self.inner.root.borrow();
        Ok(path::resolve(&root, path).cloned())
    }

    /// Write `value` at `path`, creating intermediate objects as needed, and
    /// notify subscribers before returning the written value.
    ///
    /// The empty path is ignored: nothing is written, nobody is notified,
    /// and `value` is handed back. The root can never be overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Destroyed`] after [`destroy`](EventState::destroy),
    /// or [`Error::InvalidPath`] if a segment addresses an array with
    /// something other than an index up to its length.
    pub fn set(&self, path: &str, value: Value) -> Result<Value> {
        self.ensure_live()?;
        if path.is_empty() {
            return Ok(value);
        }

        let old_value = path::assign(&mut self.inner.root.borrow_mut(), path, value.clone())?;
        let change = Change::new(path, value, old_value);
        self.notify(&change);
        Ok(change.value)
    }

    /// Register `handler` under `key` and return a handle that removes it.
    ///
    /// `key` is an exact path, an ancestor wildcard such as `"user.*"`, or
    /// `"*"` for every write. The same closure may be registered several
    /// times; each registration is removed independently.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty key and
    /// [`Error::Destroyed`] after [`destroy`](EventState::destroy).
    pub fn subscribe<F>(&self, key: &str, handler: F) -> Result<Subscription>
    where
        F: Fn(&Value, &Change) + 'static,
    {
        self.subscribe_boxed(key, Box::new(handler))
    }

    /// Boxed form of [`subscribe`](EventState::subscribe).
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](EventState::subscribe).
    pub fn subscribe_boxed(&self, key: &str, handler: Box<Handler>) -> Result<Subscription> {
        self.ensure_live()?;
        if key.is_empty() {
            return Err(Error::invalid_argument(
                "subscription key must be a non-empty path, \"<path>.*\" or \"*\"",
            ));
        }
        let id = self.inner.listeners.borrow_mut().insert(key, handler);
        Ok(Subscription {
            inner: Rc::downgrade(&self.inner),
            key: key.to_string(),
            id,
        })
    }

    /// Destroy the store: drop every subscriber and the tree, and make all
    /// further reads, writes and subscriptions fail with
    /// [`Error::Destroyed`]. Calling it again does nothing.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner.listeners.borrow_mut().clear();
        self.inner.root.replace(Value::Null);
        let hooks = std::mem::take(&mut *self.inner.on_destroy.borrow_mut());
        for hook in hooks {
            hook();
        }
        log::debug!("eventstate: store destroyed");
    }

    /// Run `hook` once when the store is destroyed, whoever destroys it.
    /// Runs immediately if the store is already destroyed.
    pub(crate) fn on_destroy(&self, hook: impl FnOnce() + 'static) {
        if self.is_destroyed() {
            hook();
        } else {
            self.inner.on_destroy.borrow_mut().push(Box::new(hook));
        }
    }

    /// Whether [`destroy`](EventState::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Number of handlers registered under exactly `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.inner.listeners.borrow().count(key)
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// A handle that does not keep the store alive.
    ///
    /// Handlers that need to read the store back should capture this
    /// instead of a clone, since a clone captured by one of the store's own
    /// handlers keeps the store alive until it is destroyed.
    pub fn downgrade(&self) -> WeakEventState {
        WeakEventState {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.inner.destroyed.get() {
            Err(Error::Destroyed)
        } else {
            Ok(())
        }
    }

    fn notify(&self, change: &Change) {
        for key in path::notification_keys(&change.path, self.inner.config.global_notify) {
            let group = self.inner.listeners.borrow().snapshot(&key);
            for listener in group {
                if listener.is_active() {
                    self.invoke(&key, &listener, change);
                }
            }
        }
    }

    fn invoke(&self, key: &str, listener: &Listener, change: &Change) {
        if !self.inner.config.isolate_handlers {
            listener.call(&change.value, change);
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.call(&change.value, change)));
        if let Err(payload) = outcome {
            log::error!(
                "eventstate: handler for '{key}' panicked on write to '{}': {}",
                change.path,
                panic_message(&*payload)
            );
        }
    }
}

impl StateStore for EventState {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        EventState::get(self, path)
    }

    fn set(&self, path: &str, value: Value) -> Result<Value> {
        EventState::set(self, path, value)
    }

    fn subscribe_boxed(&self, key: &str, handler: Box<Handler>) -> Result<Subscription> {
        EventState::subscribe_boxed(self, key, handler)
    }

    fn destroy(&self) {
        EventState::destroy(self)
    }

    fn is_destroyed(&self) -> bool {
        EventState::is_destroyed(self)
    }
}

/// Non-owning handle to an [`EventState`], from
/// [`EventState::downgrade`].
#[derive(Clone, Debug)]
pub struct WeakEventState {
    inner: Weak<Inner>,
}

impl WeakEventState {
    /// The store, if it is still alive.
    pub fn upgrade(&self) -> Option<EventState> {
        self.inner.upgrade().map(|inner| EventState { inner })
    }
}

/// Registration handle returned by `subscribe`.
///
/// Dropping it leaves the handler registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    inner: Weak<Inner>,
    key: String,
    id: u64,
}

impl Subscription {
    /// Remove this registration. Safe to call any number of times, and
    /// after the store is gone.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.borrow_mut().remove(&self.key, self.id);
        }
    }

    /// The key this handler was registered under.
    pub fn key(&self) -> &str {
        &self.key
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
