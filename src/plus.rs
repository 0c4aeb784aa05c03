use crate::async_op::{field, AsyncOps, AsyncStatus};
use crate::change::Change;
use crate::error::{BoxError, Error, Result};
use crate::listeners::Handler;
use crate::store::{EventState, StateStore, Subscription};
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tokio_util::sync::CancellationToken;

struct PlusInner {
    store: EventState,
    depth: Cell<usize>,
    pending: RefCell<IndexMap<String, Value>>,
    ops: RefCell<AsyncOps>,
}

/// An [`EventState`] with write batching and async fetch state.
///
/// Subscribers see the same per-path notifications as on the plain store;
/// batching only changes *when* they arrive and drops intermediate values.
///
/// # Examples
///
/// ```
/// use eventstate::EventStatePlus;
/// use serde_json::json;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let store = EventStatePlus::new(json!({}));
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let sink = seen.clone();
/// store.subscribe("x", move |value, _| sink.borrow_mut().push(value.clone())).unwrap();
///
/// store.batch(|| {
///     store.set("x", json!(1)).unwrap();
///     store.set("x", json!(2)).unwrap();
/// }).unwrap();
///
/// assert_eq!(*seen.borrow(), vec![json!(2)]);
/// ```
#[derive(Clone)]
pub struct EventStatePlus {
    inner: Rc<PlusInner>,
}

impl fmt::Debug for EventStatePlus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStatePlus")
            .field("store", &self.inner.store)
            .field("batch_depth", &self.inner.depth.get())
            .field("pending", &self.inner.pending.borrow().len())
            .field("in_flight", &self.inner.ops.borrow().len())
            .finish()
    }
}

impl Default for EventStatePlus {
    fn default() -> Self {
        EventStatePlus::upgrade(EventState::default())
    }
}

impl EventStatePlus {
    /// Create a store owning `initial`, wrapped in the facade.
    pub fn new(initial: Value) -> Self {
        Self::upgrade(EventState::new(initial))
    }

    /// Wrap an existing store. The facade shares the store's tree and
    /// subscribers; destroying the facade destroys the store. Destroying
    /// the store directly has the same effect on the facade: in-flight
    /// operations are cancelled and buffered writes dropped.
    pub fn upgrade(store: EventState) -> Self {
        let inner = Rc::new(PlusInner {
            store,
            depth: Cell::new(0),
            pending: RefCell::new(IndexMap::new()),
            ops: RefCell::new(AsyncOps::default()),
        });
        let weak = Rc::downgrade(&inner);
        inner.store.on_destroy(move || {
            if let Some(inner) = weak.upgrade() {
                inner.ops.borrow_mut().cancel_all();
                inner.pending.borrow_mut().clear();
            }
        });
        EventStatePlus { inner }
    }

    /// The wrapped store. Writes made through it bypass batching.
    pub fn store(&self) -> &EventState {
        &self.inner.store
    }

    /// Read the value at `path`. Writes buffered by an open batch are not
    /// visible until it flushes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Destroyed`] after [`destroy`](EventStatePlus::destroy).
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        self.inner.store.get(path)
    }

    /// Write `value` at `path`, or buffer it while a batch is open.
    ///
    /// # Errors
    ///
    /// Same as [`EventState::set`]. Inside a batch, path errors surface when
    /// the batch flushes.
    pub fn set(&self, path: &str, value: Value) -> Result<Value> {
        self.ensure_live()?;
        if self.inner.depth.get() == 0 {
            return self.inner.store.set(path, value);
        }
        if !path.is_empty() {
            self.inner
                .pending
                .borrow_mut()
                .insert(path.to_string(), value.clone());
        }
        Ok(value)
    }

    /// See [`EventState::subscribe`].
    ///
    /// # Errors
    ///
    /// Same as [`EventState::subscribe`].
    pub fn subscribe<F>(&self, key: &str, handler: F) -> Result<Subscription>
    where
        F: Fn(&Value, &Change) + 'static,
    {
        self.inner.store.subscribe(key, handler)
    }

    /// Run `f` with writes buffered, then flush them.
    ///
    /// Writing a path twice keeps only the last value. On flush each
    /// distinct path is written once, in the order it was first written.
    /// Nested batches flush only when the outermost one returns. If `f`
    /// panics the batch is closed and its buffered writes are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Destroyed`] if the store is destroyed, or the first
    /// error raised while flushing. Every buffered path is still attempted.
    pub fn batch<T>(&self, f: impl FnOnce() -> T) -> Result<T> {
        self.ensure_live()?;
        let scope = BatchScope::enter(&self.inner);
        let out = f();
        drop(scope);
        if self.inner.depth.get() == 0 {
            self.flush()?;
        }
        Ok(out)
    }

    /// Write several paths as one batch.
    ///
    /// Accepts anything that yields `(path, value)` pairs: a
    /// `serde_json::Map`, an `IndexMap`, a `Vec` of tuples, an array of
    /// tuples.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventstate::EventStatePlus;
    /// use serde_json::json;
    ///
    /// let store = EventStatePlus::default();
    /// store.set_many([("user.name", json!("Bob")), ("user.age", json!(42))]).unwrap();
    /// assert_eq!(store.get("user").unwrap(), Some(json!({"name": "Bob", "age": 42})));
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`batch`](EventStatePlus::batch).
    pub fn set_many<I, K>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.batch(|| {
            entries
                .into_iter()
                .try_for_each(|(path, value)| self.set(path.as_ref(), value).map(drop))
        })?
    }

    /// Write every member of a JSON object as one batch, keys being paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `entries` is not an object,
    /// otherwise the same as [`batch`](EventStatePlus::batch).
    pub fn set_many_json(&self, entries: Value) -> Result<()> {
        match entries {
            Value::Object(map) => self.set_many(map),
            other => Err(Error::invalid_argument(format!(
                "set_many expects an object of path/value pairs, got {other}"
            ))),
        }
    }

    /// Drive `<path>.status`, `<path>.data` and `<path>.error` from an async
    /// fetch, last request wins.
    ///
    /// Any operation already in flight at `path` is cancelled. The store
    /// then sets `status = "loading"` and `error = null`, and awaits
    /// `fetcher`, which receives a token it should watch to abandon its
    /// work. On success `data` and `status = "success"` are written and the
    /// value returned; on failure `status = "error"` and `error = <message>`.
    /// An operation whose token was cancelled by the time the fetcher
    /// settles writes nothing: the newer operation or [`cancel`] owns the
    /// status.
    ///
    /// Dropping the returned future before it completes (a timeout, a losing
    /// `select!` branch, an aborted task) cancels the token, clears the
    /// in-flight record and sets `status = "cancelled"`, unless a newer
    /// operation already took over the path.
    ///
    /// [`cancel`]: EventStatePlus::cancel
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if superseded, cancelled, or the store was
    ///   destroyed meanwhile.
    /// - [`Error::Fetch`] with the fetcher's error as `source`.
    /// - [`Error::InvalidArgument`] for an empty path.
    /// - [`Error::Destroyed`] if the store is already destroyed.
    pub async fn set_async<F, Fut, E>(&self, path: &str, fetcher: F) -> Result<Value>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
        E: Into<BoxError>,
    {
        self.ensure_live()?;
        if path.is_empty() {
            return Err(Error::invalid_argument("set_async requires a non-empty path"));
        }

        let (id, token) = self.inner.ops.borrow_mut().start(path);
        let mut in_flight = InFlight {
            inner: &self.inner,
            path,
            id,
            token: token.clone(),
            settled: false,
        };
        let status = field(path, "status");
        let started = self.batch(|| {
            self.set(&status, AsyncStatus::Loading.into())?;
            self.set(&field(path, "error"), Value::Null)
        });
        if let Err(e) = started.and_then(|inner| inner) {
            in_flight.settle();
            return Err(e);
        }
        log::debug!("eventstate: async '{path}' loading (operation {id})");

        let outcome = fetcher(token.clone()).await;

        in_flight.settle();
        if token.is_cancelled() || self.is_destroyed() {
            log::debug!("eventstate: async '{path}' operation {id} cancelled");
            return Err(Error::Cancelled {
                path: path.to_string(),
            });
        }

        match outcome {
            Ok(value) => {
                self.batch(|| {
                    self.set(&field(path, "data"), value.clone())?;
                    self.set(&status, AsyncStatus::Success.into())
                })??;
                log::debug!("eventstate: async '{path}' operation {id} succeeded");
                Ok(value)
            }
            Err(err) => {
                let source: BoxError = err.into();
                let message = source.to_string();
                self.batch(|| {
                    self.set(&status, AsyncStatus::Error.into())?;
                    self.set(&field(path, "error"), Value::String(message))
                })??;
                log::debug!("eventstate: async '{path}' operation {id} failed: {source}");
                Err(Error::Fetch {
                    path: path.to_string(),
                    source,
                })
            }
        }
    }

    /// Cancel the operation in flight at `path` and set its status to
    /// `"cancelled"`. Does nothing if none is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Destroyed`] after [`destroy`](EventStatePlus::destroy).
    pub fn cancel(&self, path: &str) -> Result<()> {
        self.ensure_live()?;
        let cancelled = self.inner.ops.borrow_mut().cancel(path);
        if cancelled {
            log::debug!("eventstate: async '{path}' cancelled");
            self.set(&field(path, "status"), AsyncStatus::Cancelled.into())?;
        }
        Ok(())
    }

    /// The async status recorded at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Destroyed`] after [`destroy`](EventStatePlus::destroy).
    pub fn status(&self, path: &str) -> Result<AsyncStatus> {
        let stored = self.get(&field(path, "status"))?;
        Ok(AsyncStatus::from_value(stored.as_ref()))
    }

    /// Whether an async operation is in flight at `path`.
    pub fn is_pending(&self, path: &str) -> bool {
        self.inner.ops.borrow().contains(path)
    }

    /// Cancel every in-flight operation, drop buffered writes and destroy
    /// the wrapped store. Idempotent.
    pub fn destroy(&self) {
        self.inner.store.destroy();
    }

    /// Whether the store has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.store.is_destroyed()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(Error::Destroyed)
        } else {
            Ok(())
        }
    }

    fn flush(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.inner.pending.borrow_mut());
        if pending.is_empty() {
            return Ok(());
        }
        log::debug!("eventstate: flushing {} batched writes", pending.len());

        let mut first_err = None;
        for (path, value) in pending {
            if let Err(e) = self.inner.store.set(&path, value) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl StateStore for EventStatePlus {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        EventStatePlus::get(self, path)
    }

    fn set(&self, path: &str, value: Value) -> Result<Value> {
        EventStatePlus::set(self, path, value)
    }

    fn subscribe_boxed(&self, key: &str, handler: Box<Handler>) -> Result<Subscription> {
        self.inner.store.subscribe_boxed(key, handler)
    }

    fn destroy(&self) {
        EventStatePlus::destroy(self)
    }

    fn is_destroyed(&self) -> bool {
        EventStatePlus::is_destroyed(self)
    }
}

/// Guard over one `set_async` operation. Settled on every normal exit; if
/// the future is dropped first, the guard cancels the token and, while it
/// still owns the record, marks the path cancelled.
struct InFlight<'a> {
    inner: &'a PlusInner,
    path: &'a str,
    id: u64,
    token: CancellationToken,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self) {
        self.settled = true;
        self.inner.ops.borrow_mut().finish(self.path, self.id);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.token.cancel();
        let owned = self.inner.ops.borrow_mut().finish(self.path, self.id);
        if !owned || self.inner.store.is_destroyed() {
            return;
        }
        log::debug!(
            "eventstate: async '{}' operation {} dropped before completion",
            self.path,
            self.id
        );
        let status = field(self.path, "status");
        if let Err(e) = self.inner.store.set(&status, AsyncStatus::Cancelled.into()) {
            log::warn!("eventstate: failed to mark '{status}' cancelled: {e}");
        }
    }
}

/// Open batch level; closing the outermost level during a panic discards
/// the buffer.
struct BatchScope<'a> {
    inner: &'a PlusInner,
}

impl<'a> BatchScope<'a> {
    fn enter(inner: &'a PlusInner) -> Self {
        inner.depth.set(inner.depth.get() + 1);
        BatchScope { inner }
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        let depth = self.inner.depth.get().saturating_sub(1);
        self.inner.depth.set(depth);
        if depth == 0 && std::thread::panicking() {
            let discarded = self.inner.pending.borrow_mut().drain(..).count();
            log::debug!("eventstate: batch panicked, discarded {discarded} buffered writes");
        }
    }
}
