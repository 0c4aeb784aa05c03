//! A store bound to a state-shape type.
//!
//! Paths stay plain strings, so untyped collaborators holding the inner
//! [`EventState`] keep working, but writes made through [`TypedState`] are
//! checked against the shape before they land.

use crate::change::Change;
use crate::error::{Error, Result};
use crate::path;
use crate::store::{EventState, Subscription};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// [`EventState`] parameterized over the shape `S` of its tree.
///
/// # Examples
///
/// ```
/// use eventstate::TypedState;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct App {
///     count: u32,
/// }
///
/// let store = TypedState::new(&App { count: 0 }).unwrap();
/// store.set("count", &3).unwrap();
/// assert_eq!(store.state().unwrap().count, 3);
///
/// // A string does not fit `count: u32`; the write is refused.
/// assert!(store.set("count", &"three").is_err());
/// assert_eq!(store.get::<u32>("count").unwrap(), Some(3));
/// ```
pub struct TypedState<S> {
    store: EventState,
    shape: PhantomData<fn() -> S>,
}

impl<S> Clone for TypedState<S> {
    fn clone(&self) -> Self {
        TypedState {
            store: self.store.clone(),
            shape: PhantomData,
        }
    }
}

impl<S> fmt::Debug for TypedState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedState")
            .field("shape", &std::any::type_name::<S>())
            .field("store", &self.store)
            .finish()
    }
}

impl<S> TypedState<S>
where
    S: Serialize + DeserializeOwned,
{
    /// Create a store holding `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `initial` cannot be serialized.
    pub fn new(initial: &S) -> Result<Self> {
        Ok(TypedState {
            store: EventState::from_serialize(initial)?,
            shape: PhantomData,
        })
    }

    /// Adopt an existing store after checking its tree has the shape `S`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shape`] if the tree does not deserialize as `S`.
    pub fn from_store(store: EventState) -> Result<Self> {
        let typed = TypedState {
            store,
            shape: PhantomData,
        };
        typed.state()?;
        Ok(typed)
    }

    /// Deserialize the whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Destroyed`] after destroy, or [`Error::Shape`] if an
    /// untyped writer broke the shape.
    pub fn state(&self) -> Result<S> {
        let root = self.store.get("")?.unwrap_or(Value::Null);
        serde_json::from_value(root).map_err(|source| Error::Shape {
            path: String::new(),
            source,
        })
    }

    /// Read and deserialize the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the value does not deserialize as `T`.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.store.get(path)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize `value` and write it at `path`, provided the resulting
    /// tree still deserializes as `S`. A refused write mutates nothing and
    /// notifies nobody.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shape`] when the write would break the shape, and
    /// otherwise the errors of [`EventState::set`].
    pub fn set<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut candidate = self.store.get("")?.unwrap_or(Value::Null);
        if path.is_empty() {
            return Ok(());
        }

        path::assign(&mut candidate, path, value.clone())?;
        if let Err(source) = serde_json::from_value::<S>(candidate) {
            return Err(Error::Shape {
                path: path.to_string(),
                source,
            });
        }

        self.store.set(path, value)?;
        Ok(())
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
        self.store.subscribe(key, handler)
    }

    /// See [`EventState::destroy`].
    pub fn destroy(&self) {
        self.store.destroy()
    }

    /// The untyped store, for collaborators that speak plain paths.
    pub fn store(&self) -> &EventState {
        &self.store
    }
}
