//! User session storage.
//!
//! The engine never owns sessions. It reads and writes opaque shared values
//! through the [`SessionStore`] trait, implemented by the host framework's
//! session layer. [`MemorySession`] is an in-process implementation used by
//! tests and single-node deployments.
//!
//! Pages composed for a user live in a bounded [`StateCache`] stored in the
//! session; [`PageStore`] provides the page-level operations on top of it.

mod cache;
mod pages;

pub use cache::StateCache;
pub use pages::PageStore;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Error;

/// A value stored in a session.
pub type SessionValue = Arc<dyn Any + Send + Sync>;

/// Key/value storage scoped to one user session.
///
/// Implementations must be safe to call from concurrent requests of the
/// same session. `get_or_insert_with` must be atomic: two racing callers
/// observe the same value.
pub trait SessionStore: Send + Sync {
    /// Returns the value stored under `name`.
    fn get(&self, name: &str) -> Option<SessionValue>;

    /// Stores `value` under `name`, replacing any previous value.
    fn set(&self, name: &str, value: SessionValue);

    /// Removes the value stored under `name`, returning it.
    fn remove(&self, name: &str) -> Option<SessionValue>;

    /// Returns the value under `name`, storing `init()` first if absent.
    fn get_or_insert_with(&self, name: &str, init: &dyn Fn() -> SessionValue) -> SessionValue;
}

/// Typed access to session values.
pub trait SessionStoreExt: SessionStore {
    /// Returns the value under `name` downcast to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if a value exists but is not a `T`.
    fn get_typed<T: Any + Send + Sync>(&self, name: &str) -> Result<Option<Arc<T>>, Error> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .downcast::<T>()
                .map(Some)
                .map_err(|_| Error::AttributeType(name.to_string())),
        }
    }

    /// Returns the `T` under `name`, creating it with `init` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if a value exists but is not a `T`.
    fn get_or_create<T, F>(&self, name: &str, init: F) -> Result<Arc<T>, Error>
    where
        T: Any + Send + Sync,
        F: Fn() -> T,
    {
        let value = self.get_or_insert_with(name, &|| Arc::new(init()) as SessionValue);
        value
            .downcast::<T>()
            .map_err(|_| Error::AttributeType(name.to_string()))
    }
}

impl<S: SessionStore + ?Sized> SessionStoreExt for S {}

/// In-memory session store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use state_guard::{MemorySession, SessionStore, SessionStoreExt};
///
/// let session = MemorySession::new();
/// session.set("counter", Arc::new(41u32));
///
/// let counter = session.get_typed::<u32>("counter").unwrap().unwrap();
/// assert_eq!(*counter, 41);
/// assert!(session.get_typed::<String>("counter").is_err());
/// ```
#[derive(Default)]
pub struct MemorySession {
    attributes: RwLock<HashMap<String, SessionValue>>,
}

impl MemorySession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored attributes.
    pub fn len(&self) -> usize {
        self.attributes.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.attributes.read().is_empty()
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attributes = self.attributes.read();
        let mut names: Vec<&String> = attributes.keys().collect();
        names.sort();
        f.debug_struct("MemorySession")
            .field("attributes", &names)
            .finish()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, name: &str) -> Option<SessionValue> {
        self.attributes.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: SessionValue) {
        self.attributes.write().insert(name.to_string(), value);
    }

    fn remove(&self, name: &str) -> Option<SessionValue> {
        self.attributes.write().remove(name)
    }

    fn get_or_insert_with(&self, name: &str, init: &dyn Fn() -> SessionValue) -> SessionValue {
        if let Some(existing) = self.attributes.read().get(name) {
            return Arc::clone(existing);
        }
        let mut attributes = self.attributes.write();
        Arc::clone(
            attributes
                .entry(name.to_string())
                .or_insert_with(|| init()),
        )
    }
}
