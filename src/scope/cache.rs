use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::model::{State, StateId};
use crate::token::scope_key_hash;

/// Bounded cache of states stored in a long-living scope.
///
/// States are deduplicated by [`State::scope_key`]: composing the same
/// method, action and parameters again yields the state cached the first
/// time. When the cache is full the least recently used state is evicted.
/// Ids are never reused.
#[derive(Debug)]
pub struct ScopedStateCache {
    states: LruCache<StateId, Arc<State>>,
    by_key: HashMap<String, StateId>,
    next_id: StateId,
}

impl ScopedStateCache {
    /// Creates a cache holding at most `capacity` states (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            states: LruCache::new(capacity),
            by_key: HashMap::new(),
            next_id: 0,
        }
    }

    /// Stores an open state, or returns the equal state already cached.
    pub fn add_state(&mut self, mut state: State) -> Arc<State> {
        let key = state.scope_key();
        if let Some(id) = self.by_key.get(&key) {
            if let Some(existing) = self.states.get(id) {
                return Arc::clone(existing);
            }
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        state.seal(id, scope_key_hash(&key));
        let state = Arc::new(state);

        if let Some((_, evicted)) = self.states.push(id, Arc::clone(&state)) {
            self.by_key.remove(&evicted.scope_key());
            tracing::debug!(state_id = evicted.id(), "evicted scoped state");
        }
        self.by_key.insert(key, id);
        state
    }

    /// Returns the state with `id`, marking it recently used.
    pub fn get(&mut self, id: StateId) -> Option<Arc<State>> {
        self.states.get(&id).cloned()
    }

    /// Returns the number of cached states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
