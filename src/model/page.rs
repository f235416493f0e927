use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rand::RngCore;

use super::{State, StateId};
use crate::id::PageId;

/// All states composed for one rendered response.
///
/// State ids are allocated from a counter shared by every continuation of
/// the page, so they are never reused while the page exists, even when
/// several requests continue it at once. Each page carries a random seed
/// mixed into the integrity hash of its tokens.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    parent_state_id: Option<String>,
    seed: String,
    next_state: Arc<AtomicU32>,
    states: BTreeMap<StateId, Arc<State>>,
}

impl Page {
    /// Creates an empty page with a fresh random seed.
    pub fn new(id: PageId) -> Self {
        let mut seed = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut seed);
        Self {
            id,
            parent_state_id: None,
            seed: hex::encode(seed),
            next_state: Arc::new(AtomicU32::new(0)),
            states: BTreeMap::new(),
        }
    }

    /// Returns an empty continuation of this page: same id, seed, parent
    /// and state counter, none of the states.
    pub fn continuation(&self) -> Page {
        Self {
            id: self.id,
            parent_state_id: self.parent_state_id.clone(),
            seed: self.seed.clone(),
            next_state: Arc::clone(&self.next_state),
            states: BTreeMap::new(),
        }
    }

    /// Returns the page id.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Returns the token of the state whose request produced this page.
    pub fn parent_state_id(&self) -> Option<&str> {
        self.parent_state_id.as_deref()
    }

    /// Records the token of the request that produced this page.
    pub fn set_parent_state_id(&mut self, parent: Option<String>) {
        self.parent_state_id = parent;
    }

    /// Returns the integrity seed.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Returns the id the next allocated state will receive.
    pub fn next_state_id(&self) -> StateId {
        self.next_state.load(Ordering::Acquire)
    }

    /// Reserves a state id for this page and all of its continuations.
    pub fn allocate_state_id(&self) -> StateId {
        self.next_state.fetch_add(1, Ordering::AcqRel)
    }

    /// Adds a sealed state under its id.
    pub fn add_state(&mut self, state: State) -> Arc<State> {
        let state = Arc::new(state);
        self.states.insert(state.id(), Arc::clone(&state));
        state
    }

    /// Merges the states of a continuation, first dropping the states
    /// allocated before `keep_from`.
    pub(crate) fn merge(&mut self, continuation: Page, keep_from: StateId) {
        self.states = self.states.split_off(&keep_from);
        self.states.extend(continuation.states);
    }

    /// Returns the state with `id`.
    pub fn state(&self, id: StateId) -> Option<&Arc<State>> {
        self.states.get(&id)
    }

    /// Returns the number of states.
    pub fn states_count(&self) -> usize {
        self.states.len()
    }

    /// Returns all states in id order.
    pub fn states(&self) -> impl Iterator<Item = &Arc<State>> {
        self.states.values()
    }
}
