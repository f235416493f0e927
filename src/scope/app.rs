use std::sync::Arc;

use parking_lot::Mutex;

use super::{ScopedStateCache, StateScope, StateScopeType};
use crate::context::RequestContext;
use crate::error::Error;

/// States shared by every user of the application.
#[derive(Debug)]
pub struct AppStateScope {
    cache: Mutex<Arc<Mutex<ScopedStateCache>>>,
}

impl AppStateScope {
    /// Creates an application scope bounded to `capacity` states.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(Arc::new(Mutex::new(ScopedStateCache::new(capacity)))),
        }
    }
}

impl StateScope for AppStateScope {
    fn scope_type(&self) -> StateScopeType {
        StateScopeType::App
    }

    fn state_cache(&self, _ctx: &RequestContext) -> Result<Arc<Mutex<ScopedStateCache>>, Error> {
        Ok(Arc::clone(&self.cache.lock()))
    }

    fn set_state_cache(&self, _ctx: &RequestContext, cache: ScopedStateCache) {
        *self.cache.lock() = Arc::new(Mutex::new(cache));
    }
}
