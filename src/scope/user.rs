use std::sync::Arc;

use parking_lot::Mutex;

use super::{ScopedStateCache, StateScope, StateScopeType};
use crate::context::RequestContext;
use crate::error::Error;
use crate::session::{SessionStoreExt, SessionValue};

const ATTRIBUTE: &str = "state_guard.user_session_states";

/// States valid for the whole session of one user.
///
/// The cache is stored as a session attribute, so it expires together with
/// the session.
#[derive(Debug)]
pub struct UserSessionStateScope {
    capacity: usize,
}

impl UserSessionStateScope {
    /// Creates a user-session scope bounded to `capacity` states per session.
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl StateScope for UserSessionStateScope {
    fn scope_type(&self) -> StateScopeType {
        StateScopeType::UserSession
    }

    fn state_cache(&self, ctx: &RequestContext) -> Result<Arc<Mutex<ScopedStateCache>>, Error> {
        ctx.session().get_or_create(ATTRIBUTE, || {
            Mutex::new(ScopedStateCache::new(self.capacity))
        })
    }

    fn set_state_cache(&self, ctx: &RequestContext, cache: ScopedStateCache) {
        let value: SessionValue = Arc::new(Mutex::new(cache));
        ctx.session().set(ATTRIBUTE, value);
    }
}
