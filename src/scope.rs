//! Storage locations for composed states.
//!
//! By default states live in the page that rendered them ([`StateScopeType::Page`]),
//! and expire when the page is evicted from the user's page cache. Links
//! that must outlive page navigation are composed inside a long-living
//! scope instead:
//!
//! - [`AppStateScope`]: one cache shared by the whole application
//! - [`UserSessionStateScope`]: one cache per user session
//!
//! Scoped tokens carry a prefix (`A-` / `U-`) so the [`StateScopeManager`]
//! can route an incoming token back to the scope that issued it.

mod app;
mod cache;
mod user;

pub use app::AppStateScope;
pub use cache::ScopedStateCache;
pub use user::UserSessionStateScope;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::RequestContext;
use crate::error::Error;
use crate::model::{State, StateId};
use crate::token::StateToken;

/// The scopes a state can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScopeType {
    /// The page that rendered the state (default)
    Page,
    /// The whole application
    App,
    /// The user's session, across pages
    UserSession,
}

impl StateScopeType {
    /// Returns the configuration name of the scope.
    pub fn name(&self) -> &'static str {
        match self {
            StateScopeType::Page => "page",
            StateScopeType::App => "app",
            StateScopeType::UserSession => "user-session",
        }
    }

    /// Returns the token prefix of scoped tokens; `None` for page scope.
    pub fn token_prefix(&self) -> Option<&'static str> {
        match self {
            StateScopeType::Page => None,
            StateScopeType::App => Some("A"),
            StateScopeType::UserSession => Some("U"),
        }
    }

    /// Resolves a token prefix to its scope.
    pub fn from_token_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "A" => Some(StateScopeType::App),
            "U" => Some(StateScopeType::UserSession),
            _ => None,
        }
    }
}

impl fmt::Display for StateScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateScopeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(StateScopeType::Page),
            "app" | "application" => Ok(StateScopeType::App),
            "user-session" | "user" => Ok(StateScopeType::UserSession),
            other => Err(Error::UnknownScope(other.to_string())),
        }
    }
}

/// A long-living storage location for states.
pub trait StateScope: Send + Sync {
    /// Returns which scope this is.
    fn scope_type(&self) -> StateScopeType;

    /// Returns the cache backing this scope for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage holds an incompatible value.
    fn state_cache(&self, ctx: &RequestContext) -> Result<Arc<Mutex<ScopedStateCache>>, Error>;

    /// Replaces the cache backing this scope for the given request.
    fn set_state_cache(&self, ctx: &RequestContext, cache: ScopedStateCache);

    /// Stores an open state, returning the token to render.
    ///
    /// Adding a state equal to one already cached returns the existing
    /// token.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`StateScope::state_cache`].
    fn add_state(&self, ctx: &RequestContext, state: State) -> Result<StateToken, Error> {
        let cache = self.state_cache(ctx)?;
        let stored = cache.lock().add_state(state);
        Ok(StateToken::Scoped {
            scope: self.scope_type(),
            state_id: stored.id(),
            hash: stored.token_hash().to_string(),
        })
    }

    /// Returns the cached state with `id`.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`StateScope::state_cache`].
    fn restore_state(&self, ctx: &RequestContext, id: StateId) -> Result<Option<Arc<State>>, Error> {
        let cache = self.state_cache(ctx)?;
        let state = cache.lock().get(id);
        Ok(state)
    }
}

/// Routes scope types and tokens to their scopes.
pub struct StateScopeManager {
    scopes: Vec<Box<dyn StateScope>>,
}

impl StateScopeManager {
    /// Creates a manager with the application and user-session scopes,
    /// each bounded to `capacity` states.
    pub fn new(capacity: usize) -> Self {
        Self {
            scopes: vec![
                Box::new(AppStateScope::new(capacity)),
                Box::new(UserSessionStateScope::new(capacity)),
            ],
        }
    }

    /// Returns the scope of the given type; `None` for page scope.
    pub fn scope(&self, scope_type: StateScopeType) -> Option<&dyn StateScope> {
        self.scopes
            .iter()
            .find(|s| s.scope_type() == scope_type)
            .map(|s| s.as_ref())
    }

    /// Returns the scope that issued `token`; `None` for page tokens or
    /// tokens without a recognised prefix.
    pub fn scope_for_token(&self, token: &str) -> Option<&dyn StateScope> {
        let (prefix, _) = token.split_once('-')?;
        let scope_type = StateScopeType::from_token_prefix(prefix)?;
        self.scope(scope_type)
    }
}

impl fmt::Debug for StateScopeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<StateScopeType> = self.scopes.iter().map(|s| s.scope_type()).collect();
        f.debug_struct("StateScopeManager")
            .field("scopes", &types)
            .finish()
    }
}
