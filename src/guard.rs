use std::sync::Arc;

use crate::composer::DataComposer;
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::Error;
use crate::id::PageIdGenerator;
use crate::request::Method;
use crate::scope::{StateScopeManager, StateScopeType};
use crate::session::PageStore;
use crate::validator::{ValidationOutcome, ValidatorHelper};

/// The state composition and validation engine.
///
/// One `StateGuard` is built at startup and shared by every request. It
/// owns the configuration, the application scope cache and the page store
/// front-end; per-user data lives in the sessions reached through each
/// [`RequestContext`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use state_guard::{Config, MemorySession, Method, RequestContext, SessionStore, StateGuard};
///
/// let guard = StateGuard::new(Config::default());
/// let session: Arc<dyn SessionStore> = Arc::new(MemorySession::new());
///
/// // Render a link to /testAction.do?param=value
/// let render = RequestContext::builder(Arc::clone(&session)).target("/index.do").build();
/// let mut composer = guard.composer(&render);
/// composer.start_page().unwrap();
/// composer.begin_request(Some(Method::Get), "/testAction.do").unwrap();
/// let rendered = composer.compose("param", "value", false).unwrap();
/// let token = composer.end_request().unwrap();
/// composer.end_page().unwrap();
///
/// // The client follows it
/// let request = RequestContext::builder(session)
///     .target("/testAction.do")
///     .param("param", rendered)
///     .param("_STATE_ID_", token)
///     .build();
/// let outcome = guard.validate(&request).unwrap();
///
/// assert!(outcome.is_fully_valid());
/// assert_eq!(outcome.restored_parameter("param"), Some(&["value".to_string()][..]));
/// ```
#[derive(Debug)]
pub struct StateGuard {
    config: Config,
    pages: PageStore,
    scopes: StateScopeManager,
}

impl StateGuard {
    /// Creates an engine for `config`.
    pub fn new(config: Config) -> Self {
        let pages = PageStore::new(config.max_pages_per_session());
        let scopes = StateScopeManager::new(config.max_scoped_states());
        Self {
            config,
            pages,
            scopes,
        }
    }

    /// Creates an engine drawing page ids from one shared generator.
    pub fn with_page_id_generator(config: Config, generator: Arc<dyn PageIdGenerator>) -> Self {
        let mut guard = Self::new(config);
        guard.pages = PageStore::new(guard.config.max_pages_per_session()).with_generator(generator);
        guard
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the page store.
    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    /// Returns the long-living scopes.
    pub fn scopes(&self) -> &StateScopeManager {
        &self.scopes
    }

    /// Returns a composer for the response to `ctx`.
    pub fn composer<'a>(&'a self, ctx: &'a RequestContext) -> DataComposer<'a> {
        DataComposer::new(&self.config, &self.pages, &self.scopes, ctx)
    }

    /// Returns the request validator.
    pub fn validator(&self) -> ValidatorHelper<'_> {
        ValidatorHelper::new(&self.config, &self.pages, &self.scopes)
    }

    /// Validates the request described by `ctx`.
    ///
    /// # Errors
    ///
    /// See [`ValidatorHelper::validate`].
    pub fn validate(&self, ctx: &RequestContext) -> Result<ValidationOutcome, Error> {
        self.validator().validate(ctx)
    }

    /// Returns `true` if `path` is an entry point for `method` requests.
    pub fn is_start_page(&self, path: &str, method: Method) -> bool {
        self.config.is_start_page(path, method)
    }

    /// Returns `true` if `parameter` is exempt from validation on `action`.
    pub fn is_parameter_without_validation(&self, action: &str, parameter: &str) -> bool {
        self.config.is_parameter_without_validation(action, parameter)
    }

    /// Returns `true` if `path` ends with an excluded extension.
    pub fn has_extension_to_exclude(&self, path: &str) -> bool {
        self.config.has_extension_to_exclude(path)
    }

    /// Returns the scope of the long-living page `path`, if it is one.
    pub fn is_long_living_page(&self, path: &str) -> Option<StateScopeType> {
        self.config.is_long_living_page(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialPageIdGenerator;
    use crate::session::{MemorySession, SessionStore};

    #[test]
    fn queries_delegate_to_config() {
        let config = Config::builder()
            .start_page("/", Some(Method::Get))
            .excluded_extension(".js")
            .parameters_without_validation("/find\\.do", ["q"])
            .long_living_page("/nav/.*", StateScopeType::App)
            .build()
            .unwrap();
        let guard = StateGuard::new(config);

        assert!(guard.is_start_page("/", Method::Get));
        assert!(guard.has_extension_to_exclude("/app.js"));
        assert!(guard.is_parameter_without_validation("/find.do", "q"));
        assert_eq!(guard.is_long_living_page("/nav/x"), Some(StateScopeType::App));
        assert_eq!(guard.config().max_pages_per_session(), 5);
    }

    #[test]
    fn shared_generator_feeds_every_session() {
        let guard = StateGuard::with_page_id_generator(
            Config::default(),
            Arc::new(SequentialPageIdGenerator::starting_at(100)),
        );
        let a: Arc<dyn SessionStore> = Arc::new(MemorySession::new());
        let b: Arc<dyn SessionStore> = Arc::new(MemorySession::new());

        assert_eq!(guard.pages().next_page_id(a.as_ref()).unwrap().to_string(), "101");
        assert_eq!(guard.pages().next_page_id(b.as_ref()).unwrap().to_string(), "102");
    }
}
