//! Engine configuration.
//!
//! A [`Config`] is assembled once at startup, either through the fluent
//! [`ConfigBuilder`] or from a TOML document ([`Config::from_toml_str`]),
//! and is read-only afterwards. Every pattern is compiled while building,
//! so queries never fail at request time.

mod builder;
mod settings;

pub use builder::ConfigBuilder;
pub use settings::Settings;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::Error;
use crate::pattern::PatternMatcher;
use crate::request::Method;
use crate::scope::StateScopeType;
use crate::validation::EditableDataValidationProvider;

/// Default name of the request parameter carrying the state token.
pub const DEFAULT_STATE_PARAMETER: &str = "_STATE_ID_";

/// Default name of the parameter carrying the token of a state to extend.
pub const DEFAULT_MODIFY_STATE_PARAMETER: &str = "_MODIFY_STATE_ID_";

/// An entry point that needs no state token.
#[derive(Debug, Clone)]
pub struct StartPage {
    matcher: Arc<PatternMatcher>,
    method: Option<Method>,
}

impl StartPage {
    pub(crate) fn new(matcher: Arc<PatternMatcher>, method: Option<Method>) -> Self {
        Self { matcher, method }
    }

    /// Returns `true` if the start page covers a `method` request for `path`.
    pub fn matches(&self, path: &str, method: Method) -> bool {
        self.method.map_or(true, |m| m == method) && self.matcher.matches(path)
    }

    /// Returns the configured pattern.
    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    /// Returns the method restriction, `None` meaning any method.
    pub fn method(&self) -> Option<Method> {
        self.method
    }
}

/// Leniency applied when comparing a request target with a recorded action.
///
/// A trailing `/` is always ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActionMatching {
    /// Compare paths relative to the application context path.
    pub strip_context_path: bool,
    /// Ignore the extension of the last path segment (`/list.do` = `/list`).
    pub ignore_extension: bool,
}

impl Default for ActionMatching {
    fn default() -> Self {
        Self {
            strip_context_path: true,
            ignore_extension: false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ParametersWithoutValidation {
    pub(crate) action: Arc<PatternMatcher>,
    pub(crate) parameters: Vec<Arc<PatternMatcher>>,
}

/// Immutable engine configuration.
///
/// # Examples
///
/// ```
/// use state_guard::{Config, Method, StateScopeType};
///
/// let config = Config::builder()
///     .start_page("/login\\.do", Some(Method::Get))
///     .excluded_extension(".css")
///     .long_living_page("/menu/.*", StateScopeType::App)
///     .parameters_without_validation("/search\\.do", ["q"])
///     .build()
///     .unwrap();
///
/// assert!(config.is_start_page("/login.do", Method::Get));
/// assert!(!config.is_start_page("/login.do", Method::Post));
/// assert!(config.has_extension_to_exclude("/css/site.css?v=2"));
/// assert_eq!(config.is_long_living_page("/menu/top"), Some(StateScopeType::App));
/// assert!(config.is_parameter_without_validation("/search.do", "q"));
/// ```
#[derive(Clone)]
pub struct Config {
    pub(crate) confidentiality: bool,
    pub(crate) integrity_validation: bool,
    pub(crate) editable_validation: bool,
    pub(crate) show_error_page_on_editable_validation: bool,
    pub(crate) avoid_validation_in_urls_without_params: bool,
    pub(crate) reuse_existing_page_in_ajax_request: bool,
    pub(crate) editable_fields_required_by_default: bool,
    pub(crate) max_pages_per_session: usize,
    pub(crate) max_scoped_states: usize,
    pub(crate) state_parameter_name: String,
    pub(crate) modify_state_parameter_name: String,
    pub(crate) error_page: Option<String>,
    pub(crate) start_pages: Vec<StartPage>,
    pub(crate) start_parameters: Vec<Arc<PatternMatcher>>,
    pub(crate) parameters_without_validation: Vec<ParametersWithoutValidation>,
    pub(crate) long_living_pages: Vec<(Arc<PatternMatcher>, StateScopeType)>,
    pub(crate) protected_urls: Vec<Arc<PatternMatcher>>,
    pub(crate) excluded_extensions: Vec<String>,
    pub(crate) extra_parameters_allowed: Vec<Arc<PatternMatcher>>,
    pub(crate) action_matching: ActionMatching,
    pub(crate) editable_validation_provider: Arc<dyn EditableDataValidationProvider>,
}

impl Config {
    /// Starts building a configuration with default settings.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Parses and builds a configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] for malformed TOML and the errors of
    /// [`ConfigBuilder::build`] for invalid settings.
    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        let settings: Settings = toml::from_str(source)?;
        settings.into_builder()?.build()
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    /// Returns `true` if non-editable values are replaced by indices.
    pub fn confidentiality(&self) -> bool {
        self.confidentiality
    }

    /// Returns `true` if integrity failures reject the request.
    pub fn integrity_validation(&self) -> bool {
        self.integrity_validation
    }

    /// Returns `true` if editable values are checked against rules.
    pub fn editable_validation(&self) -> bool {
        self.editable_validation
    }

    /// Returns `true` if editable failures should show the error page
    /// instead of returning to the form.
    pub fn show_error_page_on_editable_validation(&self) -> bool {
        self.show_error_page_on_editable_validation
    }

    /// Returns `true` if parameter-less links need no state token.
    pub fn avoid_validation_in_urls_without_params(&self) -> bool {
        self.avoid_validation_in_urls_without_params
    }

    /// Returns `true` if Ajax requests continue the page of their token.
    pub fn reuse_existing_page_in_ajax_request(&self) -> bool {
        self.reuse_existing_page_in_ajax_request
    }

    /// Returns `true` if editable fields are required like non-editable ones.
    pub fn editable_fields_required_by_default(&self) -> bool {
        self.editable_fields_required_by_default
    }

    /// Returns the maximum number of pages cached per session.
    pub fn max_pages_per_session(&self) -> usize {
        self.max_pages_per_session
    }

    /// Returns the capacity of each long-living scope cache.
    pub fn max_scoped_states(&self) -> usize {
        self.max_scoped_states
    }

    /// Returns the name of the state token parameter.
    pub fn state_parameter_name(&self) -> &str {
        &self.state_parameter_name
    }

    /// Returns the name of the modify-state parameter.
    pub fn modify_state_parameter_name(&self) -> &str {
        &self.modify_state_parameter_name
    }

    /// Returns the error page, if configured.
    pub fn error_page(&self) -> Option<&str> {
        self.error_page.as_deref()
    }

    /// Returns the action matching leniency.
    pub fn action_matching(&self) -> ActionMatching {
        self.action_matching
    }

    /// Returns the provider deciding editable-data validity.
    pub fn editable_validation_provider(&self) -> &dyn EditableDataValidationProvider {
        self.editable_validation_provider.as_ref()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Returns `true` if `path` is an entry point for `method` requests.
    pub fn is_start_page(&self, path: &str, method: Method) -> bool {
        self.start_pages.iter().any(|p| p.matches(path, method))
    }

    /// Returns the configured start pages.
    pub fn start_pages(&self) -> &[StartPage] {
        &self.start_pages
    }

    /// Returns `true` if `name` is never validated on any request.
    pub fn is_start_parameter(&self, name: &str) -> bool {
        self.start_parameters.iter().any(|m| m.matches(name))
    }

    /// Returns `true` if the parameter `name` must be validated.
    ///
    /// The state parameter and start parameters are never validated.
    pub fn needs_validation(&self, name: &str) -> bool {
        name != self.state_parameter_name && !self.is_start_parameter(name)
    }

    /// Returns `true` if `parameter` is exempt from validation on `action`.
    ///
    /// Rules are tried in configuration order and only the first rule whose
    /// action pattern matches is consulted.
    pub fn is_parameter_without_validation(&self, action: &str, parameter: &str) -> bool {
        self.parameters_without_validation
            .iter()
            .find(|rule| rule.action.matches(action))
            .map_or(false, |rule| rule.parameters.iter().any(|m| m.matches(parameter)))
    }

    /// Returns `true` if `path` ends with an excluded extension.
    ///
    /// The query string and fragment are ignored; a path ending in `/` is
    /// never excluded.
    pub fn has_extension_to_exclude(&self, path: &str) -> bool {
        if self.excluded_extensions.is_empty() {
            return false;
        }
        let path = path
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(path);
        if path.ends_with('/') {
            return false;
        }
        self.excluded_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    /// Returns the scope of the long-living page `path`, if it is one.
    pub fn is_long_living_page(&self, path: &str) -> Option<StateScopeType> {
        self.long_living_pages
            .iter()
            .find(|(matcher, _)| matcher.matches(path))
            .map(|(_, scope)| *scope)
    }

    /// Returns `true` if requests to `path` require a state token.
    ///
    /// Without configured protected URL patterns every path is protected.
    pub fn is_protected_url(&self, path: &str) -> bool {
        self.protected_urls.is_empty() || self.protected_urls.iter().any(|m| m.matches(path))
    }

    /// Returns `true` if requests to `action` may carry unrecorded parameters.
    pub fn allows_extra_parameters(&self, action: &str) -> bool {
        self.extra_parameters_allowed
            .iter()
            .any(|m| m.matches(action))
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new().base_config()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("confidentiality", &self.confidentiality)
            .field("integrity_validation", &self.integrity_validation)
            .field("editable_validation", &self.editable_validation)
            .field("max_pages_per_session", &self.max_pages_per_session)
            .field("max_scoped_states", &self.max_scoped_states)
            .field("state_parameter_name", &self.state_parameter_name)
            .field("start_pages", &self.start_pages)
            .field("excluded_extensions", &self.excluded_extensions)
            .field("action_matching", &self.action_matching)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.confidentiality());
        assert!(config.integrity_validation());
        assert!(config.editable_validation());
        assert!(!config.avoid_validation_in_urls_without_params());
        assert!(!config.reuse_existing_page_in_ajax_request());
        assert_eq!(config.max_pages_per_session(), 5);
        assert_eq!(config.max_scoped_states(), 1000);
        assert_eq!(config.state_parameter_name(), "_STATE_ID_");
        assert_eq!(config.modify_state_parameter_name(), "_MODIFY_STATE_ID_");
        assert!(config.is_protected_url("/anything"));
        assert!(!config.has_extension_to_exclude("/a.css"));
    }

    #[test]
    fn excluded_extensions_ignore_query_and_trailing_slash() {
        let config = Config::builder()
            .excluded_extension(".css")
            .excluded_extension(".png")
            .build()
            .unwrap();

        assert!(config.has_extension_to_exclude("/style.css"));
        assert!(config.has_extension_to_exclude("/img/logo.png#top"));
        assert!(config.has_extension_to_exclude("/style.css?v=1"));
        assert!(!config.has_extension_to_exclude("/style.css/"));
        assert!(!config.has_extension_to_exclude("/list.do?f=a.css"));
    }

    #[test]
    fn first_matching_action_governs_exemptions() {
        let config = Config::builder()
            .parameters_without_validation("/search.*", ["page"])
            .parameters_without_validation("/search\\.do", ["q"])
            .build()
            .unwrap();

        assert!(config.is_parameter_without_validation("/search.do", "page"));
        // the second rule is never consulted for /search.do
        assert!(!config.is_parameter_without_validation("/search.do", "q"));
        assert!(!config.is_parameter_without_validation("/other.do", "page"));
    }

    #[test]
    fn state_and_start_parameters_need_no_validation() {
        let config = Config::builder()
            .start_parameter("lang")
            .start_parameter("glob:utm_*")
            .build()
            .unwrap();

        assert!(!config.needs_validation("_STATE_ID_"));
        assert!(!config.needs_validation("lang"));
        assert!(!config.needs_validation("utm_source"));
        assert!(config.needs_validation("id"));
    }

    #[test]
    fn error_pages_are_start_pages() {
        let config = Config::builder()
            .error_page("error.html")
            .session_expired_login_page("/login.html")
            .build()
            .unwrap();

        assert_eq!(config.error_page(), Some("/error.html"));
        assert!(config.is_start_page("/error.html", Method::Post));
        assert!(config.is_start_page("/login.html", Method::Get));
        assert!(!config.is_start_page("/home.html", Method::Get));
    }

    #[test]
    fn protected_urls_limit_validation() {
        let config = Config::builder()
            .protected_url("/secure/.*")
            .allow_extra_parameters("/secure/search\\.do")
            .build()
            .unwrap();

        assert!(config.is_protected_url("/secure/a.do"));
        assert!(!config.is_protected_url("/public/a.do"));
        assert!(config.allows_extra_parameters("/secure/search.do"));
        assert!(!config.allows_extra_parameters("/secure/a.do"));
    }

    #[test]
    fn long_living_pages_resolve_first_match() {
        let config = Config::builder()
            .long_living_page("/menu/.*", StateScopeType::App)
            .long_living_page("/.*", StateScopeType::UserSession)
            .build()
            .unwrap();

        assert_eq!(config.is_long_living_page("/menu/x"), Some(StateScopeType::App));
        assert_eq!(
            config.is_long_living_page("/profile"),
            Some(StateScopeType::UserSession)
        );
    }
}
