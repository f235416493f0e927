use std::collections::HashMap;
use std::sync::Arc;

use super::{
    ActionMatching, Config, ParametersWithoutValidation, StartPage, DEFAULT_MODIFY_STATE_PARAMETER,
    DEFAULT_STATE_PARAMETER,
};
use crate::error::Error;
use crate::pattern::{PatternMatcher, PatternMatcherFactory};
use crate::request::Method;
use crate::scope::StateScopeType;
use crate::validation::{
    default_rules, DefaultEditableDataValidationProvider, EditableDataValidationProvider,
    ValidationRepository, ValidationRule,
};

struct TargetEntry {
    url: Option<String>,
    parameters: Vec<String>,
    rules: Vec<String>,
    enable_defaults: bool,
}

/// Fluent builder for [`Config`].
///
/// Patterns are kept as strings until [`ConfigBuilder::build`] compiles
/// them, so the first invalid pattern is reported there.
///
/// # Examples
///
/// ```
/// use state_guard::{ConfigBuilder, ValidationRule};
///
/// let config = ConfigBuilder::new()
///     .max_pages_per_session(10)
///     .validation_rule(ValidationRule::new("zip").accepting("[0-9]{5}"))
///     .validation_target(Some("/address/.*"), ["zip"], ["zip"], false)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.max_pages_per_session(), 10);
/// ```
pub struct ConfigBuilder {
    confidentiality: bool,
    integrity_validation: bool,
    editable_validation: bool,
    show_error_page_on_editable_validation: bool,
    avoid_validation_in_urls_without_params: bool,
    reuse_existing_page_in_ajax_request: bool,
    editable_fields_required_by_default: bool,
    max_pages_per_session: usize,
    max_scoped_states: usize,
    state_parameter_name: String,
    modify_state_parameter_name: String,
    error_page: Option<String>,
    session_expired_pages: Vec<String>,
    start_pages: Vec<(String, Option<Method>)>,
    start_parameters: Vec<String>,
    parameters_without_validation: Vec<(String, Vec<String>)>,
    long_living_pages: Vec<(String, StateScopeType)>,
    protected_urls: Vec<String>,
    excluded_extensions: Vec<String>,
    extra_parameters_allowed: Vec<String>,
    action_matching: ActionMatching,
    register_default_rules: bool,
    rules: Vec<ValidationRule>,
    targets: Vec<TargetEntry>,
    provider: Option<Arc<dyn EditableDataValidationProvider>>,
    factory: Arc<PatternMatcherFactory>,
}

impl ConfigBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            confidentiality: true,
            integrity_validation: true,
            editable_validation: true,
            show_error_page_on_editable_validation: false,
            avoid_validation_in_urls_without_params: false,
            reuse_existing_page_in_ajax_request: false,
            editable_fields_required_by_default: false,
            max_pages_per_session: 5,
            max_scoped_states: 1000,
            state_parameter_name: DEFAULT_STATE_PARAMETER.to_string(),
            modify_state_parameter_name: DEFAULT_MODIFY_STATE_PARAMETER.to_string(),
            error_page: None,
            session_expired_pages: Vec::new(),
            start_pages: Vec::new(),
            start_parameters: Vec::new(),
            parameters_without_validation: Vec::new(),
            long_living_pages: Vec::new(),
            protected_urls: Vec::new(),
            excluded_extensions: Vec::new(),
            extra_parameters_allowed: Vec::new(),
            action_matching: ActionMatching::default(),
            register_default_rules: true,
            rules: Vec::new(),
            targets: Vec::new(),
            provider: None,
            factory: Arc::new(PatternMatcherFactory::new()),
        }
    }

    /// Shares a pattern factory with other components.
    pub fn pattern_factory(mut self, factory: Arc<PatternMatcherFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Enables or disables confidential value substitution.
    pub fn confidentiality(mut self, on: bool) -> Self {
        self.confidentiality = on;
        self
    }

    /// Enables or disables rejecting requests on integrity failures.
    pub fn integrity_validation(mut self, on: bool) -> Self {
        self.integrity_validation = on;
        self
    }

    /// Enables or disables editable-data validation.
    pub fn editable_validation(mut self, on: bool) -> Self {
        self.editable_validation = on;
        self
    }

    /// Shows the error page on editable-data failures.
    pub fn show_error_page_on_editable_validation(mut self, on: bool) -> Self {
        self.show_error_page_on_editable_validation = on;
        self
    }

    /// Skips state tokens for parameter-less links and requests.
    pub fn avoid_validation_in_urls_without_params(mut self, on: bool) -> Self {
        self.avoid_validation_in_urls_without_params = on;
        self
    }

    /// Lets Ajax requests continue the page of their token.
    pub fn reuse_existing_page_in_ajax_request(mut self, on: bool) -> Self {
        self.reuse_existing_page_in_ajax_request = on;
        self
    }

    /// Makes editable fields required like non-editable ones.
    pub fn editable_fields_required_by_default(mut self, on: bool) -> Self {
        self.editable_fields_required_by_default = on;
        self
    }

    /// Sets the maximum number of pages cached per session.
    pub fn max_pages_per_session(mut self, max: usize) -> Self {
        self.max_pages_per_session = max;
        self
    }

    /// Sets the capacity of each long-living scope cache.
    pub fn max_scoped_states(mut self, max: usize) -> Self {
        self.max_scoped_states = max;
        self
    }

    /// Renames the state token parameter.
    pub fn state_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.state_parameter_name = name.into();
        self
    }

    /// Renames the modify-state parameter.
    pub fn modify_state_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.modify_state_parameter_name = name.into();
        self
    }

    /// Adds an entry point; `method` of `None` covers every method.
    pub fn start_page(mut self, pattern: impl Into<String>, method: Option<Method>) -> Self {
        self.start_pages.push((pattern.into(), method));
        self
    }

    /// Adds a parameter name pattern that is never validated.
    pub fn start_parameter(mut self, pattern: impl Into<String>) -> Self {
        self.start_parameters.push(pattern.into());
        self
    }

    /// Sets the error page. It becomes a start page for every method.
    pub fn error_page(mut self, path: impl Into<String>) -> Self {
        self.error_page = Some(with_leading_slash(path.into()));
        self
    }

    /// Sets the page shown to logged-in users whose session expired.
    /// It becomes a start page for every method.
    pub fn session_expired_login_page(mut self, path: impl Into<String>) -> Self {
        self.session_expired_pages.push(with_leading_slash(path.into()));
        self
    }

    /// Sets the page shown to anonymous users whose session expired.
    /// It becomes a start page for every method.
    pub fn session_expired_home_page(mut self, path: impl Into<String>) -> Self {
        self.session_expired_pages.push(with_leading_slash(path.into()));
        self
    }

    /// Exempts parameters matching `parameters` on actions matching `action`.
    ///
    /// Rules are consulted in the order they are added.
    pub fn parameters_without_validation<I, S>(mut self, action: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters_without_validation.push((
            action.into(),
            parameters.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Stores the states of pages matching `pattern` in `scope`.
    pub fn long_living_page(mut self, pattern: impl Into<String>, scope: StateScopeType) -> Self {
        self.long_living_pages.push((pattern.into(), scope));
        self
    }

    /// Restricts token requirements to URLs matching the added patterns.
    pub fn protected_url(mut self, pattern: impl Into<String>) -> Self {
        self.protected_urls.push(pattern.into());
        self
    }

    /// Excludes paths ending with `extension` from protection.
    pub fn excluded_extension(mut self, extension: impl Into<String>) -> Self {
        self.excluded_extensions.push(extension.into());
        self
    }

    /// Lets requests to actions matching `action` carry unrecorded parameters.
    pub fn allow_extra_parameters(mut self, action: impl Into<String>) -> Self {
        self.extra_parameters_allowed.push(action.into());
        self
    }

    /// Sets the action matching leniency.
    pub fn action_matching(mut self, matching: ActionMatching) -> Self {
        self.action_matching = matching;
        self
    }

    /// Enables or disables the built-in default editable rules.
    pub fn register_default_rules(mut self, on: bool) -> Self {
        self.register_default_rules = on;
        self
    }

    /// Registers a named editable rule for use in validation targets.
    pub fn validation_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Applies the named rules to `parameters` of URLs matching `url`.
    ///
    /// `None` matches every URL and an empty parameter list every
    /// parameter. With `enable_defaults` the default rules also apply.
    pub fn validation_target<P, R>(
        mut self,
        url: Option<&str>,
        parameters: P,
        rules: R,
        enable_defaults: bool,
    ) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        self.targets.push(TargetEntry {
            url: url.map(str::to_string),
            parameters: parameters.into_iter().map(Into::into).collect(),
            rules: rules.into_iter().map(Into::into).collect(),
            enable_defaults,
        });
        self
    }

    /// Replaces rule-based editable validation with a custom provider.
    pub fn editable_validation_provider(
        mut self,
        provider: Arc<dyn EditableDataValidationProvider>,
    ) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Configuration carrying only the flags and names of this builder.
    pub(crate) fn base_config(&self) -> Config {
        let defaults = if self.register_default_rules {
            default_rules()
        } else {
            Vec::new()
        };
        let provider = self.provider.clone().unwrap_or_else(|| {
            Arc::new(DefaultEditableDataValidationProvider::new(Arc::new(
                ValidationRepository::new(defaults),
            )))
        });

        Config {
            confidentiality: self.confidentiality,
            integrity_validation: self.integrity_validation,
            editable_validation: self.editable_validation,
            show_error_page_on_editable_validation: self.show_error_page_on_editable_validation,
            avoid_validation_in_urls_without_params: self.avoid_validation_in_urls_without_params,
            reuse_existing_page_in_ajax_request: self.reuse_existing_page_in_ajax_request,
            editable_fields_required_by_default: self.editable_fields_required_by_default,
            max_pages_per_session: self.max_pages_per_session,
            max_scoped_states: self.max_scoped_states,
            state_parameter_name: self.state_parameter_name.clone(),
            modify_state_parameter_name: self.modify_state_parameter_name.clone(),
            error_page: self.error_page.clone(),
            start_pages: Vec::new(),
            start_parameters: Vec::new(),
            parameters_without_validation: Vec::new(),
            long_living_pages: Vec::new(),
            protected_urls: Vec::new(),
            excluded_extensions: self.excluded_extensions.clone(),
            extra_parameters_allowed: Vec::new(),
            action_matching: self.action_matching,
            editable_validation_provider: provider,
        }
    }

    /// Validates the settings and compiles every pattern.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] for a zero page limit, an empty or
    ///   clashing parameter name, or a validation target naming an
    ///   unknown rule
    /// - [`Error::InvalidPattern`] for the first pattern that does not
    ///   compile
    pub fn build(self) -> Result<Config, Error> {
        if self.max_pages_per_session == 0 {
            return Err(Error::InvalidConfig(
                "max_pages_per_session must be at least 1".into(),
            ));
        }
        if self.max_scoped_states == 0 {
            return Err(Error::InvalidConfig(
                "max_scoped_states must be at least 1".into(),
            ));
        }
        if self.state_parameter_name.is_empty() || self.modify_state_parameter_name.is_empty() {
            return Err(Error::InvalidConfig("parameter names must not be empty".into()));
        }
        if self.state_parameter_name == self.modify_state_parameter_name {
            return Err(Error::InvalidConfig(
                "state and modify-state parameter names must differ".into(),
            ));
        }

        let mut config = self.base_config();
        let factory = &self.factory;
        let compile = |p: &String| factory.matcher(p);

        for (pattern, method) in &self.start_pages {
            config.start_pages.push(StartPage::new(compile(pattern)?, *method));
        }
        let implicit = self.error_page.iter().chain(&self.session_expired_pages);
        for page in implicit {
            let matcher = factory.matcher(&regex::escape(page))?;
            config.start_pages.push(StartPage::new(matcher, None));
        }

        config.start_parameters = self.start_parameters.iter().map(compile).collect::<Result<_, _>>()?;
        config.protected_urls = self.protected_urls.iter().map(compile).collect::<Result<_, _>>()?;
        config.extra_parameters_allowed = self
            .extra_parameters_allowed
            .iter()
            .map(compile)
            .collect::<Result<_, _>>()?;

        for (action, parameters) in &self.parameters_without_validation {
            config.parameters_without_validation.push(ParametersWithoutValidation {
                action: compile(action)?,
                parameters: parameters.iter().map(compile).collect::<Result<_, _>>()?,
            });
        }
        for (pattern, scope) in &self.long_living_pages {
            config.long_living_pages.push((compile(pattern)?, *scope));
        }

        if self.provider.is_none() {
            let repository = self.repository()?;
            config.editable_validation_provider =
                Arc::new(DefaultEditableDataValidationProvider::new(Arc::new(repository)));
        }

        Ok(config)
    }

    fn repository(&self) -> Result<ValidationRepository, Error> {
        let defaults = if self.register_default_rules {
            default_rules()
        } else {
            Vec::new()
        };
        let mut repository = ValidationRepository::new(defaults);

        let rules: HashMap<&str, Arc<ValidationRule>> = self
            .rules
            .iter()
            .map(|rule| (rule.name(), Arc::new(rule.clone())))
            .collect();

        for target in &self.targets {
            let url = target
                .url
                .as_ref()
                .map(|u| self.factory.matcher(u))
                .transpose()?;
            let parameters: Vec<Arc<PatternMatcher>> = target
                .parameters
                .iter()
                .map(|p| self.factory.matcher(p))
                .collect::<Result<_, _>>()?;
            let target_rules = target
                .rules
                .iter()
                .map(|name| {
                    rules.get(name.as_str()).cloned().ok_or_else(|| {
                        Error::InvalidConfig(format!("unknown validation rule '{name}'"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            repository.add_target(url, parameters, target_rules, target.enable_defaults);
        }

        Ok(repository)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn with_leading_slash(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_page_limit_is_rejected() {
        let err = ConfigBuilder::new().max_pages_per_session(0).build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn clashing_parameter_names_are_rejected() {
        let err = ConfigBuilder::new()
            .state_parameter_name("_X_")
            .modify_state_parameter_name("_X_")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = ConfigBuilder::new().start_page("(", None).build().unwrap_err();
        match err {
            Error::InvalidPattern { pattern, .. } => assert_eq!(pattern, "("),
            other => panic!("expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn unknown_rule_name_is_reported() {
        let err = ConfigBuilder::new()
            .validation_target(Some("/a"), Vec::<String>::new(), ["missing"], true)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn targets_select_rules() {
        let config = ConfigBuilder::new()
            .validation_rule(ValidationRule::new("digits").accepting("[0-9]*"))
            .validation_target(Some("/order\\.do"), ["qty"], ["digits"], false)
            .build()
            .unwrap();
        let provider = config.editable_validation_provider();

        assert!(provider
            .validate("/order.do", "qty", &["12".to_string()], None)
            .is_valid());
        assert!(!provider
            .validate("/order.do", "qty", &["twelve".to_string()], None)
            .is_valid());
        // defaults still apply elsewhere
        assert!(!provider
            .validate("/other.do", "note", &["<b>".to_string()], None)
            .is_valid());
    }

    #[test]
    fn disabling_defaults_accepts_markup() {
        let config = ConfigBuilder::new()
            .register_default_rules(false)
            .build()
            .unwrap();
        assert!(config
            .editable_validation_provider()
            .validate("/x", "note", &["<script>".to_string()], None)
            .is_valid());
    }

    #[test]
    fn shared_factory_reuses_matchers() {
        let factory = Arc::new(PatternMatcherFactory::new());
        ConfigBuilder::new()
            .pattern_factory(Arc::clone(&factory))
            .start_page("/a", None)
            .protected_url("/a")
            .build()
            .unwrap();
        assert_eq!(factory.len(), 1);
    }
}
