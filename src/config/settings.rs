use serde::Deserialize;

use super::{ActionMatching, ConfigBuilder};
use crate::error::Error;
use crate::request::Method;
use crate::scope::StateScopeType;
use crate::validation::RuleDefinition;

/// Serialized configuration, as read from TOML.
///
/// Every field is optional; absent fields keep the builder defaults.
///
/// ```toml
/// confidentiality = true
/// max_pages_per_session = 10
/// excluded_extensions = [".css", ".js"]
/// error_page = "/error.html"
///
/// [[start_pages]]
/// pattern = "/index\\.html"
/// method = "GET"
///
/// [[parameters_without_validation]]
/// action = "/search\\.do"
/// parameters = ["q", "page"]
///
/// [[long_living_pages]]
/// pattern = "/menu/.*"
/// scope = "app"
///
/// [[rules]]
/// name = "zip"
/// accepted = "[0-9]{5}"
///
/// [[validations]]
/// url = "/address/.*"
/// parameters = ["zip"]
/// rules = ["zip"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Confidential value substitution
    pub confidentiality: Option<bool>,
    /// Reject requests on integrity failures
    pub integrity_validation: Option<bool>,
    /// Editable-data validation
    pub editable_validation: Option<bool>,
    /// Show the error page on editable-data failures
    pub show_error_page_on_editable_validation: Option<bool>,
    /// Skip tokens for parameter-less URLs
    pub avoid_validation_in_urls_without_params: Option<bool>,
    /// Continue the token's page in Ajax requests
    pub reuse_existing_page_in_ajax_request: Option<bool>,
    /// Editable fields are required
    pub editable_fields_required_by_default: Option<bool>,
    /// Pages cached per session
    pub max_pages_per_session: Option<usize>,
    /// States cached per long-living scope
    pub max_scoped_states: Option<usize>,
    /// Name of the state token parameter
    pub state_parameter_name: Option<String>,
    /// Name of the modify-state parameter
    pub modify_state_parameter_name: Option<String>,
    /// Error page
    pub error_page: Option<String>,
    /// Page for logged-in users whose session expired
    pub session_expired_login_page: Option<String>,
    /// Page for anonymous users whose session expired
    pub session_expired_home_page: Option<String>,
    /// Entry points
    pub start_pages: Vec<StartPageSettings>,
    /// Parameters never validated
    pub start_parameters: Vec<String>,
    /// Per-action parameter exemptions, in priority order
    pub parameters_without_validation: Vec<ExemptionSettings>,
    /// Long-living pages
    pub long_living_pages: Vec<LongLivingSettings>,
    /// Protected URL patterns
    pub protected_urls: Vec<String>,
    /// Excluded extensions
    pub excluded_extensions: Vec<String>,
    /// Actions accepting unrecorded parameters
    pub extra_parameters_allowed: Vec<String>,
    /// Action matching leniency
    pub action_matching: Option<ActionMatching>,
    /// Register the built-in editable rules
    pub register_default_rules: Option<bool>,
    /// Named editable rules
    pub rules: Vec<RuleDefinition>,
    /// Rule assignments
    pub validations: Vec<ValidationSettings>,
}

/// A start page entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartPageSettings {
    /// Path pattern
    pub pattern: String,
    /// Method restriction
    #[serde(default)]
    pub method: Option<String>,
}

/// A per-action exemption entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExemptionSettings {
    /// Action pattern
    pub action: String,
    /// Exempt parameter patterns
    pub parameters: Vec<String>,
}

/// A long-living page entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LongLivingSettings {
    /// Path pattern
    pub pattern: String,
    /// Scope name (`app` or `user-session`)
    pub scope: String,
}

/// A rule assignment entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationSettings {
    /// URL pattern; every URL when absent
    #[serde(default)]
    pub url: Option<String>,
    /// Parameter patterns; every parameter when empty
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Rule names
    pub rules: Vec<String>,
    /// Also apply the default rules
    #[serde(default = "enabled")]
    pub enable_defaults: bool,
}

fn enabled() -> bool {
    true
}

impl Settings {
    /// Converts the settings into a builder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unknown method names and
    /// [`Error::UnknownScope`] for unknown scope names.
    pub fn into_builder(self) -> Result<ConfigBuilder, Error> {
        let mut builder = ConfigBuilder::new();

        macro_rules! apply {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    builder = builder.$field(value);
                })*
            };
        }
        apply!(
            confidentiality,
            integrity_validation,
            editable_validation,
            show_error_page_on_editable_validation,
            avoid_validation_in_urls_without_params,
            reuse_existing_page_in_ajax_request,
            editable_fields_required_by_default,
            max_pages_per_session,
            max_scoped_states,
            state_parameter_name,
            modify_state_parameter_name,
            error_page,
            session_expired_login_page,
            session_expired_home_page,
            action_matching,
            register_default_rules,
        );

        for page in self.start_pages {
            let method = page
                .method
                .as_deref()
                .map(str::parse::<Method>)
                .transpose()
                .map_err(|e| Error::InvalidConfig(e.to_string()))?;
            builder = builder.start_page(page.pattern, method);
        }
        for name in self.start_parameters {
            builder = builder.start_parameter(name);
        }
        for exemption in self.parameters_without_validation {
            builder = builder.parameters_without_validation(exemption.action, exemption.parameters);
        }
        for page in self.long_living_pages {
            let scope: StateScopeType = page.scope.parse()?;
            builder = builder.long_living_page(page.pattern, scope);
        }
        for url in self.protected_urls {
            builder = builder.protected_url(url);
        }
        for extension in self.excluded_extensions {
            builder = builder.excluded_extension(extension);
        }
        for action in self.extra_parameters_allowed {
            builder = builder.allow_extra_parameters(action);
        }
        for rule in &self.rules {
            builder = builder.validation_rule(rule.to_rule());
        }
        for target in self.validations {
            builder = builder.validation_target(
                target.url.as_deref(),
                target.parameters,
                target.rules,
                target.enable_defaults,
            );
        }

        Ok(builder)
    }
}
