//! Content rules for editable parameters.
//!
//! Editable parameters (text inputs, text areas) cannot be checked against
//! recorded values. Their content is instead checked against
//! [`ValidationRule`]s selected by URL and parameter name from a
//! [`ValidationRepository`]. A value fails a rule when it does not fully
//! match the rule's accepted pattern, or when it fully matches the rule's
//! rejected pattern.
//!
//! The rules are consumed through the [`EditableDataValidationProvider`]
//! trait; [`DefaultEditableDataValidationProvider`] evaluates a repository.

mod defaults;
mod repository;

pub use defaults::default_rules;
pub use repository::ValidationRepository;

use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;

/// A named accept/reject rule for editable values.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    name: String,
    accepted: Option<Regex>,
    rejected: Option<Regex>,
    component_type: Option<String>,
    default_rule: bool,
}

impl ValidationRule {
    /// Creates a rule that accepts everything.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accepted: None,
            rejected: None,
            component_type: None,
            default_rule: false,
        }
    }

    /// Sets the pattern every value must fully match.
    ///
    /// A pattern that does not compile is logged and ignored.
    pub fn accepting(mut self, pattern: &str) -> Self {
        self.accepted = compile_rule_pattern(&self.name, pattern);
        self
    }

    /// Sets the pattern no value may fully match.
    ///
    /// A pattern that does not compile is logged and ignored.
    pub fn rejecting(mut self, pattern: &str) -> Self {
        self.rejected = compile_rule_pattern(&self.name, pattern);
        self
    }

    /// Restricts the rule to parameters of one component type.
    pub fn for_component_type(mut self, component_type: impl Into<String>) -> Self {
        self.component_type = Some(component_type.into());
        self
    }

    pub(crate) fn into_default(mut self) -> Self {
        self.default_rule = true;
        self
    }

    /// Returns the rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the component type the rule applies to, if restricted.
    pub fn component_type(&self) -> Option<&str> {
        self.component_type.as_deref()
    }

    /// Returns `true` for built-in default rules.
    pub fn is_default(&self) -> bool {
        self.default_rule
    }

    /// Returns `true` if the rule applies to parameters of `data_type`.
    ///
    /// Unrestricted rules and untyped parameters always apply. A `text`
    /// rule also applies to `password` parameters.
    pub fn applies_to(&self, data_type: Option<&str>) -> bool {
        match (self.component_type.as_deref(), data_type) {
            (Some(rule), Some(param)) => {
                rule.eq_ignore_ascii_case(param)
                    || (rule.eq_ignore_ascii_case("text") && param.eq_ignore_ascii_case("password"))
            }
            _ => true,
        }
    }

    /// Checks every value against the rule.
    pub fn validate(&self, values: &[String], data_type: Option<&str>) -> bool {
        if !self.applies_to(data_type) {
            return true;
        }
        values.iter().all(|value| {
            let accepted = self.accepted.as_ref().map_or(true, |re| re.is_match(value));
            let rejected = self.rejected.as_ref().map_or(false, |re| re.is_match(value));
            accepted && !rejected
        })
    }
}

fn compile_rule_pattern(rule: &str, pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::error!(rule, pattern, error = %err, "ignoring invalid validation pattern");
            None
        }
    }
}

/// Serialized form of a [`ValidationRule`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    /// Rule name
    pub name: String,
    /// Pattern every value must match
    #[serde(default)]
    pub accepted: Option<String>,
    /// Pattern no value may match
    #[serde(default)]
    pub rejected: Option<String>,
    /// Component type restriction
    #[serde(default)]
    pub component_type: Option<String>,
}

impl RuleDefinition {
    /// Compiles the definition.
    pub fn to_rule(&self) -> ValidationRule {
        let mut rule = ValidationRule::new(&self.name);
        if let Some(accepted) = &self.accepted {
            rule = rule.accepting(accepted);
        }
        if let Some(rejected) = &self.rejected {
            rule = rule.rejecting(rejected);
        }
        if let Some(component_type) = &self.component_type {
            rule = rule.for_component_type(component_type);
        }
        rule
    }
}

/// Result of validating an editable parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditableValidationResult {
    /// Every applicable rule passed
    Valid,
    /// The named rule failed
    Invalid {
        /// Name of the first failing rule
        rule: String,
    },
}

impl EditableValidationResult {
    /// Returns `true` for [`EditableValidationResult::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, EditableValidationResult::Valid)
    }
}

/// Source of editable-data validation decisions.
pub trait EditableDataValidationProvider: Send + Sync {
    /// Validates the values submitted for an editable parameter of `url`.
    fn validate(
        &self,
        url: &str,
        parameter: &str,
        values: &[String],
        data_type: Option<&str>,
    ) -> EditableValidationResult;
}

/// Evaluates the rules of a [`ValidationRepository`] in order.
#[derive(Debug, Clone)]
pub struct DefaultEditableDataValidationProvider {
    repository: Arc<ValidationRepository>,
}

impl DefaultEditableDataValidationProvider {
    /// Creates a provider over `repository`.
    pub fn new(repository: Arc<ValidationRepository>) -> Self {
        Self { repository }
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &ValidationRepository {
        &self.repository
    }
}

impl EditableDataValidationProvider for DefaultEditableDataValidationProvider {
    fn validate(
        &self,
        url: &str,
        parameter: &str,
        values: &[String],
        data_type: Option<&str>,
    ) -> EditableValidationResult {
        for rule in self.repository.find_validations(url, parameter) {
            if !rule.validate(values, data_type) {
                return EditableValidationResult::Invalid {
                    rule: rule.name().to_string(),
                };
            }
        }
        EditableValidationResult::Valid
    }
}
