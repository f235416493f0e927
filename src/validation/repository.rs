use std::sync::Arc;

use super::ValidationRule;
use crate::pattern::PatternMatcher;

#[derive(Debug)]
struct ValidationTarget {
    url: Option<Arc<PatternMatcher>>,
    parameters: Vec<Arc<PatternMatcher>>,
    rules: Vec<Arc<ValidationRule>>,
}

impl ValidationTarget {
    fn matches(&self, url: &str, parameter: &str) -> bool {
        let url_matches = self.url.as_ref().map_or(true, |m| m.matches(url));
        let parameter_matches =
            self.parameters.is_empty() || self.parameters.iter().any(|m| m.matches(parameter));
        url_matches && parameter_matches
    }
}

/// Maps URL and parameter patterns to ordered lists of rules.
///
/// Rules of every target matching a URL and parameter apply, in
/// registration order. When no target matches, the default rules apply.
#[derive(Debug, Default)]
pub struct ValidationRepository {
    targets: Vec<ValidationTarget>,
    defaults: Vec<Arc<ValidationRule>>,
}

impl ValidationRepository {
    /// Creates a repository with the given default rules.
    pub fn new(defaults: Vec<ValidationRule>) -> Self {
        Self {
            targets: Vec::new(),
            defaults: defaults.into_iter().map(Arc::new).collect(),
        }
    }

    /// Registers rules for a URL pattern (any URL when `None`) and
    /// parameter patterns (any parameter when empty).
    ///
    /// With `enable_defaults` the default rules run after `rules`.
    pub fn add_target(
        &mut self,
        url: Option<Arc<PatternMatcher>>,
        parameters: Vec<Arc<PatternMatcher>>,
        rules: Vec<Arc<ValidationRule>>,
        enable_defaults: bool,
    ) {
        let mut rules = rules;
        if enable_defaults {
            rules.extend(self.defaults.iter().cloned());
        }
        self.targets.push(ValidationTarget {
            url,
            parameters,
            rules,
        });
    }

    /// Returns the rules applying to `parameter` of `url`.
    pub fn find_validations(&self, url: &str, parameter: &str) -> Vec<Arc<ValidationRule>> {
        let mut found = Vec::new();
        let mut matched = false;
        for target in self.targets.iter().filter(|t| t.matches(url, parameter)) {
            matched = true;
            for rule in &target.rules {
                if !found.iter().any(|r: &Arc<ValidationRule>| Arc::ptr_eq(r, rule)) {
                    found.push(Arc::clone(rule));
                }
            }
        }
        if matched {
            found
        } else {
            self.defaults.clone()
        }
    }

    /// Returns the default rules.
    pub fn defaults(&self) -> &[Arc<ValidationRule>] {
        &self.defaults
    }

    /// Returns the number of registered targets.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}
