use std::collections::BTreeMap;

use crate::error::{ErrorCode, ValidatorError};

/// Verdict of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legality {
    /// Nothing wrong was found
    Valid,
    /// The request may proceed but errors were recorded: editable-data
    /// failures, or integrity failures while integrity validation is off
    ValidWithErrors,
    /// The request must be rejected
    Invalid,
}

/// Structured result of [`StateGuard::validate`](crate::StateGuard::validate).
///
/// Besides the verdict it carries every recorded error and, for requests
/// allowed to proceed, the restored parameters: confidential indices
/// replaced by the values recorded when the page was rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    legality: Legality,
    errors: Vec<ValidatorError>,
    restored: BTreeMap<String, Vec<String>>,
}

impl ValidationOutcome {
    pub(crate) fn new(
        errors: Vec<ValidatorError>,
        restored: BTreeMap<String, Vec<String>>,
        integrity_validation: bool,
    ) -> Self {
        let legality = if errors.is_empty() {
            Legality::Valid
        } else if errors.iter().all(ValidatorError::is_soft) || !integrity_validation {
            Legality::ValidWithErrors
        } else {
            Legality::Invalid
        };
        Self {
            legality,
            errors,
            restored,
        }
    }

    pub(crate) fn valid(restored: BTreeMap<String, Vec<String>>) -> Self {
        Self::new(Vec::new(), restored, true)
    }

    pub(crate) fn reject(&mut self) {
        self.legality = Legality::Invalid;
    }

    /// Returns the verdict.
    pub fn legality(&self) -> Legality {
        self.legality
    }

    /// Returns `true` if the request may proceed.
    pub fn is_valid(&self) -> bool {
        self.legality != Legality::Invalid
    }

    /// Returns `true` if nothing wrong was found.
    pub fn is_fully_valid(&self) -> bool {
        self.legality == Legality::Valid
    }

    /// Returns `true` if editable-data failures were recorded.
    pub fn has_editable_errors(&self) -> bool {
        self.errors.iter().any(ValidatorError::is_soft)
    }

    /// Returns every recorded error.
    pub fn errors(&self) -> &[ValidatorError] {
        &self.errors
    }

    /// Returns the first hard error, or the first error if all are soft.
    pub fn first_error(&self) -> Option<&ValidatorError> {
        self.errors
            .iter()
            .find(|e| !e.is_soft())
            .or_else(|| self.errors.first())
    }

    /// Returns `true` if an error with `code` was recorded.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code() == code)
    }

    /// Returns the restored parameters.
    pub fn restored_parameters(&self) -> &BTreeMap<String, Vec<String>> {
        &self.restored
    }

    /// Returns the restored values of `name`.
    pub fn restored_parameter(&self, name: &str) -> Option<&[String]> {
        self.restored.get(name).map(Vec::as_slice)
    }
}
