use std::fmt;

/// Errors returned by configuration, composition and session operations.
///
/// Tampering detected while validating a request is never reported through
/// this type; see [`ValidatorError`] and
/// [`ValidationOutcome`](crate::ValidationOutcome) instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configured pattern failed to compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern as configured
        pattern: String,
        /// The underlying regex error
        #[source]
        source: regex::Error,
    },

    /// A scope name in the configuration is not one of the known scopes.
    #[error("unknown state scope '{0}'")]
    UnknownScope(String),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration source could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A composer operation was called in the wrong phase.
    #[error("illegal composer state: cannot {operation} while {phase}")]
    IllegalState {
        /// The operation that was attempted
        operation: &'static str,
        /// The phase the composer was in
        phase: &'static str,
    },

    /// A session attribute exists but holds a value of another type.
    #[error("session attribute '{0}' holds a value of a different type")]
    AttributeType(String),
}

/// Stable codes attached to validation errors.
///
/// The string forms are part of the contract with the collaborator layer
/// (error pages, log processors) and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request carries no state token but the target requires one.
    RequiredStateParam,
    /// Malformed token, unknown state, unexpected parameter or tampered value.
    InvalidParameterValue,
    /// The page (or scoped state) referenced by the token is not cached.
    InvalidPageId,
    /// Target or method differ from the recorded state.
    InvalidAction,
    /// A confidential substitution index does not resolve.
    InvalidConfidentialParameter,
    /// Recorded, required parameters are missing from the request.
    RequiredParameters,
    /// An editable value was rejected by the editable validation rules.
    InvalidEditableValue,
}

impl ErrorCode {
    /// Returns the stable string form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RequiredStateParam => "REQUIRED_HDIV_STATE_PARAM",
            ErrorCode::InvalidParameterValue => "INVALID_HDIV_PARAMETER_VALUE",
            ErrorCode::InvalidPageId => "INVALID_PAGE_ID",
            ErrorCode::InvalidAction => "INVALID_ACTION",
            ErrorCode::InvalidConfidentialParameter => "INVALID_CONFIDENTIAL_PARAMETER",
            ErrorCode::RequiredParameters => "REQUIRED_PARAMETERS",
            ErrorCode::InvalidEditableValue => "INVALID_EDITABLE_VALUE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of violation a validation error represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// State token absent where one is required
    RequiredParameterMissing,
    /// Malformed token or unparsable ids
    InvalidStateToken,
    /// Referenced page or state no longer cached, or never existed
    InvalidPageOrState,
    /// Target or method does not match the recorded state
    ActionMismatch,
    /// Values differ from the recorded ones, bad confidential index, or unexpected parameter
    ParameterTampering,
    /// Editable value rejected by a rule; the request may still proceed
    EditableValidationFailure,
}

impl ViolationKind {
    /// Returns `true` for violations that never block a request on their own.
    pub fn is_soft(&self) -> bool {
        matches!(self, ViolationKind::EditableValidationFailure)
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::RequiredParameterMissing => write!(f, "required parameter missing"),
            ViolationKind::InvalidStateToken => write!(f, "invalid state token"),
            ViolationKind::InvalidPageOrState => write!(f, "invalid page or state"),
            ViolationKind::ActionMismatch => write!(f, "action mismatch"),
            ViolationKind::ParameterTampering => write!(f, "parameter tampering"),
            ViolationKind::EditableValidationFailure => write!(f, "editable validation failure"),
        }
    }
}

/// A single validation failure, with enough detail to be logged.
///
/// `value` holds what the client sent; `original_value` holds the value
/// recorded at composition time when one is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorError {
    kind: ViolationKind,
    code: ErrorCode,
    target: Option<String>,
    parameter: Option<String>,
    value: Option<String>,
    original_value: Option<String>,
}

impl ValidatorError {
    /// Creates an error for `code` with no detail attached.
    pub fn new(kind: ViolationKind, code: ErrorCode) -> Self {
        Self {
            kind,
            code,
            target: None,
            parameter: None,
            value: None,
            original_value: None,
        }
    }

    /// Attaches the requested target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attaches the offending parameter name.
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    /// Attaches the received value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attaches the value recorded at composition time.
    pub fn with_original_value(mut self, value: impl Into<String>) -> Self {
        self.original_value = Some(value.into());
        self
    }

    /// Returns the violation kind.
    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    /// Returns the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the target, if recorded.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns the parameter name, if recorded.
    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    /// Returns the received value, if recorded.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns the original value, if recorded.
    pub fn original_value(&self) -> Option<&str> {
        self.original_value.as_deref()
    }

    /// Returns `true` when this error does not block the request by itself.
    pub fn is_soft(&self) -> bool {
        self.kind.is_soft()
    }
}

impl fmt::Display for ValidatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.kind)?;
        if let Some(target) = &self.target {
            write!(f, " target={}", target)?;
        }
        if let Some(parameter) = &self.parameter {
            write!(f, " parameter={}", parameter)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidatorError {}
