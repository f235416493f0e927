//! Validation of incoming requests against recorded states.
//!
//! [`ValidatorHelper::validate`] decides whether a request uses only what
//! was offered to the client:
//!
//! 1. start pages, excluded extensions and unprotected URLs pass
//! 2. the state token must be present and well formed
//! 3. the page and state it names must still be cached, with a matching hash
//! 4. target and method must match the recorded action
//! 5. every parameter must be recorded, with a recorded value (or a valid
//!    confidential index); editable parameters are checked against rules
//! 6. every required recorded parameter must be present
//!
//! Tampering never surfaces as an `Err`: it is reported through the
//! returned [`ValidationOutcome`].

mod action;
mod outcome;

pub use outcome::{Legality, ValidationOutcome};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{Error, ErrorCode, ValidatorError, ViolationKind};
use crate::model::State;
use crate::scope::StateScopeManager;
use crate::session::PageStore;
use crate::token::StateToken;
use crate::validation::EditableValidationResult;

use action::normalize_action;

/// Validates requests against the states recorded for the session.
///
/// Obtained from [`StateGuard::validator`](crate::StateGuard::validator).
#[derive(Debug, Clone, Copy)]
pub struct ValidatorHelper<'a> {
    config: &'a Config,
    pages: &'a PageStore,
    scopes: &'a StateScopeManager,
}

impl<'a> ValidatorHelper<'a> {
    pub(crate) fn new(config: &'a Config, pages: &'a PageStore, scopes: &'a StateScopeManager) -> Self {
        Self {
            config,
            pages,
            scopes,
        }
    }

    /// Validates the request described by `ctx`.
    ///
    /// Every recorded error is logged once through the request's
    /// [`ValidationLog`](crate::ValidationLog).
    ///
    /// # Errors
    ///
    /// Only session faults are returned as `Err` (a session attribute of a
    /// foreign type); tampering is reported in the outcome.
    pub fn validate(&self, ctx: &RequestContext) -> Result<ValidationOutcome, Error> {
        let mut outcome = self.run(ctx)?;
        let log = ctx.log();
        for error in outcome.errors() {
            log.error_record(error);
        }

        match outcome.legality() {
            Legality::ValidWithErrors
                if outcome.has_editable_errors()
                    && self.config.show_error_page_on_editable_validation() =>
            {
                log.warn(format_args!(
                    "rejecting {} on editable data errors",
                    ctx.relative_target()
                ));
                outcome.reject();
            }
            Legality::ValidWithErrors if !self.config.integrity_validation() => {
                log.info(format_args!(
                    "integrity validation is off, letting {} through",
                    ctx.relative_target()
                ));
            }
            _ => {}
        }
        Ok(outcome)
    }

    fn run(&self, ctx: &RequestContext) -> Result<ValidationOutcome, Error> {
        let config = self.config;
        let target = ctx.relative_target();

        if config.is_start_page(target, ctx.method())
            || config.has_extension_to_exclude(target)
            || !config.is_protected_url(target)
        {
            return Ok(ValidationOutcome::valid(self.passthrough(ctx)));
        }

        let token = ctx
            .first_parameter(config.state_parameter_name())
            .filter(|t| !t.is_empty());
        let Some(token) = token else {
            let has_params = ctx
                .parameters()
                .keys()
                .any(|name| name != config.state_parameter_name());
            if config.avoid_validation_in_urls_without_params() && !has_params {
                return Ok(ValidationOutcome::valid(BTreeMap::new()));
            }
            return Ok(self.fail(
                ctx,
                ValidatorError::new(ViolationKind::RequiredParameterMissing, ErrorCode::RequiredStateParam)
                    .with_target(target),
            ));
        };

        let state = match self.restore(ctx, token)? {
            Ok(state) => state,
            Err(error) => return Ok(self.fail(ctx, error.with_target(target))),
        };

        if let Some(error) = self.check_action(ctx, &state) {
            return Ok(self.fail(ctx, error));
        }

        let mut errors = Vec::new();
        let restored = self.check_parameters(ctx, &state, &mut errors);
        self.check_required(ctx, &state, &mut errors);

        Ok(ValidationOutcome::new(
            errors,
            restored,
            config.integrity_validation(),
        ))
    }

    fn fail(&self, ctx: &RequestContext, error: ValidatorError) -> ValidationOutcome {
        let restored = if self.config.integrity_validation() {
            BTreeMap::new()
        } else {
            self.passthrough(ctx)
        };
        ValidationOutcome::new(vec![error], restored, self.config.integrity_validation())
    }

    /// Request parameters minus the control parameters.
    fn passthrough(&self, ctx: &RequestContext) -> BTreeMap<String, Vec<String>> {
        ctx.parameters()
            .iter()
            .filter(|(name, _)| !self.is_control_parameter(name))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect()
    }

    fn is_control_parameter(&self, name: &str) -> bool {
        name == self.config.state_parameter_name() || name == self.config.modify_state_parameter_name()
    }

    /// Resolves the token to a state; the inner `Err` describes why the
    /// token does not resolve.
    fn restore(
        &self,
        ctx: &RequestContext,
        raw: &str,
    ) -> Result<Result<Arc<State>, ValidatorError>, Error> {
        let state_param = self.config.state_parameter_name();
        let token = match raw.parse::<StateToken>() {
            Ok(token) => token,
            Err(_) => {
                return Ok(Err(ValidatorError::new(
                    ViolationKind::InvalidStateToken,
                    ErrorCode::InvalidParameterValue,
                )
                .with_parameter(state_param)
                .with_value(raw)));
            }
        };

        let missing_page = || {
            ValidatorError::new(ViolationKind::InvalidPageOrState, ErrorCode::InvalidPageId)
                .with_parameter(state_param)
                .with_value(raw)
        };

        let state = match &token {
            StateToken::Page {
                page_id, state_id, ..
            } => {
                let Some(page) = self.pages.get_page(ctx.session(), *page_id)? else {
                    return Ok(Err(missing_page()));
                };
                match page.state(*state_id) {
                    Some(state) => Arc::clone(state),
                    None => {
                        return Ok(Err(ValidatorError::new(
                            ViolationKind::InvalidPageOrState,
                            ErrorCode::InvalidParameterValue,
                        )
                        .with_parameter(state_param)
                        .with_value(raw)));
                    }
                }
            }
            StateToken::Scoped {
                scope, state_id, ..
            } => {
                let restored = match self.scopes.scope(*scope) {
                    Some(scope) => scope.restore_state(ctx, *state_id)?,
                    None => None,
                };
                match restored {
                    Some(state) => state,
                    None => return Ok(Err(missing_page())),
                }
            }
        };

        if state.token_hash() != token.hash() {
            return Ok(Err(ValidatorError::new(
                ViolationKind::InvalidStateToken,
                ErrorCode::InvalidParameterValue,
            )
            .with_parameter(state_param)
            .with_value(raw)));
        }
        Ok(Ok(state))
    }

    fn check_action(&self, ctx: &RequestContext, state: &State) -> Option<ValidatorError> {
        let matching = self.config.action_matching();
        let expected = normalize_action(state.action(), ctx.context_path(), matching);
        let actual = normalize_action(ctx.target(), ctx.context_path(), matching);

        let method_matches = state.method().map_or(true, |m| m == ctx.method());
        if expected == actual && method_matches {
            return None;
        }
        Some(
            ValidatorError::new(ViolationKind::ActionMismatch, ErrorCode::InvalidAction)
                .with_target(ctx.target())
                .with_original_value(state.action()),
        )
    }

    fn check_parameters(
        &self,
        ctx: &RequestContext,
        state: &State,
        errors: &mut Vec<ValidatorError>,
    ) -> BTreeMap<String, Vec<String>> {
        let config = self.config;
        let target = ctx.relative_target();
        let mut restored = BTreeMap::new();

        for (name, values) in ctx.parameters() {
            if self.is_control_parameter(name) {
                continue;
            }
            if !config.needs_validation(name) || config.is_parameter_without_validation(target, name) {
                restored.insert(name.clone(), values.clone());
                continue;
            }

            let Some(recorded) = state.parameter(name) else {
                if config.allows_extra_parameters(target) {
                    restored.insert(name.clone(), values.clone());
                } else {
                    errors.push(
                        ValidatorError::new(
                            ViolationKind::ParameterTampering,
                            ErrorCode::InvalidParameterValue,
                        )
                        .with_target(target)
                        .with_parameter(name.as_str())
                        .with_value(values.join(",")),
                    );
                }
                continue;
            };

            if recorded.is_editable() {
                if config.editable_validation() {
                    let result = config.editable_validation_provider().validate(
                        target,
                        name,
                        values,
                        recorded.data_type(),
                    );
                    if let EditableValidationResult::Invalid { rule } = result {
                        ctx.log().debug(format_args!(
                            "parameter {} rejected by rule {}",
                            name, rule
                        ));
                        let mut error = ValidatorError::new(
                            ViolationKind::EditableValidationFailure,
                            ErrorCode::InvalidEditableValue,
                        )
                        .with_target(target)
                        .with_parameter(name.as_str());
                        let secret = recorded
                            .data_type()
                            .map_or(false, |t| t.eq_ignore_ascii_case("password"));
                        if !secret {
                            error = error.with_value(values.join(","));
                        }
                        errors.push(error);
                    }
                }
                restored.insert(name.clone(), values.clone());
                continue;
            }

            let mut real_values = Vec::with_capacity(values.len());
            for value in values {
                if recorded.is_confidential() {
                    match value.parse::<usize>().ok().and_then(|i| recorded.value_at(i)) {
                        Some(real) => real_values.push(real.to_string()),
                        None => errors.push(
                            ValidatorError::new(
                                ViolationKind::ParameterTampering,
                                ErrorCode::InvalidConfidentialParameter,
                            )
                            .with_target(target)
                            .with_parameter(name.as_str())
                            .with_value(value.as_str()),
                        ),
                    }
                } else if recorded.contains_value(value) {
                    real_values.push(value.clone());
                } else {
                    errors.push(
                        ValidatorError::new(
                            ViolationKind::ParameterTampering,
                            ErrorCode::InvalidParameterValue,
                        )
                        .with_target(target)
                        .with_parameter(name.as_str())
                        .with_value(value.as_str())
                        .with_original_value(recorded.values().join(",")),
                    );
                }
            }
            restored.insert(name.clone(), real_values);
        }

        restored
    }

    fn check_required(&self, ctx: &RequestContext, state: &State, errors: &mut Vec<ValidatorError>) {
        let target = ctx.relative_target();
        let missing: Vec<&str> = state
            .parameters()
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name())
            .filter(|name| {
                ctx.parameter(name).is_none()
                    && !self.is_control_parameter(name)
                    && self.config.needs_validation(name)
                    && !self.config.is_parameter_without_validation(target, name)
            })
            .collect();

        if !missing.is_empty() {
            errors.push(
                ValidatorError::new(ViolationKind::ParameterTampering, ErrorCode::RequiredParameters)
                    .with_target(target)
                    .with_parameter(missing.join(",")),
            );
        }
    }
}
