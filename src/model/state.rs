use std::fmt::Write as _;

use super::Parameter;
use crate::request::Method;

/// Identifier of a state within its page (or scope).
pub type StateId = u32;

/// One link or form as it was rendered.
///
/// States are built by the composer and sealed when the request they
/// describe is closed. Once sealed they are shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    id: StateId,
    action: String,
    method: Option<Method>,
    parameters: Vec<Parameter>,
    token_hash: String,
}

impl State {
    /// Creates an open state for `action`.
    ///
    /// `method` of `None` accepts any request method.
    pub fn new(action: impl Into<String>, method: Option<Method>) -> Self {
        Self {
            id: 0,
            action: action.into(),
            method,
            parameters: Vec::new(),
            token_hash: String::new(),
        }
    }

    /// Returns the state id.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Returns the recorded target action.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the allowed method, `None` meaning any.
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// Returns the parameters in composition order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Returns the parameter called `name`.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Returns the hash embedded in the token issued for this state.
    pub fn token_hash(&self) -> &str {
        &self.token_hash
    }

    /// Returns the parameter called `name`, creating it with `create` if absent.
    pub(crate) fn parameter_entry(
        &mut self,
        name: &str,
        create: impl FnOnce() -> Parameter,
    ) -> &mut Parameter {
        let index = match self.parameters.iter().position(|p| p.name() == name) {
            Some(index) => index,
            None => {
                self.parameters.push(create());
                self.parameters.len() - 1
            }
        };
        &mut self.parameters[index]
    }

    pub(crate) fn seal(&mut self, id: StateId, token_hash: String) {
        self.id = id;
        self.token_hash = token_hash;
    }

    /// Canonical description of the method, action and parameters.
    ///
    /// Two states with equal keys describe the same request, which lets
    /// long-living scopes hand out one token for repeated compositions.
    pub fn scope_key(&self) -> String {
        let mut key = String::with_capacity(self.action.len() + 32);
        let method = self.method.map(|m| m.as_str()).unwrap_or("*");
        let _ = write!(key, "{}|{}", method, self.action);
        for param in &self.parameters {
            key.push('|');
            key.push_str(&urlencoding::encode(param.name()));
            if param.is_editable() {
                key.push_str("~e");
            }
            key.push('=');
            let encoded: Vec<_> = param
                .values()
                .iter()
                .map(|v| urlencoding::encode(v))
                .collect();
            key.push_str(&encoded.join(","));
        }
        key
    }
}
