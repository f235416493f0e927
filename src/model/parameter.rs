/// A parameter offered to the client within one state.
///
/// Composing the same name more than once inside a state adds values to
/// the same parameter. Values are kept in composition order and never
/// duplicated, so a value's position is its confidential substitution
/// index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    values: Vec<String>,
    confidential: bool,
    editable: bool,
    required: bool,
    data_type: Option<String>,
}

impl Parameter {
    /// Creates a parameter without values.
    pub fn new(name: impl Into<String>, editable: bool, confidential: bool) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            confidential,
            editable,
            required: !editable,
            data_type: None,
        }
    }

    /// Sets the component type (`text`, `password`, `textarea`, ...).
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Overrides whether the parameter must be present in the request.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Records `value`, returning its index.
    ///
    /// Recording a value already present returns the existing index.
    pub fn add_value(&mut self, value: &str) -> usize {
        if let Some(index) = self.values.iter().position(|v| v == value) {
            return index;
        }
        self.values.push(value.to_string());
        self.values.len() - 1
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the recorded values.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Returns the value recorded at `index`.
    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Returns `true` if `value` was recorded.
    pub fn contains_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Returns `true` if values were rendered as substitution indices.
    pub fn is_confidential(&self) -> bool {
        self.confidential
    }

    /// Returns `true` for free-text parameters.
    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// Returns `true` if a request must carry this parameter.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the component type, if declared.
    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }
}
