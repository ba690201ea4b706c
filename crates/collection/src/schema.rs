//! Per-field validation rules enforced before any collection write (§4.5
//! "Schema"). Validation runs in full before a document reaches the store,
//! so a rejected document never produces partial state.

use emberstore_core::{EmberError, Result, Value};
use regex::Regex;
use std::collections::HashMap;

/// The JSON type a field is constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.as_json().is_string(),
            FieldType::Number => value.as_json().is_number(),
            FieldType::Boolean => value.as_json().is_boolean(),
            FieldType::Array => value.as_json().is_array(),
            FieldType::Object => value.as_json().is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

/// Validation rules for a single document field.
#[derive(Debug, Clone, Default)]
pub struct FieldRule {
    field_type: Option<FieldType>,
    required: bool,
    min: Option<f64>,
    max: Option<f64>,
    enum_values: Option<Vec<Value>>,
    pattern: Option<Regex>,
}

impl FieldRule {
    /// A rule with no constraints; chain the builder methods below.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the field to a JSON type.
    pub fn of_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// The field must be present for a document to validate.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Minimum numeric value, or minimum string/array length.
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Maximum numeric value, or maximum string/array length.
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// The field's value must equal one of `values`.
    pub fn one_of(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// The field, if a string, must match `pattern` (a regex searched
    /// anywhere in the string, not anchored).
    pub fn matching(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Some(Regex::new(pattern).map_err(|e| EmberError::validation(e.to_string()))?);
        Ok(self)
    }
}

/// A named set of per-field rules for a collection's documents.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    rules: HashMap<String, FieldRule>,
}

impl Schema {
    /// A schema with no fields constrained.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rule for `field`.
    pub fn field(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.insert(field.into(), rule);
        self
    }

    /// Validate `doc` (expected to be a JSON object) against every rule.
    /// Returns the first violation found; does not mutate `doc`.
    pub fn validate(&self, doc: &Value) -> Result<()> {
        let object = doc.as_json().as_object();
        for (field, rule) in &self.rules {
            let found = object.and_then(|o| o.get(field));
            match found {
                None => {
                    if rule.required {
                        return Err(EmberError::validation(format!("field '{field}' is required")));
                    }
                }
                Some(raw) => {
                    let value = Value::from_json(raw.clone());
                    self.validate_field(field, rule, &value)?;
                }
            }
        }
        Ok(())
    }

    fn validate_field(&self, field: &str, rule: &FieldRule, value: &Value) -> Result<()> {
        if let Some(field_type) = rule.field_type {
            if !field_type.matches(value) {
                return Err(EmberError::validation(format!("field '{field}' must be {}", field_type.name())));
            }
        }
        if let Some(min) = rule.min {
            if !satisfies_min(value, min) {
                return Err(EmberError::validation(format!("field '{field}' is below minimum {min}")));
            }
        }
        if let Some(max) = rule.max {
            if !satisfies_max(value, max) {
                return Err(EmberError::validation(format!("field '{field}' exceeds maximum {max}")));
            }
        }
        if let Some(allowed) = &rule.enum_values {
            if !allowed.iter().any(|v| v.as_json() == value.as_json()) {
                return Err(EmberError::validation(format!("field '{field}' is not one of the allowed values")));
            }
        }
        if let Some(pattern) = &rule.pattern {
            match value.as_json().as_str() {
                Some(s) if pattern.is_match(s) => {}
                _ => return Err(EmberError::validation(format!("field '{field}' does not match the required pattern"))),
            }
        }
        Ok(())
    }
}

fn satisfies_min(value: &Value, min: f64) -> bool {
    if let Some(n) = value.as_json().as_f64() {
        return n >= min;
    }
    length_of(value).map(|len| len as f64 >= min).unwrap_or(true)
}

fn satisfies_max(value: &Value, max: f64) -> bool {
    if let Some(n) = value.as_json().as_f64() {
        return n <= max;
    }
    length_of(value).map(|len| len as f64 <= max).unwrap_or(true)
}

fn length_of(value: &Value) -> Option<usize> {
    match value.as_json() {
        serde_json::Value::String(s) => Some(s.chars().count()),
        serde_json::Value::Array(a) => Some(a.len()),
        _ => None,
    }
}
