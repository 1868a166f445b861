//! Typed values crossing the script/host boundary.
//!
//! Every argument a script passes to a host service, and every value a
//! service hands back, is one of the [`ScriptValue`] shapes below. Service
//! implementations never see engine types; they validate positional
//! arguments through [`Args`], which turns a missing or mistyped argument
//! into a [`ServiceError::Violation`] with the message the business-logic
//! contract promises.

use scriptbridge_common::error::ServiceError;

/// A value marshaled out of (or into) the script engine.
///
/// Composite values (maps and arrays) travel as [`serde_json::Value`] so
/// host services can treat them uniformly as JSON documents.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// The script unit value; also stands in for absent optional arguments.
    Unit,
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A string.
    Text(String),
    /// A composite JSON document (object or array).
    Json(serde_json::Value),
}

impl ScriptValue {
    /// Human-readable type label used in violation messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            ScriptValue::Unit => "unit",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Int(_) => "integer",
            ScriptValue::Float(_) => "float",
            ScriptValue::Text(_) => "string",
            ScriptValue::Json(_) => "object",
        }
    }

    /// Returns `true` for the unit value.
    pub fn is_unit(&self) -> bool {
        matches!(self, ScriptValue::Unit)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Int(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::Text(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::Text(value)
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        ScriptValue::Json(value)
    }
}

/// Positional argument validator for host service methods.
///
/// Mistyped or missing arguments are contract violations, not recoverable
/// errors: the calling script is malformed and the instance running it will
/// be discarded.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    values: &'a [ScriptValue],
}

impl<'a> Args<'a> {
    pub fn new(values: &'a [ScriptValue]) -> Self {
        Self { values }
    }

    /// Number of arguments supplied by the caller.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw argument at `index`, if supplied.
    ///
    /// For services that accept any shape, such as log message rendering.
    pub fn value(&self, index: usize) -> Option<&'a ScriptValue> {
        self.values.get(index)
    }

    /// The argument named `name` at `index`, which must be a string.
    pub fn text(&self, index: usize, name: &str) -> Result<&'a str, ServiceError> {
        match self.values.get(index) {
            Some(ScriptValue::Text(text)) => Ok(text),
            _ => Err(ServiceError::violation(format!(
                "{name} not specified or is not a string"
            ))),
        }
    }

    /// The argument named `name` at `index`, which must be a boolean.
    pub fn boolean(&self, index: usize, name: &str) -> Result<bool, ServiceError> {
        match self.values.get(index) {
            Some(ScriptValue::Bool(flag)) => Ok(*flag),
            _ => Err(ServiceError::violation(format!(
                "{name} not specified or is not a boolean"
            ))),
        }
    }

    /// The argument named `name` at `index`, which must be a JSON document.
    pub fn json(&self, index: usize, name: &str) -> Result<&'a serde_json::Value, ServiceError> {
        match self.values.get(index) {
            Some(ScriptValue::Json(value)) => Ok(value),
            _ => Err(ServiceError::violation(format!(
                "{name} not specified or is not an object"
            ))),
        }
    }
}
