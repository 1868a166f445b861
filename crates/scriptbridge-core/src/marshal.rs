//! Conversions between engine [`Dynamic`] values and [`ScriptValue`].
//!
//! Marshaling is deliberately lossy in one direction only: any engine value
//! that cannot be represented as a [`ScriptValue`] (function pointers,
//! custom types) is rejected as a contract violation rather than smuggled
//! across the boundary.

use rhai::{Dynamic, EvalAltResult};
use scriptbridge_common::error::ServiceError;

use crate::value::ScriptValue;

/// Marshals one engine value out of the script.
pub fn dynamic_to_value(value: &Dynamic) -> Result<ScriptValue, ServiceError> {
    if value.is_unit() {
        return Ok(ScriptValue::Unit);
    }
    if let Some(flag) = value.clone().try_cast::<bool>() {
        return Ok(ScriptValue::Bool(flag));
    }
    if let Some(int) = value.clone().try_cast::<i64>() {
        return Ok(ScriptValue::Int(int));
    }
    if let Some(float) = value.clone().try_cast::<f64>() {
        return Ok(ScriptValue::Float(float));
    }
    if let Some(text) = value.clone().try_cast::<String>() {
        return Ok(ScriptValue::Text(text));
    }
    if value.is_map() || value.is_array() {
        let json: serde_json::Value = rhai::serde::from_dynamic(value).map_err(|err| {
            ServiceError::violation(format!("argument cannot cross the host boundary: {err}"))
        })?;
        return Ok(ScriptValue::Json(json));
    }
    Err(ServiceError::violation(format!(
        "argument of type '{}' cannot cross the host boundary",
        value.type_name()
    )))
}

/// Marshals a host value back into the engine.
pub fn value_to_dynamic(value: &ScriptValue) -> Result<Dynamic, Box<EvalAltResult>> {
    match value {
        ScriptValue::Unit => Ok(Dynamic::UNIT),
        ScriptValue::Bool(flag) => Ok((*flag).into()),
        ScriptValue::Int(int) => Ok((*int).into()),
        ScriptValue::Float(float) => Ok((*float).into()),
        ScriptValue::Text(text) => Ok(text.clone().into()),
        ScriptValue::Json(json) => rhai::serde::to_dynamic(json),
    }
}

/// Renders a script-side error value as a message string.
///
/// Error maps with a `message` property render as that message; anything
/// else falls back to its display form.
pub fn describe_error_value(value: &Dynamic) -> String {
    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        if let Some(message) = map.get("message") {
            if let Some(text) = message.clone().try_cast::<String>() {
                return text;
            }
        }
    }
    value.to_string()
}

/// Renders an engine evaluation error as a message string.
///
/// Thrown script values unwrap to [`describe_error_value`]; engine-level
/// failures (missing functions, syntax in late-bound calls) keep their
/// full display form, position included.
pub fn describe_eval_error(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => describe_error_value(value),
        other => other.to_string(),
    }
}
