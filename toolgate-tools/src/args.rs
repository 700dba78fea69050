//! Raw argument decoding and schema coercion.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::spec::{ArgType, ToolSpec};

/// Keyword arguments handed to a tool body.
pub type Arguments = Map<String, Value>;

/// Errors produced while decoding or coercing a raw argument payload.
///
/// The `Display` form is the detail that follows `bad_args:` in a failed
/// result.
#[derive(Debug, Error)]
pub enum ArgsError {
    /// The payload was not well-formed JSON.
    #[error("{0}")]
    Syntax(#[from] serde_json::Error),
    /// The payload was well-formed but its top-level value is not an object.
    #[error("args_not_object")]
    NotObject,
    /// A declared argument could not be coerced to its declared type.
    #[error("bad_{expected}:{key}")]
    Coercion {
        /// Name of the offending argument.
        key: String,
        /// Type the schema declares for the argument.
        expected: ArgType,
    },
}

impl ArgsError {
    fn coercion(key: &str, expected: ArgType) -> Self {
        Self::Coercion {
            key: key.to_owned(),
            expected,
        }
    }
}

/// Decodes the raw payload into an argument object.
///
/// An empty or whitespace-only payload decodes to an empty object.
///
/// # Errors
///
/// Returns [`ArgsError::Syntax`] for malformed JSON and
/// [`ArgsError::NotObject`] when the top-level value is not an object.
pub fn parse_arguments(raw: &str) -> Result<Arguments, ArgsError> {
    if raw.trim().is_empty() {
        return Ok(Arguments::new());
    }

    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(ArgsError::NotObject),
    }
}

/// Applies defaults and coerces declared arguments to their schema types.
///
/// The input is left untouched; a new map is returned. Keys the schema does
/// not declare are copied through with their original type.
///
/// # Errors
///
/// Returns [`ArgsError::Coercion`] naming the first argument (in key order)
/// whose value cannot be coerced.
pub fn coerce_arguments(spec: &ToolSpec, input: &Arguments) -> Result<Arguments, ArgsError> {
    let mut out = input.clone();
    for (key, value) in spec.defaults() {
        if !out.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }

    for (key, arg_type) in spec.schema() {
        let Some(value) = out.get_mut(key) else {
            continue;
        };
        let coerced = coerce_value(*arg_type, value)
            .ok_or_else(|| ArgsError::coercion(key, *arg_type))?;
        if let Some(coerced) = coerced {
            *value = coerced;
        }
    }

    Ok(out)
}

/// Decodes and coerces `raw` against `spec` in one step.
///
/// # Errors
///
/// Propagates any error from [`parse_arguments`] or [`coerce_arguments`].
pub fn decode_arguments(spec: &ToolSpec, raw: &str) -> Result<Arguments, ArgsError> {
    let parsed = parse_arguments(raw)?;
    coerce_arguments(spec, &parsed)
}

/// Returns `None` when the value is rejected, `Some(None)` when it is
/// already of the right type, and `Some(Some(v))` with a converted value.
fn coerce_value(arg_type: ArgType, value: &Value) -> Option<Option<Value>> {
    match (arg_type, value) {
        (ArgType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(None),
        (ArgType::Int, Value::String(s)) => parse_int(s).map(Some),
        (ArgType::Bool, Value::Bool(_)) | (ArgType::Str, Value::String(_)) => Some(None),
        (ArgType::Bool, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Some(Some(Value::Bool(true))),
            "false" => Some(Some(Value::Bool(false))),
            _ => None,
        },
        _ => None,
    }
}

/// Unsigned strings beyond `i64::MAX` fall back to `u64`, matching the range
/// accepted for JSON numbers.
fn parse_int(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match trimmed.parse::<i64>() {
        Ok(n) => Some(Value::from(n)),
        Err(_) if !negative => digits.parse::<u64>().ok().map(Value::from),
        Err(_) => None,
    }
}
