//! Numeric coercion
//!
//! Loosely-typed JSON values become `f64` here. Non-finite values are never
//! handed onwards: they are dropped at ingestion.

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Error type for numeric ingestion and linear algebra
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericError {
    #[error("Value is not numeric: {0}")]
    NonNumeric(String),

    #[error("Columns must have equal length: '{column}' has {got}, expected {expected}")]
    Ragged {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("Matrix is singular: {0}")]
    Singular(String),

    #[error("Zero variance: {0}")]
    ZeroVariance(String),
}

/// Return `Some(x)` only for finite values
pub fn safe_float(x: f64) -> Option<f64> {
    if x.is_finite() {
        Some(x)
    } else {
        None
    }
}

/// Lenient coercion: numbers, numeric strings and booleans become finite
/// floats; everything else (and NaN/Inf) is `None`.
pub fn coerce_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64().and_then(safe_float),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().and_then(safe_float),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Strict element parsing for method parameters.
///
/// `null` and non-finite values are missing (`Ok(None)`); strings that do
/// not parse, arrays and objects are errors.
pub fn parse_element(value: &JsonValue) -> Result<Option<f64>, NumericError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Number(n) => Ok(n.as_f64().and_then(safe_float)),
        JsonValue::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map(safe_float)
            .map_err(|_| NumericError::NonNumeric(format!("\"{}\"", s))),
        other => Err(NumericError::NonNumeric(other.to_string())),
    }
}
