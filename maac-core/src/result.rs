//! Method results
//!
//! Every method call produces a `MethodResult`: a `valid` flag, an optional
//! error string, and a flat map of method-specific payload keys. An invalid
//! result carries no payload.

use crate::StatError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Outcome of one statistical method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable code of the failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(flatten)]
    pub payload: Map<String, JsonValue>,
}

impl MethodResult {
    /// Valid result with an empty payload
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
            code: None,
            payload: Map::new(),
        }
    }

    /// Invalid result carrying the error's message and code
    pub fn failed(err: &StatError) -> Self {
        Self {
            valid: false,
            error: Some(err.message.clone()),
            code: Some(err.code.clone()),
            payload: Map::new(),
        }
    }

    /// Builder: add a payload key. Non-finite floats become `null`.
    pub fn with(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Builder: add a float that may be undefined
    pub fn with_opt(self, key: &str, value: Option<f64>) -> Self {
        let value = value.filter(|x| x.is_finite());
        self.with(key, value)
    }

    /// Builder: add a list of floats, mapping non-finite entries to `null`
    pub fn with_floats(self, key: &str, values: &[f64]) -> Self {
        let items: Vec<JsonValue> = values.iter().map(|&x| float_json(x)).collect();
        self.with(key, items)
    }

    /// Builder: add a matrix of floats as nested arrays
    pub fn with_matrix(self, key: &str, rows: &[Vec<f64>]) -> Self {
        let items: Vec<JsonValue> = rows
            .iter()
            .map(|row| JsonValue::Array(row.iter().map(|&x| float_json(x)).collect()))
            .collect();
        self.with(key, items)
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.payload.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(JsonValue::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(JsonValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(JsonValue::as_bool)
    }

    /// Payload as a JSON object, for embedding in reports
    pub fn payload_json(&self) -> JsonValue {
        JsonValue::Object(self.payload.clone())
    }
}

impl From<StatError> for MethodResult {
    fn from(err: StatError) -> Self {
        Self::failed(&err)
    }
}

/// Finite float to JSON number, anything else to `null`
pub fn float_json(x: f64) -> JsonValue {
    serde_json::Number::from_f64(x)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
