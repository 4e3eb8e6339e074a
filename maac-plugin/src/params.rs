//! Typed parameter parsing

use maac_core::StatError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

/// Named method parameters as received from callers
pub type Params = Map<String, JsonValue>;

/// Deserialize named parameters into a method's parameter struct.
/// Any shape or type problem becomes `INVALID_PARAMS`.
pub fn parse<P: DeserializeOwned>(params: &Params) -> Result<P, StatError> {
    serde_json::from_value(JsonValue::Object(params.clone()))
        .map_err(|e| StatError::invalid_params(e.to_string()))
}
