//! A thin typed wrapper over handler `params` deserialization. `MethodSpec`
//! already checked required-key presence; this just turns the remaining
//! JSON-Schema-shaped blob into a concrete Rust type for the handler body.

use ember_types::EmberError;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;

pub fn parse_params<T: DeserializeOwned>(params: Json) -> Result<T, EmberError> {
    serde_json::from_value(params).map_err(|e| EmberError::InvalidParameter(e.to_string()))
}
