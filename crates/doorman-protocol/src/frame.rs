use crate::error::{ProtocolError, Result};
use doorman_core::AccessCommand;
use serde::Serialize;
use serde_json::{Map, Value};

/// Parse `text` into a JSON object and return it with its `"type"` tag.
pub(crate) fn parse_tagged(text: &str) -> Result<(String, Map<String, Value>)> {
    let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;
    let Value::Object(object) = value else {
        return Err(ProtocolError::InvalidJson);
    };

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    Ok((kind, object))
}

/// Non-empty string field, or `None`.
pub(crate) fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn command_field(object: &Map<String, Value>, key: &str) -> Result<AccessCommand> {
    let raw = str_field(object, key).ok_or(ProtocolError::InvalidField("command"))?;
    raw.parse()
        .map_err(|_| ProtocolError::InvalidCommand(raw.to_string()))
}

pub(crate) fn encode<T: Serialize>(frame: &T) -> Result<String> {
    serde_json::to_string(frame).map_err(|e| ProtocolError::Encode(e.to_string()))
}
