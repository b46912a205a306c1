//! Recover a JSON object from noisy completion text.

use serde_json::{Map, Value};

use crate::core::error::LoopError;

/// Extract the single JSON object a reply is expected to carry.
///
/// Tries the whole text first, then the span from the first `{` to the last `}`.
/// Anything that does not parse to an object is [`LoopError::NoJsonFound`].
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, LoopError> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(LoopError::NoJsonFound);
    };
    if end < start {
        return Err(LoopError::NoJsonFound);
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(LoopError::NoJsonFound),
    }
}
