use serde::Serialize;
use serde_json::Value;

/// Encode a value the way the harness stores it: compact JSON text
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Decode a stored payload. Payloads that are not JSON (written by something
/// other than the harness) come back as a JSON string of their text.
pub fn decode(payload: &[u8]) -> Value {
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()))
}

/// Compact rendering for assertion messages
pub fn describe(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "<absent>".to_string(),
    }
}
