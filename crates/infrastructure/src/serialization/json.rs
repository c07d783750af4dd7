//! JSON serialization helpers for deterministic output.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Error type for serialization operations.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// JSON serialization failed.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// JSON deserialization failed.
    #[error("JSON deserialization failed: {0}")]
    Deserialize(serde_json::Error),

    /// UTF-8 encoding error.
    #[error("UTF-8 encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Serializes a value to deterministic JSON.
///
/// Output format:
/// - 2-space indentation
/// - Trailing newline
/// - Keys sorted alphabetically (requires `BTreeMap` in source types)
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_stable<T: Serialize>(value: &T) -> Result<String, SerializationError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;

    let mut json = String::from_utf8(buffer)?;
    json.push('\n');
    Ok(json)
}

/// Serializes a value to deterministic JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_stable_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    Ok(to_json_stable(value)?.into_bytes())
}

/// Deserializes JSON from bytes.
///
/// # Errors
///
/// Returns an error if the JSON is invalid or doesn't match the expected type.
pub fn from_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    serde_json::from_slice(bytes).map_err(SerializationError::Deserialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_stable_serialization_has_trailing_newline() {
        let mut map = BTreeMap::new();
        map.insert("refreshToken", "r");

        let json = to_json_stable(&map).expect("serialization should work");
        assert!(json.ends_with('\n'));
        assert!(json.contains("  \"refreshToken\""));
    }

    #[test]
    fn test_btreemap_keys_are_sorted() {
        let mut map = BTreeMap::new();
        map.insert("userName", 1);
        map.insert("accessToken", 2);
        map.insert("refreshToken", 3);

        let json = to_json_stable(&map).expect("serialization should work");
        let access = json.find("accessToken").expect("accessToken should be in json");
        let refresh = json.find("refreshToken").expect("refreshToken should be in json");
        let name = json.find("userName").expect("userName should be in json");

        assert!(access < refresh);
        assert!(refresh < name);
    }

    #[test]
    fn test_from_json_bytes_rejects_garbage() {
        let result: Result<BTreeMap<String, String>, _> = from_json_bytes(b"{oops");
        assert!(matches!(result, Err(SerializationError::Deserialize(_))));
    }
}
