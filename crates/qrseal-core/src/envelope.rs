//! Envelope wire format
//!
//! The JSON object sealed inside every token:
//! `{"data": .., "timestamp": <epoch ms>, "id": "<uuid>", "version": 1, "signature": "<hex>"}`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Current envelope format version
pub const FORMAT_VERSION: u64 = 1;

/// Payload plus issue metadata, before serialization and encryption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Caller-supplied payload, opaque to the codec
    pub data: Value,
    /// Issue time in epoch milliseconds
    pub timestamp: i64,
    /// Random v4 UUID for traceability. Decode accepts any value, or none
    #[serde(default)]
    pub id: Value,
    pub version: u64,
    /// Lowercase hex HMAC-SHA-256 over the other fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Envelope {
    /// Unsigned envelope with a fresh id
    pub fn new(data: Value, timestamp: i64) -> Self {
        Self {
            data,
            timestamp,
            id: Value::String(Uuid::new_v4().to_string()),
            version: FORMAT_VERSION,
            signature: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_field_names() {
        let envelope = Envelope::new(json!({ "room": "B12" }), 1_700_000_000_000);
        let value = serde_json::to_value(&envelope).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object["data"], json!({ "room": "B12" }));
        assert_eq!(object["timestamp"], json!(1_700_000_000_000i64));
        assert_eq!(object["version"], json!(1));
        assert!(Uuid::parse_str(object["id"].as_str().unwrap()).is_ok());
        assert!(!object.contains_key("signature"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Envelope::new(Value::Null, 0);
        let b = Envelope::new(Value::Null, 0);
        assert_ne!(a.id, b.id);
    }
}
