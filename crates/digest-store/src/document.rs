//! The stored document shape.
//!
//! A document is the projected, denormalized representation of one state:
//! the domain payload under `d` plus flat lookup fields (contract, sub-keys,
//! height, flags) chosen for query efficiency. Documents are append-only
//! inserts, never updated in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::Height;

/// Field name holding the embedded domain payload.
pub const FIELD_PAYLOAD: &str = "d";
/// Field name holding the block height of the originating state.
pub const FIELD_HEIGHT: &str = "height";
/// Field name holding the contract address, where applicable.
pub const FIELD_CONTRACT: &str = "contract";

/// A JSON object persisted into one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps a payload under `d` and stamps the height field.
    pub fn with_payload(payload: Value, height: Height) -> Self {
        let mut doc = Self::new();
        doc.set(FIELD_PAYLOAD, payload);
        doc.set(FIELD_HEIGHT, Value::from(height.as_u64()));
        doc
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn u64_field(&self, field: &str) -> Option<u64> {
        self.0.get(field).and_then(Value::as_u64)
    }

    pub fn bool_field(&self, field: &str) -> Option<bool> {
        self.0.get(field).and_then(Value::as_bool)
    }

    pub fn height(&self) -> Option<Height> {
        self.u64_field(FIELD_HEIGHT).map(Height::new)
    }

    pub fn payload(&self) -> Option<&Value> {
        self.0.get(FIELD_PAYLOAD)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_and_height() {
        let doc = Document::with_payload(json!({"name": "a"}), Height::new(7));
        assert_eq!(doc.height(), Some(Height::new(7)));
        assert_eq!(doc.payload(), Some(&json!({"name": "a"})));
    }

    #[test]
    fn test_typed_accessors() {
        let mut doc = Document::new();
        doc.set("contract", "C1alpha");
        doc.set("deleted", false);
        doc.set("nft_idx", 3u64);
        assert_eq!(doc.str_field("contract"), Some("C1alpha"));
        assert_eq!(doc.bool_field("deleted"), Some(false));
        assert_eq!(doc.u64_field("nft_idx"), Some(3));
        assert_eq!(doc.str_field("missing"), None);
    }
}
