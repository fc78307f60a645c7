//! Timestamp domain: proof-of-existence services and their issued items.
//!
//! Key shapes:
//! - design  `timestamp:<contract>:design`
//! - item    `timestamp:<contract>:<project_id>:<timestamp_idx>:item`

use digest_store::{
    Document, DocumentStore, Filter, IndexDirection, IndexRegistry, IndexSpec, OpContext,
    StoreError,
};
use serde::{Deserialize, Serialize};
use shared_types::{State, StateKey};

use crate::domains::{BlockRef, DomainHandler, StateProjection};
use crate::error::EngineError;
use crate::keys::{has_prefix, has_suffix, parse_state_key, part_count};
use crate::queries;

pub const COL_TIMESTAMP: &str = "digest_timestamp";
pub const COL_TIMESTAMP_ITEM: &str = "digest_timestamp_item";

pub const TIMESTAMP_PREFIX: &str = "timestamp";

/// Typed payload of a timestamp service design state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampDesignValue {
    pub projects: Vec<String>,
}

/// Typed payload of an issued timestamp item state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampItemValue {
    pub project_id: String,
    pub timestamp_idx: u64,
    pub request_time: u64,
    pub data: String,
}

pub fn is_design_state_key(key: &StateKey) -> bool {
    part_count(key) == 3 && has_prefix(key, TIMESTAMP_PREFIX) && has_suffix(key, "design")
}

pub fn is_item_state_key(key: &StateKey) -> bool {
    part_count(key) == 5 && has_prefix(key, TIMESTAMP_PREFIX) && has_suffix(key, "item")
}

pub fn design_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, TIMESTAMP_PREFIX, 3)?;
    let _value: TimestampDesignValue =
        serde_json::from_value(state.value.clone()).map_err(|e| EngineError::MalformedValue {
            key: state.key.as_str().to_string(),
            detail: e.to_string(),
        })?;
    let payload = serde_json::to_value(state).map_err(|e| EngineError::MalformedValue {
        key: state.key.as_str().to_string(),
        detail: e.to_string(),
    })?;
    let mut doc = Document::with_payload(payload, state.height);
    doc.set("contract", tokens[1]);
    Ok(doc)
}

pub fn item_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, TIMESTAMP_PREFIX, 5)?;
    let idx = tokens[3].parse::<u64>().map_err(|_| EngineError::KeyShape {
        key: state.key.as_str().to_string(),
        expected: 5,
        found: part_count(&state.key),
    })?;
    let _value: TimestampItemValue =
        serde_json::from_value(state.value.clone()).map_err(|e| EngineError::MalformedValue {
            key: state.key.as_str().to_string(),
            detail: e.to_string(),
        })?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("contract", tokens[1]);
    doc.set("project_id", tokens[2]);
    doc.set("timestamp_idx", idx);
    Ok(doc)
}

/// Latest design for a contract.
pub async fn timestamp_design(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(store, ctx, COL_TIMESTAMP, Filter::new().eq("contract", contract)).await
}

/// Latest item for (contract, project_id, timestamp_idx).
pub async fn timestamp_item(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    project_id: &str,
    timestamp_idx: u64,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_TIMESTAMP_ITEM,
        Filter::new()
            .eq("contract", contract)
            .eq("project_id", project_id)
            .eq("timestamp_idx", timestamp_idx),
    )
    .await
}

pub struct TimestampHandler;

impl DomainHandler for TimestampHandler {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn matches(&self, key: &StateKey) -> bool {
        has_prefix(key, TIMESTAMP_PREFIX)
    }

    fn project(&self, state: &State, _block: &BlockRef<'_>) -> Result<StateProjection, EngineError> {
        if is_design_state_key(&state.key) {
            Ok(StateProjection::insert(COL_TIMESTAMP, design_doc(state)?))
        } else if is_item_state_key(&state.key) {
            Ok(StateProjection::insert(COL_TIMESTAMP_ITEM, item_doc(state)?))
        } else {
            Err(EngineError::KeyShape {
                key: state.key.as_str().to_string(),
                expected: 3,
                found: part_count(&state.key),
            })
        }
    }

    fn collections(&self) -> &'static [&'static str] {
        &[COL_TIMESTAMP, COL_TIMESTAMP_ITEM]
    }

    fn register_indexes(&self, registry: &mut IndexRegistry) {
        registry.register(
            COL_TIMESTAMP,
            vec![IndexSpec::new(
                "timestamp_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
        registry.register(
            COL_TIMESTAMP_ITEM,
            vec![IndexSpec::new(
                "timestamp_idx_contract_height_project",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                    ("project_id", IndexDirection::Ascending),
                    ("timestamp_idx", IndexDirection::Ascending),
                ],
            )],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{Hash, Height};

    #[test]
    fn test_item_doc_round_trip() {
        let state = State {
            key: StateKey::new("timestamp:C1alpha:proj1:12:item"),
            height: Height::new(6),
            value: json!({
                "project_id": "proj1",
                "timestamp_idx": 12,
                "request_time": 1700000000,
                "data": "deadbeef",
            }),
            operations: vec![Hash::new([4; 32])],
        };
        let doc = item_doc(&state).unwrap();
        assert_eq!(doc.str_field("project_id"), Some("proj1"));
        assert_eq!(doc.u64_field("timestamp_idx"), Some(12));
        assert_eq!(doc.str_field("contract"), Some("C1alpha"));
    }

    #[test]
    fn test_item_key_requires_five_parts() {
        let state = State {
            key: StateKey::new("timestamp:C1alpha:proj1:item"),
            height: Height::new(6),
            value: json!({}),
            operations: vec![],
        };
        let handler = TimestampHandler;
        let now = chrono::Utc::now();
        assert!(matches!(
            handler.project(
                &state,
                &BlockRef {
                    height: Height::new(6),
                    proposed_at: &now
                }
            ),
            Err(EngineError::KeyShape { .. })
        ));
    }
}
