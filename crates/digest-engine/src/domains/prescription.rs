//! Prescription domain: registries and individual prescription records.
//!
//! Key shapes:
//! - design  `prescription:<contract>:design`
//! - info    `prescription:<contract>:<prescription_hash>:prescriptioninfo`

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

pub const COL_PRESCRIPTION: &str = "digest_prescription";
pub const COL_PRESCRIPTION_INFO: &str = "digest_prescription_info";

pub const PRESCRIPTION_PREFIX: &str = "prescription";

/// Typed payload of a prescription registry design state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionDesignValue {
    pub creator: String,
}

/// Typed payload of a prescription record state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionInfoValue {
    pub prescription_hash: String,
    pub status: String,
    pub prepare_date: u64,
    pub end_date: u64,
}

pub fn is_design_state_key(key: &StateKey) -> bool {
    part_count(key) == 3 && has_prefix(key, PRESCRIPTION_PREFIX) && has_suffix(key, "design")
}

pub fn is_info_state_key(key: &StateKey) -> bool {
    part_count(key) == 4 && has_prefix(key, PRESCRIPTION_PREFIX) && has_suffix(key, "prescriptioninfo")
}

pub fn design_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, PRESCRIPTION_PREFIX, 3)?;
    let _value: PrescriptionDesignValue =
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

pub fn info_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, PRESCRIPTION_PREFIX, 4)?;
    let _value: PrescriptionInfoValue =
        serde_json::from_value(state.value.clone()).map_err(|e| EngineError::MalformedValue {
            key: state.key.as_str().to_string(),
            detail: e.to_string(),
        })?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("contract", tokens[1]);
    doc.set("prescription_hash", tokens[2]);
    Ok(doc)
}

/// Latest registry design for a contract.
pub async fn prescription_design(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_PRESCRIPTION,
        Filter::new().eq("contract", contract),
    )
    .await
}

/// Latest record for (contract, prescription_hash).
pub async fn prescription_info(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    prescription_hash: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_PRESCRIPTION_INFO,
        Filter::new()
            .eq("contract", contract)
            .eq("prescription_hash", prescription_hash),
    )
    .await
}

pub struct PrescriptionHandler;

impl DomainHandler for PrescriptionHandler {
    fn name(&self) -> &'static str {
        "prescription"
    }

    fn matches(&self, key: &StateKey) -> bool {
        has_prefix(key, PRESCRIPTION_PREFIX)
    }

    fn project(&self, state: &State, _block: &BlockRef<'_>) -> Result<StateProjection, EngineError> {
        if is_design_state_key(&state.key) {
            Ok(StateProjection::insert(COL_PRESCRIPTION, design_doc(state)?))
        } else if is_info_state_key(&state.key) {
            Ok(StateProjection::insert(COL_PRESCRIPTION_INFO, info_doc(state)?))
        } else {
            Err(EngineError::KeyShape {
                key: state.key.as_str().to_string(),
                expected: 3,
                found: part_count(&state.key),
            })
        }
    }

    fn collections(&self) -> &'static [&'static str] {
        &[COL_PRESCRIPTION, COL_PRESCRIPTION_INFO]
    }

    fn register_indexes(&self, registry: &mut IndexRegistry) {
        registry.register(
            COL_PRESCRIPTION,
            vec![IndexSpec::new(
                "prescription_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
        registry.register(
            COL_PRESCRIPTION_INFO,
            vec![IndexSpec::new(
                "prescription_info_contract_hash_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("prescription_hash", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
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
    fn test_info_doc_round_trip() {
        let state = State {
            key: StateKey::new("prescription:C1alpha:abc123:prescriptioninfo"),
            height: Height::new(2),
            value: json!({
                "prescription_hash": "abc123",
                "status": "registered",
                "prepare_date": 20250101,
                "end_date": 20250201,
            }),
            operations: vec![Hash::new([8; 32])],
        };
        let doc = info_doc(&state).unwrap();
        assert_eq!(doc.str_field("prescription_hash"), Some("abc123"));
        assert_eq!(doc.str_field("contract"), Some("C1alpha"));
        assert_eq!(doc.height(), Some(Height::new(2)));
    }
}
