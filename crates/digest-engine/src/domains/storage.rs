//! Storage domain: contract-scoped key/value data with deletion flags.
//!
//! Key shapes:
//! - design  `storage:<contract>:design`
//! - data    `storage:<contract>:<data_key>:data`
//!
//! Data rows keep their full history; deletes are projected as rows with
//! `deleted: true`, so "current value" and "history" both remain queryable.

use digest_store::{
    Document, DocumentStore, Filter, IndexDirection, IndexRegistry, IndexSpec, OpContext,
    SortOrder, StoreError,
};
use serde::{Deserialize, Serialize};
use shared_types::{State, StateKey};

use crate::domains::{BlockRef, DomainHandler, StateProjection};
use crate::error::EngineError;
use crate::keys::{has_prefix, has_suffix, parse_state_key, part_count};
use crate::queries;

pub const COL_STORAGE: &str = "digest_storage";
pub const COL_STORAGE_DATA: &str = "digest_storage_data";

pub const STORAGE_PREFIX: &str = "storage";

/// Typed payload of a storage design state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageDesignValue {
    pub creator: String,
}

/// Typed payload of a storage data state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageDataValue {
    pub data_key: String,
    pub value: String,
    pub deleted: bool,
}

pub fn is_design_state_key(key: &StateKey) -> bool {
    part_count(key) == 3 && has_prefix(key, STORAGE_PREFIX) && has_suffix(key, "design")
}

pub fn is_data_state_key(key: &StateKey) -> bool {
    part_count(key) == 4 && has_prefix(key, STORAGE_PREFIX) && has_suffix(key, "data")
}

/// Design document: the whole state under `d` (the read side links the
/// state's contributing operations), contract denormalized.
pub fn design_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, STORAGE_PREFIX, 3)?;
    let _value: StorageDesignValue = serde_json::from_value(
        state.value.clone(),
    )
    .map_err(|e| EngineError::MalformedValue {
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

/// Data document: payload plus contract, data key, first contributing
/// operation, block timestamp and deletion flag.
pub fn data_doc(state: &State, block: &BlockRef<'_>) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, STORAGE_PREFIX, 4)?;
    let value: StorageDataValue =
        serde_json::from_value(state.value.clone()).map_err(|e| EngineError::MalformedValue {
            key: state.key.as_str().to_string(),
            detail: e.to_string(),
        })?;
    let operation = state
        .operations
        .first()
        .ok_or_else(|| EngineError::MalformedValue {
            key: state.key.as_str().to_string(),
            detail: "state carries no operations".to_string(),
        })?;

    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("contract", tokens[1]);
    doc.set("data_key", value.data_key.as_str());
    doc.set("operation", operation.to_hex());
    doc.set("timestamp", block.proposed_at.to_rfc3339());
    doc.set("deleted", value.deleted);
    Ok(doc)
}

/// Latest storage design for a contract.
pub async fn storage_design(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(store, ctx, COL_STORAGE, Filter::new().eq("contract", contract)).await
}

/// Latest data row for (contract, data_key).
pub async fn storage_data(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    data_key: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_STORAGE_DATA,
        Filter::new().eq("contract", contract).eq("data_key", data_key),
    )
    .await
}

/// Height-paginated history for (contract, data_key).
pub async fn storage_data_history(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    data_key: &str,
    offset: Option<u64>,
    reverse: bool,
    limit: u64,
) -> Result<Vec<Document>, StoreError> {
    queries::history(
        store,
        ctx,
        COL_STORAGE_DATA,
        Filter::new().eq("contract", contract).eq("data_key", data_key),
        offset,
        reverse,
        limit,
    )
    .await
}

/// Number of distinct data keys whose latest row is live (or any latest row
/// when `include_deleted`).
pub async fn storage_data_count(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    include_deleted: bool,
) -> Result<u64, StoreError> {
    let rows = store
        .find(
            ctx,
            COL_STORAGE_DATA,
            &digest_store::Query::new(Filter::new().eq("contract", contract))
                .sort(SortOrder::Descending),
        )
        .await?;

    let mut latest: std::collections::HashMap<String, bool> = std::collections::HashMap::new();
    for row in rows {
        let key = row.str_field("data_key").unwrap_or_default().to_string();
        let deleted = row.bool_field("deleted").unwrap_or(false);
        // Rows arrive height-descending; the first row per key is its latest.
        latest.entry(key).or_insert(deleted);
    }

    Ok(latest
        .values()
        .filter(|deleted| include_deleted || !**deleted)
        .count() as u64)
}

pub struct StorageHandler;

impl DomainHandler for StorageHandler {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn matches(&self, key: &StateKey) -> bool {
        has_prefix(key, STORAGE_PREFIX)
    }

    fn project(&self, state: &State, block: &BlockRef<'_>) -> Result<StateProjection, EngineError> {
        if is_design_state_key(&state.key) {
            Ok(StateProjection::insert(COL_STORAGE, design_doc(state)?))
        } else if is_data_state_key(&state.key) {
            Ok(StateProjection::insert(COL_STORAGE_DATA, data_doc(state, block)?))
        } else {
            // Prefix matched but the shape is unknown for this domain.
            Err(EngineError::KeyShape {
                key: state.key.as_str().to_string(),
                expected: 3,
                found: part_count(&state.key),
            })
        }
    }

    fn collections(&self) -> &'static [&'static str] {
        &[COL_STORAGE, COL_STORAGE_DATA]
    }

    fn register_indexes(&self, registry: &mut IndexRegistry) {
        registry.register(
            COL_STORAGE,
            vec![IndexSpec::new(
                "storage_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
        registry.register(
            COL_STORAGE_DATA,
            vec![
                IndexSpec::new(
                    "storage_data_contract_key_height",
                    &[
                        ("contract", IndexDirection::Ascending),
                        ("data_key", IndexDirection::Ascending),
                        ("height", IndexDirection::Descending),
                    ],
                ),
                IndexSpec::new(
                    "storage_data_height",
                    &[("height", IndexDirection::Descending)],
                ),
            ],
        );
    }
}
