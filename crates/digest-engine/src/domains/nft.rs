//! NFT domain: collection designs and individual tokens.
//!
//! Key shapes:
//! - collection design  `nft:<contract>:design`
//! - token              `nft:<contract>:<nft_idx>:nft`
//!
//! Token ownership is a mutable logical key: only the latest row per
//! (contract, nft_idx) is kept, older rows are condemned by compaction.

use digest_store::{
    Document, DocumentStore, Filter, IndexDirection, IndexRegistry, IndexSpec, OpContext,
    SortOrder, StoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{State, StateKey};

use crate::domains::{BlockRef, Compaction, DomainHandler, StateProjection};
use crate::error::EngineError;
use crate::keys::{has_prefix, has_suffix, parse_state_key, part_count};
use crate::queries;

pub const COL_NFT_COLLECTION: &str = "digest_nft_collection";
pub const COL_NFT: &str = "digest_nft";

pub const NFT_PREFIX: &str = "nft";

/// Typed payload of a collection design state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftCollectionValue {
    pub name: String,
    pub active: bool,
}

/// Typed payload of a token state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftValue {
    pub nft_idx: u64,
    pub owner: String,
    pub uri: String,
    pub approved: Option<String>,
}

pub fn is_design_state_key(key: &StateKey) -> bool {
    part_count(key) == 3 && has_prefix(key, NFT_PREFIX) && has_suffix(key, "design")
}

pub fn is_nft_state_key(key: &StateKey) -> bool {
    part_count(key) == 4 && has_prefix(key, NFT_PREFIX) && has_suffix(key, "nft")
}

/// Parses the numeric token index out of an nft state key.
fn nft_idx_token(state: &State, tokens: &[&str]) -> Result<u64, EngineError> {
    tokens[2].parse::<u64>().map_err(|_| EngineError::KeyShape {
        key: state.key.as_str().to_string(),
        expected: 4,
        found: part_count(&state.key),
    })
}

pub fn collection_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, NFT_PREFIX, 3)?;
    let _value: NftCollectionValue =
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

pub fn nft_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, NFT_PREFIX, 4)?;
    let idx = nft_idx_token(state, &tokens)?;
    let _value: NftValue =
        serde_json::from_value(state.value.clone()).map_err(|e| EngineError::MalformedValue {
            key: state.key.as_str().to_string(),
            detail: e.to_string(),
        })?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("contract", tokens[1]);
    doc.set("nft_idx", idx);
    Ok(doc)
}

/// Latest collection design for a contract.
pub async fn nft_collection(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_NFT_COLLECTION,
        Filter::new().eq("contract", contract),
    )
    .await
}

/// Latest row for one token.
pub async fn nft(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    nft_idx: u64,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_NFT,
        Filter::new().eq("contract", contract).eq("nft_idx", nft_idx),
    )
    .await
}

/// Height-paginated tokens under a contract.
pub async fn nfts(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    offset: Option<u64>,
    reverse: bool,
    limit: u64,
) -> Result<Vec<Document>, StoreError> {
    queries::history(
        store,
        ctx,
        COL_NFT,
        Filter::new().eq("contract", contract),
        offset,
        reverse,
        limit,
    )
    .await
}

/// Number of distinct token indexes under a contract.
pub async fn nft_count(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
) -> Result<u64, StoreError> {
    let rows = store
        .find(
            ctx,
            COL_NFT,
            &digest_store::Query::new(Filter::new().eq("contract", contract))
                .sort(SortOrder::Ascending),
        )
        .await?;
    let distinct: std::collections::HashSet<u64> =
        rows.iter().filter_map(|d| d.u64_field("nft_idx")).collect();
    Ok(distinct.len() as u64)
}

pub struct NftHandler;

impl DomainHandler for NftHandler {
    fn name(&self) -> &'static str {
        "nft"
    }

    fn matches(&self, key: &StateKey) -> bool {
        has_prefix(key, NFT_PREFIX)
    }

    fn project(&self, state: &State, _block: &BlockRef<'_>) -> Result<StateProjection, EngineError> {
        if is_design_state_key(&state.key) {
            Ok(StateProjection::insert(COL_NFT_COLLECTION, collection_doc(state)?))
        } else if is_nft_state_key(&state.key) {
            let tokens = parse_state_key(&state.key, NFT_PREFIX, 4)?;
            let idx = nft_idx_token(state, &tokens)?;
            let compaction = Compaction {
                collection: COL_NFT,
                filter: vec![
                    ("contract", Value::from(tokens[1])),
                    ("nft_idx", Value::from(idx)),
                ],
            };
            Ok(StateProjection::insert(COL_NFT, nft_doc(state)?).with_compaction(compaction))
        } else {
            Err(EngineError::KeyShape {
                key: state.key.as_str().to_string(),
                expected: 3,
                found: part_count(&state.key),
            })
        }
    }

    fn collections(&self) -> &'static [&'static str] {
        &[COL_NFT_COLLECTION, COL_NFT]
    }

    fn register_indexes(&self, registry: &mut IndexRegistry) {
        registry.register(
            COL_NFT_COLLECTION,
            vec![IndexSpec::new(
                "nft_collection_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
        registry.register(
            COL_NFT,
            vec![IndexSpec::new(
                "nft_idx_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("nft_idx", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{Hash, Height};

    pub(crate) fn nft_state(contract: &str, idx: u64, owner: &str, height: u64) -> State {
        State {
            key: StateKey::new(format!("{NFT_PREFIX}:{contract}:{idx}:nft")),
            height: Height::new(height),
            value: json!({
                "nft_idx": idx,
                "owner": owner,
                "uri": format!("ipfs://{contract}/{idx}"),
                "approved": null,
            }),
            operations: vec![Hash::new([2; 32])],
        }
    }

    #[test]
    fn test_nft_doc_parses_numeric_idx() {
        let doc = nft_doc(&nft_state("C1alpha", 7, "owner01", 3)).unwrap();
        assert_eq!(doc.u64_field("nft_idx"), Some(7));
        assert_eq!(doc.str_field("contract"), Some("C1alpha"));
    }

    #[test]
    fn test_non_numeric_idx_is_key_shape_violation() {
        let state = State {
            key: StateKey::new("nft:C1alpha:notanumber:nft"),
            height: Height::new(1),
            value: json!({"nft_idx": 0, "owner": "o", "uri": "u", "approved": null}),
            operations: vec![],
        };
        assert!(matches!(nft_doc(&state), Err(EngineError::KeyShape { .. })));
    }

    #[test]
    fn test_projection_compacts_on_contract_and_idx() {
        let handler = NftHandler;
        let now = chrono::Utc::now();
        let projection = handler
            .project(
                &nft_state("C1alpha", 7, "owner01", 3),
                &BlockRef {
                    height: Height::new(3),
                    proposed_at: &now,
                },
            )
            .unwrap();
        let compaction = &projection.compactions[0];
        assert_eq!(compaction.collection, COL_NFT);
        assert_eq!(compaction.filter.len(), 2);
    }
}
