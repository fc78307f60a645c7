//! Shared fixtures: finalized-block builders and an in-process API client.

use std::sync::Arc;

use chrono::Utc;
use digest_api::{build_router, ApiConfig, AppState};
use digest_engine::domains::DomainRegistry;
use digest_engine::{BlockSession, EngineError};
use digest_store::{MemoryStore, OpContext};
use serde_json::{json, Value};
use shared_types::{
    Address, BlockManifest, Hash, Height, OperationFact, OperationRecord, OperationResultNode,
    OperationResultSet, ProposalInfo, State, StateKey,
};

pub fn addr(s: &str) -> Address {
    Address::parse(s).expect("fixture address")
}

pub fn hash(seed: u8) -> Hash {
    Hash::new([seed; 32])
}

pub fn manifest(height: u64) -> BlockManifest {
    BlockManifest {
        height: Height::new(height),
        previous: hash(1),
        proposal: hash(2),
        operations_tree: hash(3),
        states_tree: hash(4),
        suffrage: hash(5),
        proposed_at: Utc::now(),
    }
}

pub fn proposal() -> ProposalInfo {
    ProposalInfo {
        proposer: addr("proposer1"),
        round: 0,
    }
}

/// An applied operation and its matching result-tree node.
pub fn applied_operation(seed: u8, fact: OperationFact) -> (OperationRecord, OperationResultNode) {
    let fact_hash = hash(seed);
    (
        OperationRecord { fact_hash, fact },
        OperationResultNode {
            key: fact_hash.to_hex(),
            in_state: true,
            reason: None,
        },
    )
}

pub fn storage_design_state(contract: &str, height: u64, operation: Hash) -> State {
    State {
        key: StateKey::new(format!("storage:{contract}:design")),
        height: Height::new(height),
        value: json!({"creator": "creator1"}),
        operations: vec![operation],
    }
}

pub fn storage_data_state(
    contract: &str,
    data_key: &str,
    value: &str,
    deleted: bool,
    height: u64,
) -> State {
    State {
        key: StateKey::new(format!("storage:{contract}:{data_key}:data")),
        height: Height::new(height),
        value: json!({"data_key": data_key, "value": value, "deleted": deleted}),
        operations: vec![hash(0x77)],
    }
}

/// Prepares and commits one block against the store.
pub async fn commit_block(
    store: &MemoryStore,
    registry: &Arc<DomainRegistry>,
    height: u64,
    states: Vec<State>,
    ops: Vec<(OperationRecord, OperationResultNode)>,
) -> Result<(), EngineError> {
    let (operations, nodes): (Vec<_>, Vec<_>) = ops.into_iter().unzip();
    let mut session = BlockSession::new(
        Arc::new(store.clone()),
        Arc::clone(registry),
        manifest(height),
        operations,
        OperationResultSet::new(nodes),
        states,
        proposal(),
        Utc::now(),
        "chain-digest/test",
    )?;
    session.prepare()?;
    session.commit(&OpContext::background()).await.map(|_| ())
}

/// In-process read API over a shared memory store.
pub struct TestApi {
    pub store: MemoryStore,
    pub registry: Arc<DomainRegistry>,
    pub state: AppState,
    pub router: axum::Router,
}

impl TestApi {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let registry = Arc::new(DomainRegistry::standard());
        let state = AppState::new(Arc::new(store.clone()), ApiConfig::default());
        Self {
            store,
            registry,
            state: state.clone(),
            router: build_router(state),
        }
    }

    /// Issues a GET and returns (status, parsed JSON body).
    pub async fn get(&self, path: &str) -> (u16, Value) {
        use http_body_util::BodyExt;
        use tower::ServiceExt;

        let response = self
            .router
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri(path)
                    .body(axum::body::Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router call");

        let status = response.status().as_u16();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

impl Default for TestApi {
    fn default() -> Self {
        Self::new()
    }
}
