//! Projection-side properties: atomicity, latest-wins, classifier purity
//! and pagination exhaustiveness at the store level.

use std::sync::Arc;

use digest_engine::domains::{storage as storage_domain, BlockRef, DomainHandler};
use digest_engine::{queries, COL_BLOCK, COL_OPERATION};
use digest_store::{Filter, MemoryStore, OpContext};
use shared_types::{Height, OperationFact};

use crate::fixtures::{
    addr, applied_operation, commit_block, hash, storage_data_state, storage_design_state,
};

fn registry() -> Arc<digest_engine::domains::DomainRegistry> {
    Arc::new(digest_engine::domains::DomainRegistry::standard())
}

#[tokio::test]
async fn test_atomicity_failed_commit_is_invisible() {
    let store = MemoryStore::new();
    let registry = registry();
    let op = applied_operation(
        9,
        OperationFact::Transfer {
            sender: addr("sender1"),
        },
    );
    let states = vec![
        storage_design_state("C1alpha", 100, hash(9)),
        storage_data_state("C1alpha", "profile", "v1", false, 100),
    ];

    // Fail partway through the transaction's writes.
    store.fail_after_writes(2);
    let err = commit_block(&store, &registry, 100, states, vec![op])
        .await
        .unwrap_err();
    assert!(!format!("{err}").is_empty());

    // No document for the height is visible to any query afterward.
    assert_eq!(store.collection_size(COL_BLOCK), 0);
    assert_eq!(store.collection_size(COL_OPERATION), 0);
    assert_eq!(store.collection_size(storage_domain::COL_STORAGE), 0);
    assert_eq!(store.collection_size(storage_domain::COL_STORAGE_DATA), 0);

    let ctx = OpContext::background();
    let design = storage_domain::storage_design(&store, &ctx, "C1alpha")
        .await
        .unwrap();
    assert!(design.is_none());
}

#[tokio::test]
async fn test_latest_wins_and_history_order() {
    let store = MemoryStore::new();
    let registry = registry();
    let ctx = OpContext::background();

    for (height, value) in [(1u64, "v1"), (2u64, "v2")] {
        commit_block(
            &store,
            &registry,
            height,
            vec![storage_data_state("C1alpha", "profile", value, false, height)],
            vec![],
        )
        .await
        .unwrap();
    }

    // Current value is the higher height.
    let current = storage_domain::storage_data(&store, &ctx, "C1alpha", "profile")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.height(), Some(Height::new(2)));
    assert_eq!(
        current.payload().and_then(|p| p.get("value")).and_then(|v| v.as_str()),
        Some("v2")
    );

    // Forward history returns h1 then h2.
    let rows = storage_domain::storage_data_history(
        &store, &ctx, "C1alpha", "profile", None, false, 10,
    )
    .await
    .unwrap();
    let heights: Vec<u64> = rows.iter().filter_map(|d| d.u64_field("height")).collect();
    assert_eq!(heights, vec![1, 2]);
}

#[tokio::test]
async fn test_classifier_is_pure() {
    let handler = storage_domain::StorageHandler;
    let now = chrono::Utc::now();
    let state = storage_data_state("C1alpha", "profile", "v1", false, 5);
    let block = BlockRef {
        height: Height::new(5),
        proposed_at: &now,
    };

    let first = handler.project(&state, &block).unwrap();
    let second = handler.project(&state, &block).unwrap();
    assert_eq!(first.inserts.len(), second.inserts.len());
    assert_eq!(first.inserts[0].document, second.inserts[0].document);
}

#[tokio::test]
async fn test_key_tokens_round_trip_into_document() {
    let state = storage_data_state("C1alpha", "profile", "v1", false, 5);
    let doc = {
        let now = chrono::Utc::now();
        storage_domain::data_doc(
            &state,
            &BlockRef {
                height: Height::new(5),
                proposed_at: &now,
            },
        )
        .unwrap()
    };
    assert_eq!(doc.str_field("contract"), Some("C1alpha"));
    assert_eq!(doc.str_field("data_key"), Some("profile"));
}

#[tokio::test]
async fn test_pagination_walks_history_exhaustively() {
    let store = MemoryStore::new();
    let registry = registry();
    let ctx = OpContext::background();

    for height in 1..=7u64 {
        commit_block(
            &store,
            &registry,
            height,
            vec![storage_data_state(
                "C1alpha",
                "profile",
                &format!("v{height}"),
                false,
                height,
            )],
            vec![],
        )
        .await
        .unwrap();
    }

    // Walk forward with limit 2, offset = last returned height, until a
    // page comes back under-full.
    let mut seen = Vec::new();
    let mut offset = None;
    loop {
        let rows = storage_domain::storage_data_history(
            &store, &ctx, "C1alpha", "profile", offset, false, 2,
        )
        .await
        .unwrap();
        for row in &rows {
            seen.push(row.u64_field("height").unwrap());
        }
        if rows.len() < 2 {
            break;
        }
        offset = rows.last().and_then(|d| d.u64_field("height"));
    }

    assert_eq!(seen, (1..=7).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_latest_query_helper_ignores_other_contracts() {
    let store = MemoryStore::new();
    let registry = registry();
    let ctx = OpContext::background();

    commit_block(
        &store,
        &registry,
        1,
        vec![
            storage_design_state("C1alpha", 1, hash(9)),
            storage_design_state("C2beta", 1, hash(9)),
        ],
        vec![],
    )
    .await
    .unwrap();

    let doc = queries::latest(
        &store,
        &ctx,
        storage_domain::COL_STORAGE,
        Filter::new().eq("contract", "C2beta"),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(doc.str_field("contract"), Some("C2beta"));
}
