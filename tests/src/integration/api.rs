//! Read API integration: the end-to-end projection scenario, problem
//! documents, caching and pagination over HTTP.

use std::sync::atomic::Ordering;

use shared_types::OperationFact;

use crate::fixtures::{
    addr, applied_operation, commit_block, hash, storage_data_state, storage_design_state, TestApi,
};

#[tokio::test]
async fn test_storage_design_scenario_at_height_100() {
    let api = TestApi::new();
    let (record, node) = applied_operation(
        0x42,
        OperationFact::RegisterModel {
            sender: addr("sender1"),
            contract: addr("C1"),
        },
    );
    let op_hash = record.fact_hash;

    commit_block(
        &api.store,
        &api.registry,
        100,
        vec![storage_design_state("C1", 100, op_hash)],
        vec![(record, node)],
    )
    .await
    .unwrap();

    let (status, body) = api.get("/storage/C1").await;
    assert_eq!(status, 200);

    // Design payload comes back with a block link to height 100 and the
    // contributing operation hash linked.
    assert_eq!(body["_embedded"]["creator"], "creator1");
    assert_eq!(body["_links"]["block"]["href"], "/block/100");
    let operations = body["_links"]["operations"].as_array().unwrap();
    assert_eq!(operations.len(), 1);
    assert_eq!(
        operations[0]["href"],
        format!("/operation/{}", op_hash.to_hex())
    );

    // The linked resources resolve.
    let (status, block_body) = api.get("/block/100").await;
    assert_eq!(status, 200);
    assert_eq!(block_body["_embedded"]["height"], 100);

    let (status, op_body) = api
        .get(&format!("/operation/{}", op_hash.to_hex()))
        .await;
    assert_eq!(status, 200);
    assert_eq!(op_body["_embedded"]["in_state"], true);
    assert_eq!(op_body["_links"]["block"]["href"], "/block/100");
}

#[tokio::test]
async fn test_not_found_is_problem_document() {
    let api = TestApi::new();
    let (status, body) = api.get("/storage/C9zz").await;
    assert_eq!(status, 404);
    assert_eq!(body["status"], 404);
    assert_eq!(body["title"], "not found");
}

#[tokio::test]
async fn test_malformed_parameters_are_400_without_store_access() {
    let api = TestApi::new();

    let (status, body) = api.get("/block/notanumber").await;
    assert_eq!(status, 400);
    assert_eq!(body["title"], "bad request");

    let (status, _) = api.get("/operation/nothex").await;
    assert_eq!(status, 400);

    let (status, _) = api
        .get("/storage/C1alpha/datakey/profile/history?offset=wat")
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_repeat_lookup_is_served_from_cache() {
    let api = TestApi::new();
    commit_block(
        &api.store,
        &api.registry,
        3,
        vec![storage_design_state("C1alpha", 3, hash(9))],
        vec![],
    )
    .await
    .unwrap();

    let (status_first, body_first) = api.get("/storage/C1alpha").await;
    let hits_before = api.state.metrics.cache_hits.load(Ordering::Relaxed);
    let (status_second, body_second) = api.get("/storage/C1alpha").await;
    let hits_after = api.state.metrics.cache_hits.load(Ordering::Relaxed);

    assert_eq!(status_first, 200);
    assert_eq!(status_second, 200);
    assert_eq!(body_first, body_second);
    assert_eq!(hits_after, hits_before + 1);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let api = TestApi::new();

    let (status, _) = api.get("/storage/C1alpha").await;
    assert_eq!(status, 404);

    // The key becomes visible after a later commit; a cached 404 would
    // shadow it.
    commit_block(
        &api.store,
        &api.registry,
        5,
        vec![storage_design_state("C1alpha", 5, hash(9))],
        vec![],
    )
    .await
    .unwrap();

    let (status, body) = api.get("/storage/C1alpha").await;
    assert_eq!(status, 200);
    assert_eq!(body["_links"]["block"]["href"], "/block/5");
}

#[tokio::test]
async fn test_history_pagination_over_http() {
    let api = TestApi::new();
    for height in 1..=5u64 {
        commit_block(
            &api.store,
            &api.registry,
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

    let mut seen = Vec::new();
    let mut path = "/storage/C1alpha/datakey/profile/history?limit=2".to_string();
    loop {
        let (status, body) = api.get(&path).await;
        assert_eq!(status, 200);
        let items = body["_embedded"].as_array().unwrap().clone();
        for item in &items {
            seen.push(item["_embedded"]["height"].as_u64().unwrap());
        }
        if items.len() < 2 {
            break;
        }
        let next = body["_links"]["next"]["href"].as_str().unwrap().to_string();
        path = format!("{next}&limit=2");
    }

    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_deleted_filter_on_count_route() {
    let api = TestApi::new();
    commit_block(
        &api.store,
        &api.registry,
        1,
        vec![
            storage_data_state("C1alpha", "keep", "v1", false, 1),
            storage_data_state("C1alpha", "gone", "v1", false, 1),
        ],
        vec![],
    )
    .await
    .unwrap();
    commit_block(
        &api.store,
        &api.registry,
        2,
        vec![storage_data_state("C1alpha", "gone", "v1", true, 2)],
        vec![],
    )
    .await
    .unwrap();

    let (status, body) = api.get("/storage/C1alpha/count").await;
    assert_eq!(status, 200);
    assert_eq!(body["_embedded"]["data_count"], 1);

    let (status, body) = api.get("/storage/C1alpha/count?deleted=true").await;
    assert_eq!(status, 200);
    assert_eq!(body["_embedded"]["data_count"], 2);
}

#[tokio::test]
async fn test_resource_and_metrics_surfaces() {
    let api = TestApi::new();

    let (status, body) = api.get("/resource").await;
    assert_eq!(status, 200);
    assert!(body["_embedded"]["memory"]["resident_bytes"].is_u64());
    assert_eq!(body["_links"]["metrics"]["href"], "/metrics");

    let (status, _) = api.get("/metrics").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_nft_ownership_compaction_visible_over_http() {
    use serde_json::json;
    use shared_types::{Height, State, StateKey};

    fn nft_state(contract: &str, idx: u64, owner: &str, height: u64) -> State {
        State {
            key: StateKey::new(format!("nft:{contract}:{idx}:nft")),
            height: Height::new(height),
            value: json!({
                "nft_idx": idx,
                "owner": owner,
                "uri": "ipfs://x",
                "approved": null,
            }),
            operations: vec![hash(0x21)],
        }
    }

    let api = TestApi::new();
    commit_block(
        &api.store,
        &api.registry,
        1,
        vec![nft_state("C1alpha", 0, "owner01", 1)],
        vec![],
    )
    .await
    .unwrap();
    commit_block(
        &api.store,
        &api.registry,
        2,
        vec![nft_state("C1alpha", 0, "owner02", 2)],
        vec![],
    )
    .await
    .unwrap();

    let (status, body) = api.get("/nft/C1alpha/nftidx/0").await;
    assert_eq!(status, 200);
    assert_eq!(body["_embedded"]["nft"]["owner"], "owner02");
    assert_eq!(body["_links"]["block"]["href"], "/block/2");

    let (status, body) = api.get("/nft/C1alpha/totalsupply").await;
    assert_eq!(status, 200);
    assert_eq!(body["_embedded"]["total_supply"], 1);
}
