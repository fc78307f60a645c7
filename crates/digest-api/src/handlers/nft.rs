//! NFT domain routes.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use digest_engine::domains::nft;
use digest_store::Document;
use serde_json::json;

use crate::cache::CacheClass;
use crate::error::Problem;
use crate::hal::Hal;
use crate::handlers::storage::page_hal;
use crate::handlers::{
    block_href, cache_key, design_body, fetched, operation_href, page_class, parse_address_param,
    respond_cached, AppState, PageParams,
};

/// `GET /nft/{contract}`: collection design.
pub async fn handle_nft_collection(
    State(state): State<AppState>,
    Path(contract): Path<String>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/nft/{contract}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = nft::nft_collection(state.store.as_ref(), &ctx, &contract)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!("nft collection by contract account {contract}"))
            })?;

        let (value, operations, height) = design_body(&doc);
        let hal = Hal::new(value, self_href)
            .add_link("block", block_href(height))
            .add_link_list("operations", operations.iter().map(|h| operation_href(h)));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

fn nft_hal(contract: &str, doc: &Document) -> Hal {
    let idx = doc.u64_field("nft_idx").unwrap_or(0);
    let height = doc.u64_field("height").unwrap_or(0);
    let body = json!({
        "nft": doc.payload().cloned().unwrap_or(serde_json::Value::Null),
        "height": height,
    });
    Hal::new(body, format!("/nft/{contract}/nftidx/{idx}"))
        .add_link("block", block_href(height))
        .add_link("collection", format!("/nft/{contract}"))
}

/// `GET /nft/{contract}/nftidx/{idx}`: current row for one token.
pub async fn handle_nft(
    State(state): State<AppState>,
    Path((contract, idx)): Path<(String, String)>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let idx = match idx.parse::<u64>() {
        Ok(idx) => idx,
        Err(_) => {
            return Problem::bad_request(format!("invalid nft idx {idx:?}")).into_response()
        }
    };

    let key = cache_key(&format!("/nft/{contract}/nftidx/{idx}"), None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = nft::nft(state.store.as_ref(), &ctx, &contract, idx)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!("nft idx {idx} in contract {contract}"))
            })?;
        fetched(&nft_hal(&contract, &doc), CacheClass::Point)
    })
    .await
}

/// `GET /nft/{contract}/nfts`
pub async fn handle_nfts(
    State(state): State<AppState>,
    Path(contract): Path<String>,
    Query(params): Query<PageParams>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let page = match params.validate(&state.config) {
        Ok(page) => page,
        Err(problem) => return problem.into_response(),
    };

    let base = format!("/nft/{contract}/nfts");
    let key = cache_key(&base, Some(&page));
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let rows = nft::nfts(
            state.store.as_ref(),
            &ctx,
            &contract,
            page.offset,
            page.reverse,
            page.limit,
        )
        .await
        .map_err(Problem::from_store)?;
        if rows.is_empty() {
            return Err(Problem::not_found(format!(
                "nfts by contract account {contract}"
            )));
        }

        let items: Vec<serde_json::Value> =
            rows.iter().map(|doc| nft_hal(&contract, doc).to_value()).collect();
        let hal = page_hal(&base, json!(items), &rows, &page)
            .add_link("collection", format!("/nft/{contract}"));
        fetched(&hal, page_class(rows.len(), page.limit))
    })
    .await
}

/// `GET /nft/{contract}/totalsupply`
pub async fn handle_nft_count(
    State(state): State<AppState>,
    Path(contract): Path<String>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/nft/{contract}/totalsupply");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let count = nft::nft_count(state.store.as_ref(), &ctx, &contract)
            .await
            .map_err(Problem::from_store)?;

        let hal = Hal::new(
            json!({"contract": contract, "total_supply": count}),
            self_href,
        )
        .add_link("collection", format!("/nft/{contract}"));
        fetched(&hal, CacheClass::PartialPage)
    })
    .await
}
