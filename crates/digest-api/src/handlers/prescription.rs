//! Prescription domain routes.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use digest_engine::domains::prescription;
use serde_json::json;

use crate::cache::CacheClass;
use crate::error::Problem;
use crate::hal::Hal;
use crate::handlers::{
    block_href, cache_key, design_body, fetched, operation_href, parse_address_param,
    parse_token_param, respond_cached, AppState,
};

/// `GET /prescription/{contract}`: registry design.
pub async fn handle_prescription_design(
    State(state): State<AppState>,
    Path(contract): Path<String>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/prescription/{contract}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = prescription::prescription_design(state.store.as_ref(), &ctx, &contract)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!(
                    "prescription design by contract account {contract}"
                ))
            })?;

        let (value, operations, height) = design_body(&doc);
        let hal = Hal::new(value, self_href)
            .add_link("block", block_href(height))
            .add_link_list("operations", operations.iter().map(|h| operation_href(h)));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

/// `GET /prescription/{contract}/hash/{prescription_hash}`
pub async fn handle_prescription_info(
    State(state): State<AppState>,
    Path((contract, prescription_hash)): Path<(String, String)>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let prescription_hash = match parse_token_param("prescription hash", &prescription_hash) {
        Ok(prescription_hash) => prescription_hash,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/prescription/{contract}/hash/{prescription_hash}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = prescription::prescription_info(
            state.store.as_ref(),
            &ctx,
            &contract,
            &prescription_hash,
        )
        .await
        .map_err(Problem::from_store)?
        .ok_or_else(|| {
            Problem::not_found(format!(
                "prescription info {prescription_hash} in contract {contract}"
            ))
        })?;

        let height = doc.u64_field("height").unwrap_or(0);
        let body = json!({
            "prescription": doc.payload().cloned().unwrap_or(serde_json::Value::Null),
            "height": height,
        });
        let hal = Hal::new(body, self_href)
            .add_link("block", block_href(height))
            .add_link("service", format!("/prescription/{contract}"));
        fetched(&hal, CacheClass::Point)
    })
    .await
}
