//! Timestamp domain routes.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use digest_engine::domains::timestamp;
use serde_json::json;

use crate::cache::CacheClass;
use crate::error::Problem;
use crate::hal::Hal;
use crate::handlers::{
    block_href, cache_key, design_body, fetched, operation_href, parse_address_param,
    parse_token_param, respond_cached, AppState,
};

/// `GET /timestamp/{contract}`: service design.
pub async fn handle_timestamp_design(
    State(state): State<AppState>,
    Path(contract): Path<String>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/timestamp/{contract}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = timestamp::timestamp_design(state.store.as_ref(), &ctx, &contract)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!("timestamp design by contract account {contract}"))
            })?;

        let (value, operations, height) = design_body(&doc);
        let hal = Hal::new(value, self_href)
            .add_link("block", block_href(height))
            .add_link_list("operations", operations.iter().map(|h| operation_href(h)));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

/// `GET /timestamp/{contract}/project/{project_id}/idx/{timestamp_idx}`
pub async fn handle_timestamp_item(
    State(state): State<AppState>,
    Path((contract, project_id, idx)): Path<(String, String, String)>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let project_id = match parse_token_param("project id", &project_id) {
        Ok(project_id) => project_id,
        Err(problem) => return problem.into_response(),
    };
    let idx = match idx.parse::<u64>() {
        Ok(idx) => idx,
        Err(_) => {
            return Problem::bad_request(format!("invalid timestamp idx {idx:?}")).into_response()
        }
    };

    let self_href = format!("/timestamp/{contract}/project/{project_id}/idx/{idx}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc =
            timestamp::timestamp_item(state.store.as_ref(), &ctx, &contract, &project_id, idx)
                .await
                .map_err(Problem::from_store)?
                .ok_or_else(|| {
                    Problem::not_found(format!(
                        "timestamp item {idx} in project {project_id}, contract {contract}"
                    ))
                })?;

        let height = doc.u64_field("height").unwrap_or(0);
        let body = json!({
            "item": doc.payload().cloned().unwrap_or(serde_json::Value::Null),
            "height": height,
        });
        let hal = Hal::new(body, self_href)
            .add_link("block", block_href(height))
            .add_link("service", format!("/timestamp/{contract}"));
        fetched(&hal, CacheClass::Point)
    })
    .await
}
