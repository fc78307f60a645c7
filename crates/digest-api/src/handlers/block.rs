//! Block manifest and operation lookups.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use digest_engine::block;
use shared_types::Hash;

use crate::cache::CacheClass;
use crate::error::Problem;
use crate::hal::Hal;
use crate::handlers::{block_href, cache_key, fetched, respond_cached, AppState};

/// `GET /block/{height}`
pub async fn handle_block(State(state): State<AppState>, Path(height): Path<String>) -> Response {
    let height = match height.parse::<u64>() {
        Ok(height) => height,
        Err(_) => {
            return Problem::bad_request(format!("invalid height {height:?}")).into_response()
        }
    };

    let key = cache_key(&block_href(height), None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = block::block_by_height(state.store.as_ref(), &ctx, height.into())
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| Problem::not_found(format!("block by height {height}")))?;

        let mut hal = Hal::new(doc.into_value(), block_href(height));
        if height > 0 {
            hal = hal.add_link("prev", block_href(height - 1));
        }
        hal = hal.add_link("next", block_href(height + 1));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

/// `GET /operation/{hash}`
pub async fn handle_operation(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    let fact_hash = match Hash::from_hex(&hash) {
        Ok(hash) => hash,
        Err(_) => {
            return Problem::bad_request(format!("invalid operation hash {hash:?}")).into_response()
        }
    };

    let key = cache_key(&format!("/operation/{}", fact_hash.to_hex()), None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = block::operation_by_fact_hash(state.store.as_ref(), &ctx, &fact_hash)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| Problem::not_found(format!("operation {}", fact_hash.to_hex())))?;

        let height = doc.u64_field("height").unwrap_or(0);
        let hal = Hal::new(
            doc.into_value(),
            format!("/operation/{}", fact_hash.to_hex()),
        )
        .add_link("block", block_href(height));
        fetched(&hal, CacheClass::Point)
    })
    .await
}
