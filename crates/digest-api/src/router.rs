//! Route table.
//!
//! One route per resource type, each wrapped in its own rate-limit bucket
//! so throttling runs before the cache and coalescer.

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    account, block, credential, nft, prescription, resource, storage, timestamp, AppState,
};
use crate::middleware::RateLimitLayer;

/// Builds the read API router over the shared state.
pub fn build_router(state: AppState) -> Router {
    let limit = |state: &AppState| {
        RateLimitLayer::new(&state.config.rate_limit, Arc::clone(&state.metrics))
    };

    let mut router = Router::new();
    let routes: Vec<(&str, axum::routing::MethodRouter<AppState>)> = vec![
        ("/block/:height", get(block::handle_block)),
        ("/operation/:hash", get(block::handle_operation)),
        ("/account/:address", get(account::handle_account)),
        (
            "/account/:address/balance",
            get(account::handle_account_balance),
        ),
        ("/currency/:currency_id", get(account::handle_currency)),
        ("/storage/:contract", get(storage::handle_storage_design)),
        (
            "/storage/:contract/count",
            get(storage::handle_storage_data_count),
        ),
        (
            "/storage/:contract/datakey/:data_key",
            get(storage::handle_storage_data),
        ),
        (
            "/storage/:contract/datakey/:data_key/history",
            get(storage::handle_storage_data_history),
        ),
        (
            "/credential/:contract",
            get(credential::handle_credential_service),
        ),
        (
            "/credential/:contract/template/:template_id",
            get(credential::handle_template),
        ),
        (
            "/credential/:contract/template/:template_id/credentials",
            get(credential::handle_credentials),
        ),
        (
            "/credential/:contract/template/:template_id/credential/:credential_id",
            get(credential::handle_credential),
        ),
        (
            "/credential/:contract/holder/:holder",
            get(credential::handle_holder),
        ),
        ("/nft/:contract", get(nft::handle_nft_collection)),
        ("/nft/:contract/nftidx/:idx", get(nft::handle_nft)),
        ("/nft/:contract/nfts", get(nft::handle_nfts)),
        ("/nft/:contract/totalsupply", get(nft::handle_nft_count)),
        (
            "/timestamp/:contract",
            get(timestamp::handle_timestamp_design),
        ),
        (
            "/timestamp/:contract/project/:project_id/idx/:timestamp_idx",
            get(timestamp::handle_timestamp_item),
        ),
        (
            "/prescription/:contract",
            get(prescription::handle_prescription_design),
        ),
        (
            "/prescription/:contract/hash/:prescription_hash",
            get(prescription::handle_prescription_info),
        ),
        ("/resource", get(resource::handle_resource)),
        ("/metrics", get(resource::handle_metrics)),
    ];

    for (path, method_router) in routes {
        router = router.route(
            path,
            method_router.route_layer(limit(&state)),
        );
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
