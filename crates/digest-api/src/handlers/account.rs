//! Account, balance and currency design lookups.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use digest_engine::domains::currency;
use serde_json::json;

use crate::cache::CacheClass;
use crate::error::Problem;
use crate::hal::Hal;
use crate::handlers::{
    block_href, cache_key, fetched, parse_address_param, respond_cached, AppState,
};

/// `GET /account/{address}`
pub async fn handle_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    let address = match parse_address_param("address", &address) {
        Ok(address) => address,
        Err(problem) => return problem.into_response(),
    };

    let key = cache_key(&format!("/account/{address}"), None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let parsed = shared_types::Address::parse(&address)
            .map_err(|_| Problem::bad_request(format!("invalid address {address:?}")))?;
        let doc = currency::account_by_address(state.store.as_ref(), &ctx, &parsed)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| Problem::not_found(format!("account {address}")))?;

        let height = doc.u64_field("height").unwrap_or(0);
        let hal = Hal::new(doc.into_value(), format!("/account/{address}"))
            .add_link("block", block_href(height))
            .add_link("balance", format!("/account/{address}/balance"));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

/// `GET /account/{address}/balance`: latest balance per currency id.
pub async fn handle_account_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    let address = match parse_address_param("address", &address) {
        Ok(address) => address,
        Err(problem) => return problem.into_response(),
    };

    let key = cache_key(&format!("/account/{address}/balance"), None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let parsed = shared_types::Address::parse(&address)
            .map_err(|_| Problem::bad_request(format!("invalid address {address:?}")))?;
        let balances = currency::balances_by_address(state.store.as_ref(), &ctx, &parsed)
            .await
            .map_err(Problem::from_store)?;
        if balances.is_empty() {
            return Err(Problem::not_found(format!("balances for account {address}")));
        }

        let items: Vec<serde_json::Value> = balances
            .into_iter()
            .map(|doc| {
                json!({
                    "balance": doc.payload().cloned().unwrap_or(serde_json::Value::Null),
                    "height": doc.u64_field("height").unwrap_or(0),
                })
            })
            .collect();

        let hal = Hal::new(json!(items), format!("/account/{address}/balance"))
            .add_link("account", format!("/account/{address}"));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

/// `GET /currency/{currency_id}`
pub async fn handle_currency(
    State(state): State<AppState>,
    Path(currency_id): Path<String>,
) -> Response {
    if currency_id.is_empty()
        || currency_id.len() > 20
        || !currency_id.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Problem::bad_request(format!("invalid currency id {currency_id:?}"))
            .into_response();
    }

    let key = cache_key(&format!("/currency/{currency_id}"), None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = currency::currency_design(state.store.as_ref(), &ctx, &currency_id)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| Problem::not_found(format!("currency design {currency_id}")))?;

        let height = doc.u64_field("height").unwrap_or(0);
        let hal = Hal::new(doc.into_value(), format!("/currency/{currency_id}"))
            .add_link("block", block_href(height));
        fetched(&hal, CacheClass::Point)
    })
    .await
}
