//! Storage domain routes.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use digest_engine::domains::storage;
use digest_store::Document;
use serde::Deserialize;
use serde_json::json;

use crate::cache::CacheClass;
use crate::error::Problem;
use crate::hal::{add_query, Hal};
use crate::handlers::{
    block_href, cache_key, design_body, fetched, operation_href, page_class, parse_address_param,
    parse_token_param, respond_cached, AppState, Page, PageParams,
};

/// `GET /storage/{contract}`: latest storage design.
pub async fn handle_storage_design(
    State(state): State<AppState>,
    Path(contract): Path<String>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/storage/{contract}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = storage::storage_design(state.store.as_ref(), &ctx, &contract)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!("storage design by contract account {contract}"))
            })?;

        let (value, operations, height) = design_body(&doc);
        let hal = Hal::new(value, self_href)
            .add_link("block", block_href(height))
            .add_link_list("operations", operations.iter().map(|h| operation_href(h)));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

/// Builds the per-row envelope shared by the point and history routes.
fn data_hal(contract: &str, doc: &Document) -> Hal {
    let data_key = doc.str_field("data_key").unwrap_or_default().to_string();
    let height = doc.u64_field("height").unwrap_or(0);
    let operation = doc.str_field("operation").unwrap_or_default().to_string();
    let body = json!({
        "data": doc.payload().cloned().unwrap_or(serde_json::Value::Null),
        "height": height,
        "operation": operation,
        "timestamp": doc.str_field("timestamp").unwrap_or_default(),
    });
    Hal::new(body, format!("/storage/{contract}/datakey/{data_key}"))
        .add_link("block", block_href(height))
        .add_link("operation", operation_href(&operation))
}

/// `GET /storage/{contract}/datakey/{data_key}`: latest data row.
pub async fn handle_storage_data(
    State(state): State<AppState>,
    Path((contract, data_key)): Path<(String, String)>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let data_key = match parse_token_param("data key", &data_key) {
        Ok(data_key) => data_key,
        Err(problem) => return problem.into_response(),
    };

    let key = cache_key(&format!("/storage/{contract}/datakey/{data_key}"), None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = storage::storage_data(state.store.as_ref(), &ctx, &contract, &data_key)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!(
                    "storage data for key {data_key} in contract account {contract}"
                ))
            })?;
        fetched(&data_hal(&contract, &doc), CacheClass::Point)
    })
    .await
}

/// `GET /storage/{contract}/datakey/{data_key}/history`
pub async fn handle_storage_data_history(
    State(state): State<AppState>,
    Path((contract, data_key)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let data_key = match parse_token_param("data key", &data_key) {
        Ok(data_key) => data_key,
        Err(problem) => return problem.into_response(),
    };
    let page = match params.validate(&state.config) {
        Ok(page) => page,
        Err(problem) => return problem.into_response(),
    };

    let base = format!("/storage/{contract}/datakey/{data_key}/history");
    let key = cache_key(&base, Some(&page));
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let rows = storage::storage_data_history(
            state.store.as_ref(),
            &ctx,
            &contract,
            &data_key,
            page.offset,
            page.reverse,
            page.limit,
        )
        .await
        .map_err(Problem::from_store)?;
        if rows.is_empty() {
            return Err(Problem::not_found(format!(
                "data history by contract {contract}, data key {data_key}"
            )));
        }

        let items: Vec<serde_json::Value> =
            rows.iter().map(|doc| data_hal(&contract, doc).to_value()).collect();
        let hal = page_hal(&base, json!(items), &rows, &page)
            .add_link("service", format!("/storage/{contract}"));
        fetched(&hal, page_class(rows.len(), page.limit))
    })
    .await
}

/// Deleted-filter query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct CountParams {
    pub deleted: Option<String>,
}

/// `GET /storage/{contract}/count`: live (or total) data keys.
pub async fn handle_storage_data_count(
    State(state): State<AppState>,
    Path(contract): Path<String>,
    Query(params): Query<CountParams>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let include_deleted = match params.deleted.as_deref() {
        None | Some("") | Some("false") | Some("0") => false,
        Some("true") | Some("1") => true,
        Some(raw) => {
            return Problem::bad_request(format!("invalid deleted {raw:?}")).into_response()
        }
    };

    let self_href = format!("/storage/{contract}/count");
    let key = cache_key(
        &format!("{self_href}?deleted={include_deleted}"),
        None,
    );
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let count =
            storage::storage_data_count(state.store.as_ref(), &ctx, &contract, include_deleted)
                .await
                .map_err(Problem::from_store)?;

        let hal = Hal::new(
            json!({"contract": contract, "data_count": count}),
            self_href,
        )
        .add_link("service", format!("/storage/{contract}"));
        fetched(&hal, CacheClass::PartialPage)
    })
    .await
}

/// Shared pagination links: `self` with its query string, `next` continuing
/// from the last row's height, and `reverse` flipping direction.
pub(crate) fn page_hal(base: &str, items: serde_json::Value, rows: &[Document], page: &Page) -> Hal {
    let mut self_href = base.to_string();
    if let Some(offset) = page.offset {
        self_href = add_query(&self_href, "offset", &offset.to_string());
    }
    if page.reverse {
        self_href = add_query(&self_href, "reverse", "true");
    }

    let mut hal = Hal::new(items, self_href);

    if let Some(last) = rows.last().and_then(|doc| doc.u64_field("height")) {
        let mut next = add_query(base, "offset", &last.to_string());
        if page.reverse {
            next = add_query(&next, "reverse", "true");
        }
        hal = hal.add_link("next", next);
    }

    let reverse_href = add_query(base, "reverse", &(!page.reverse).to_string());
    hal.add_link("reverse", reverse_href)
}
