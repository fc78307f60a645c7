//! Credential domain routes.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use digest_engine::domains::credential;
use digest_store::Document;
use serde_json::json;

use crate::cache::CacheClass;
use crate::error::Problem;
use crate::hal::Hal;
use crate::handlers::storage::page_hal;
use crate::handlers::{
    block_href, cache_key, design_body, fetched, operation_href, page_class, parse_address_param,
    parse_token_param, respond_cached, AppState, PageParams,
};

/// `GET /credential/{contract}`: credential service design.
pub async fn handle_credential_service(
    State(state): State<AppState>,
    Path(contract): Path<String>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/credential/{contract}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = credential::credential_service(state.store.as_ref(), &ctx, &contract)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!("credential service by contract account {contract}"))
            })?;

        let (value, operations, height) = design_body(&doc);
        let hal = Hal::new(value, self_href)
            .add_link("block", block_href(height))
            .add_link_list("operations", operations.iter().map(|h| operation_href(h)));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

fn credential_hal(contract: &str, doc: &Document) -> Hal {
    let template = doc.str_field("template").unwrap_or_default();
    let credential_id = doc.str_field("credential_id").unwrap_or_default();
    let height = doc.u64_field("height").unwrap_or(0);
    let body = json!({
        "credential": doc.payload().cloned().unwrap_or(serde_json::Value::Null),
        "height": height,
    });
    Hal::new(
        body,
        format!("/credential/{contract}/template/{template}/credential/{credential_id}"),
    )
    .add_link("block", block_href(height))
    .add_link("template", format!("/credential/{contract}/template/{template}"))
}

/// `GET /credential/{contract}/template/{template_id}`
pub async fn handle_template(
    State(state): State<AppState>,
    Path((contract, template_id)): Path<(String, String)>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let template_id = match parse_token_param("template id", &template_id) {
        Ok(template_id) => template_id,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/credential/{contract}/template/{template_id}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = credential::template(state.store.as_ref(), &ctx, &contract, &template_id)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!("template {template_id} in contract {contract}"))
            })?;

        let height = doc.u64_field("height").unwrap_or(0);
        let hal = Hal::new(doc.into_value(), self_href)
            .add_link("block", block_href(height))
            .add_link("service", format!("/credential/{contract}"));
        fetched(&hal, CacheClass::Point)
    })
    .await
}

/// `GET /credential/{contract}/template/{template_id}/credentials`
pub async fn handle_credentials(
    State(state): State<AppState>,
    Path((contract, template_id)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let template_id = match parse_token_param("template id", &template_id) {
        Ok(template_id) => template_id,
        Err(problem) => return problem.into_response(),
    };
    let page = match params.validate(&state.config) {
        Ok(page) => page,
        Err(problem) => return problem.into_response(),
    };

    let base = format!("/credential/{contract}/template/{template_id}/credentials");
    let key = cache_key(&base, Some(&page));
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let rows = credential::credentials_by_template(
            state.store.as_ref(),
            &ctx,
            &contract,
            &template_id,
            page.offset,
            page.reverse,
            page.limit,
        )
        .await
        .map_err(Problem::from_store)?;
        if rows.is_empty() {
            return Err(Problem::not_found(format!(
                "credentials by template {template_id} in contract {contract}"
            )));
        }

        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|doc| credential_hal(&contract, doc).to_value())
            .collect();
        let hal = page_hal(&base, json!(items), &rows, &page)
            .add_link("service", format!("/credential/{contract}"));
        fetched(&hal, page_class(rows.len(), page.limit))
    })
    .await
}

/// `GET /credential/{contract}/template/{template_id}/credential/{credential_id}`
pub async fn handle_credential(
    State(state): State<AppState>,
    Path((contract, template_id, credential_id)): Path<(String, String, String)>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let template_id = match parse_token_param("template id", &template_id) {
        Ok(template_id) => template_id,
        Err(problem) => return problem.into_response(),
    };
    let credential_id = match parse_token_param("credential id", &credential_id) {
        Ok(credential_id) => credential_id,
        Err(problem) => return problem.into_response(),
    };

    let self_href =
        format!("/credential/{contract}/template/{template_id}/credential/{credential_id}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let doc = credential::credential(
            state.store.as_ref(),
            &ctx,
            &contract,
            &template_id,
            &credential_id,
        )
        .await
        .map_err(Problem::from_store)?
        .ok_or_else(|| {
            Problem::not_found(format!(
                "credential {credential_id} under template {template_id} in contract {contract}"
            ))
        })?;
        fetched(&credential_hal(&contract, &doc), CacheClass::Point)
    })
    .await
}

/// `GET /credential/{contract}/holder/{holder}`: the holder's DID plus its
/// current credentials.
pub async fn handle_holder(
    State(state): State<AppState>,
    Path((contract, holder)): Path<(String, String)>,
) -> Response {
    let contract = match parse_address_param("contract", &contract) {
        Ok(contract) => contract,
        Err(problem) => return problem.into_response(),
    };
    let holder = match parse_address_param("holder", &holder) {
        Ok(holder) => holder,
        Err(problem) => return problem.into_response(),
    };

    let self_href = format!("/credential/{contract}/holder/{holder}");
    let key = cache_key(&self_href, None);
    respond_cached(state.clone(), key, move || async move {
        let ctx = state.op_context();
        let holder_doc = credential::holder(state.store.as_ref(), &ctx, &contract, &holder)
            .await
            .map_err(Problem::from_store)?
            .ok_or_else(|| {
                Problem::not_found(format!("holder {holder} in contract {contract}"))
            })?;

        let max = state.config.limits.max_page_size;
        let rows =
            credential::credentials_by_holder(state.store.as_ref(), &ctx, &contract, &holder, max)
                .await
                .map_err(Problem::from_store)?;

        let credentials: Vec<serde_json::Value> = rows
            .iter()
            .map(|doc| credential_hal(&contract, doc).to_value())
            .collect();
        let body = json!({
            "holder": holder_doc.payload().cloned().unwrap_or(serde_json::Value::Null),
            "credentials": credentials,
        });
        let hal = Hal::new(body, self_href)
            .add_link("service", format!("/credential/{contract}"));
        fetched(&hal, CacheClass::Point)
    })
    .await
}
