//! HTTP handlers.
//!
//! Every lookup handler follows the same shape: validate path/query input
//! (400 before any store access), check the response cache, coalesce
//! concurrent identical fetches, query the store, wrap the result in a
//! hypermedia envelope, and cache successful responses under a TTL chosen
//! by response class.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use digest_store::{DocumentStore, OpContext};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;

use crate::cache::{CacheClass, ResponseCache};
use crate::coalesce::{Fetched, SingleFlight};
use crate::config::ApiConfig;
use crate::error::Problem;
use crate::hal::{Hal, HAL_CONTENT_TYPE};
use crate::metrics::DigestMetrics;

pub mod account;
pub mod block;
pub mod credential;
pub mod nft;
pub mod prescription;
pub mod resource;
pub mod storage;
pub mod timestamp;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<ResponseCache>,
    pub flights: Arc<SingleFlight>,
    pub metrics: Arc<DigestMetrics>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: ApiConfig) -> Self {
        Self {
            store,
            cache: Arc::new(ResponseCache::new()),
            flights: Arc::new(SingleFlight::new()),
            metrics: Arc::new(DigestMetrics::new()),
            config: Arc::new(config),
        }
    }

    /// Store-call context carrying the configured request deadline.
    pub fn op_context(&self) -> OpContext {
        OpContext::with_timeout(self.config.request_timeout())
    }
}

/// Pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub reverse: Option<String>,
}

/// Validated pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: Option<u64>,
    pub reverse: bool,
}

impl PageParams {
    /// Parses and bounds the pagination parameters; malformed values are a
    /// 400 before any store access.
    pub fn validate(&self, config: &ApiConfig) -> Result<Page, Problem> {
        let limit = match &self.limit {
            None => config.limits.default_page_size,
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or_else(|| Problem::bad_request(format!("invalid limit {raw:?}")))?,
        };
        let offset = match &self.offset {
            None => None,
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| Problem::bad_request(format!("invalid offset {raw:?}")))?,
            ),
        };
        let reverse = match self.reverse.as_deref() {
            None | Some("") | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(raw) => return Err(Problem::bad_request(format!("invalid reverse {raw:?}"))),
        };
        Ok(Page {
            limit: limit.min(config.limits.max_page_size),
            offset,
            reverse,
        })
    }
}

/// Validates an address-shaped path parameter.
pub fn parse_address_param(name: &str, raw: &str) -> Result<String, Problem> {
    if shared_types::is_valid_address(raw) {
        Ok(raw.to_string())
    } else {
        Err(Problem::bad_request(format!("invalid {name} {raw:?}")))
    }
}

/// Cache key: path plus normalized query parameters in fixed order.
pub fn cache_key(path: &str, page: Option<&Page>) -> String {
    match page {
        None => path.to_string(),
        Some(page) => {
            let offset = page
                .offset
                .map(|o| o.to_string())
                .unwrap_or_default();
            format!(
                "{path}?limit={}&offset={offset}&reverse={}",
                page.limit, page.reverse
            )
        }
    }
}

/// Validates a free-form sub-key path parameter (data keys, template ids,
/// project ids, hashes). Colons are rejected because they would collide
/// with the state-key grammar.
pub fn parse_token_param(name: &str, raw: &str) -> Result<String, Problem> {
    if raw.is_empty() || raw.len() > 256 || raw.contains(':') {
        return Err(Problem::bad_request(format!("invalid {name} {raw:?}")));
    }
    Ok(raw.to_string())
}

/// Splits a design document's payload (the projected state) into the domain
/// value, the contributing operation hashes and the height.
pub fn design_body(doc: &digest_store::Document) -> (serde_json::Value, Vec<String>, u64) {
    let payload = doc.payload().cloned().unwrap_or(serde_json::Value::Null);
    let value = payload
        .get("value")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let operations = payload
        .get("operations")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let height = doc.u64_field("height").unwrap_or(0);
    (value, operations, height)
}

pub fn block_href(height: u64) -> String {
    format!("/block/{height}")
}

pub fn operation_href(fact_hash: &str) -> String {
    format!("/operation/{fact_hash}")
}

fn hal_response(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, HAL_CONTENT_TYPE)], body).into_response()
}

/// Serializes an envelope into a cacheable fetch result.
pub fn fetched(hal: &Hal, class: CacheClass) -> Result<Fetched, Problem> {
    let body = serde_json::to_vec(hal)
        .map_err(|e| Problem::internal(format!("response encoding failed: {e}")))?;
    Ok(Fetched {
        body: Bytes::from(body),
        class,
    })
}

/// The common read path: cache lookup, coalesced fetch, TTL write-back.
///
/// Only the flight leader stores the response; errors are returned as
/// problem documents and never cached. Takes its own state handle so the
/// caller can move the original into the fetch closure.
pub async fn respond_cached<F, Fut>(state: AppState, key: String, fetch: F) -> Response
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Fetched, Problem>> + Send + 'static,
{
    if let Some(body) = state.cache.get(&key) {
        state.metrics.record_cache_hit();
        state.metrics.record_request(true);
        return hal_response(body);
    }
    state.metrics.record_cache_miss();

    let (result, shared) = state.flights.run(&key, fetch).await;
    match result {
        Ok(response) => {
            if shared {
                state.metrics.record_coalesced();
            } else {
                let ttl = state.config.cache.ttl_for(response.class);
                state.cache.put(&key, response.body.clone(), ttl);
            }
            state.metrics.record_request(true);
            hal_response(response.body)
        }
        Err(problem) => {
            state.metrics.record_request(false);
            problem.into_response()
        }
    }
}

/// TTL class for a page of `len` items fetched with `limit`.
pub fn page_class(len: usize, limit: u64) -> CacheClass {
    if len as u64 == limit {
        CacheClass::FullPage
    } else {
        CacheClass::PartialPage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_validation_bounds_limit() {
        let config = ApiConfig::default();
        let params = PageParams {
            limit: Some("999999".into()),
            offset: None,
            reverse: None,
        };
        let page = params.validate(&config).unwrap();
        assert_eq!(page.limit, config.limits.max_page_size);
    }

    #[test]
    fn test_bad_offset_is_400() {
        let config = ApiConfig::default();
        let params = PageParams {
            limit: None,
            offset: Some("abc".into()),
            reverse: None,
        };
        assert_eq!(params.validate(&config).unwrap_err().status, 400);
    }

    #[test]
    fn test_bad_reverse_is_400() {
        let config = ApiConfig::default();
        let params = PageParams {
            limit: None,
            offset: None,
            reverse: Some("maybe".into()),
        };
        assert_eq!(params.validate(&config).unwrap_err().status, 400);
    }

    #[test]
    fn test_cache_key_is_normalized() {
        let page = Page {
            limit: 10,
            offset: Some(5),
            reverse: true,
        };
        assert_eq!(
            cache_key("/storage/C1alpha", Some(&page)),
            "/storage/C1alpha?limit=10&offset=5&reverse=true"
        );
        assert_eq!(cache_key("/storage/C1alpha", None), "/storage/C1alpha");
    }

    #[test]
    fn test_address_param_validation() {
        assert!(parse_address_param("contract", "C1alpha").is_ok());
        assert_eq!(
            parse_address_param("contract", "no good").unwrap_err().status,
            400
        );
    }
}
