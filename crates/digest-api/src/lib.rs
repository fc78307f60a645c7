//! Cached, deduplicated HTTP read API over the projected document store.
//!
//! This crate never talks to a `BlockSession`; it queries the store through
//! the per-domain read functions in `digest-engine`. The request path is:
//!
//! ```text
//! request ─▶ rate limit (per route) ─▶ cache ─▶ coalescer ─▶ store query
//!                                        ▲                       │
//!                                        └── TTL write-back ─────┘
//! ```
//!
//! Responses are hypermedia envelopes; failures are problem documents with
//! distinct statuses (400 / 404 / 429 / 5xx).

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod hal;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod server;

pub use cache::{CacheClass, ResponseCache};
pub use coalesce::{Fetched, SingleFlight};
pub use config::ApiConfig;
pub use error::{ApiResult, Problem};
pub use hal::{Hal, HalLink};
pub use handlers::AppState;
pub use metrics::DigestMetrics;
pub use router::build_router;
pub use server::{init_tracing, provision_indexes, serve, ServerError};
