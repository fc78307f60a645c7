//! Per-route rate limiting using a token bucket.
//!
//! One layer instance is attached per route, so each route owns its own
//! bucket. Limiting runs before the cache and coalescer; excess requests
//! are rejected immediately with a problem document and `Retry-After`
//! rather than queued.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service};
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::error::Problem;
use crate::metrics::DigestMetrics;

struct RouteBucket {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    metrics: Arc<DigestMetrics>,
}

impl RouteBucket {
    fn new(config: &RateLimitConfig, metrics: Arc<DigestMetrics>) -> Self {
        let limiter = if config.enabled {
            let rps = NonZeroU32::new(config.requests_per_second)
                .unwrap_or(NonZeroU32::new(1000).expect("nonzero"));
            let burst = NonZeroU32::new(config.burst_size)
                .unwrap_or(NonZeroU32::new(1000).expect("nonzero"));
            Some(RateLimiter::direct(Quota::per_second(rps).allow_burst(burst)))
        } else {
            None
        };
        Self { limiter, metrics }
    }

    /// Allows the request or returns the wait until the next permit.
    fn check(&self) -> Result<(), Duration> {
        match &self.limiter {
            None => Ok(()),
            Some(limiter) => match limiter.check() {
                Ok(_) => Ok(()),
                Err(not_until) => {
                    let wait = not_until.wait_time_from(governor::clock::Clock::now(
                        &governor::clock::DefaultClock::default(),
                    ));
                    Err(wait)
                }
            },
        }
    }
}

/// Route-scoped rate limit layer.
#[derive(Clone)]
pub struct RateLimitLayer {
    bucket: Arc<RouteBucket>,
}

impl RateLimitLayer {
    pub fn new(config: &RateLimitConfig, metrics: Arc<DigestMetrics>) -> Self {
        Self {
            bucket: Arc::new(RouteBucket::new(config, metrics)),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            bucket: Arc::clone(&self.bucket),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    bucket: Arc<RouteBucket>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let bucket = Arc::clone(&self.bucket);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match bucket.check() {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => {
                    let retry_ms = retry_after.as_millis() as u64;
                    bucket.metrics.record_rate_limit_rejection();
                    warn!(
                        path = %req.uri().path(),
                        retry_after_ms = retry_ms,
                        "rate limit exceeded"
                    );
                    Ok(rate_limit_response(retry_ms))
                }
            }
        })
    }
}

fn rate_limit_response(retry_after_ms: u64) -> Response {
    let problem = Problem::rate_limited(retry_after_ms);
    let body = serde_json::to_vec(&problem).unwrap_or_default();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        crate::error::PROBLEM_CONTENT_TYPE
            .parse()
            .expect("static header value"),
    );
    if let Ok(value) = retry_after_ms.div_ceil(1000).to_string().parse() {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(rps: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst_size: burst,
        }
    }

    #[test]
    fn test_allows_within_burst() {
        let bucket = RouteBucket::new(&test_config(10, 20), Arc::new(DigestMetrics::new()));
        for _ in 0..10 {
            assert!(bucket.check().is_ok());
        }
    }

    #[test]
    fn test_blocks_over_burst() {
        let bucket = RouteBucket::new(&test_config(1, 2), Arc::new(DigestMetrics::new()));
        let _ = bucket.check();
        let _ = bucket.check();
        assert!(bucket.check().is_err());
    }

    #[test]
    fn test_disabled_always_allows() {
        let config = RateLimitConfig {
            enabled: false,
            requests_per_second: 1,
            burst_size: 1,
        };
        let bucket = RouteBucket::new(&config, Arc::new(DigestMetrics::new()));
        for _ in 0..100 {
            assert!(bucket.check().is_ok());
        }
    }
}
