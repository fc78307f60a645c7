//! Runtime resource counters.
//!
//! Exposed on two read-only surfaces: `/resource` as a hypermedia JSON
//! document and `/metrics` as plain-text exposition compatible with
//! pull-based scrapers.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// API-side counters plus process memory figures.
pub struct DigestMetrics {
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,
    pub rate_limit_rejected: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub coalesced_requests: AtomicU64,
    started: Instant,
}

impl Default for DigestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Process memory snapshot in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub virtual_bytes: u64,
    pub resident_bytes: u64,
}

impl DigestMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_success: AtomicU64::new(0),
            requests_error: AtomicU64::new(0),
            rate_limit_rejected: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Export as JSON for the `/resource` document.
    pub fn to_json(&self, build_info: &str) -> Value {
        let memory = read_memory_stats();
        json!({
            "build_info": build_info,
            "uptime_seconds": self.uptime_seconds(),
            "memory": {
                "virtual_bytes": memory.virtual_bytes,
                "resident_bytes": memory.resident_bytes,
            },
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "error": self.requests_error.load(Ordering::Relaxed),
            },
            "rate_limiting": {
                "rejected": self.rate_limit_rejected.load(Ordering::Relaxed),
            },
            "cache": {
                "hits": self.cache_hits.load(Ordering::Relaxed),
                "misses": self.cache_misses.load(Ordering::Relaxed),
                "coalesced": self.coalesced_requests.load(Ordering::Relaxed),
            },
        })
    }

    /// Export in plain-text exposition format.
    pub fn to_exposition(&self) -> String {
        let memory = read_memory_stats();
        let mut output = String::new();

        let mut counter = |name: &str, help: &str, value: u64| {
            output.push_str(&format!(
                "# HELP digest_{name} {help}\n# TYPE digest_{name} counter\ndigest_{name} {value}\n"
            ));
        };

        counter(
            "requests_total",
            "Total read API requests",
            self.requests_total.load(Ordering::Relaxed),
        );
        counter(
            "requests_success_total",
            "Successful requests",
            self.requests_success.load(Ordering::Relaxed),
        );
        counter(
            "requests_error_total",
            "Failed requests",
            self.requests_error.load(Ordering::Relaxed),
        );
        counter(
            "rate_limit_rejected_total",
            "Rate limited requests",
            self.rate_limit_rejected.load(Ordering::Relaxed),
        );
        counter(
            "cache_hits_total",
            "Response cache hits",
            self.cache_hits.load(Ordering::Relaxed),
        );
        counter(
            "cache_misses_total",
            "Response cache misses",
            self.cache_misses.load(Ordering::Relaxed),
        );
        counter(
            "coalesced_requests_total",
            "Requests served by a shared in-flight fetch",
            self.coalesced_requests.load(Ordering::Relaxed),
        );

        output.push_str(&format!(
            "# HELP digest_memory_resident_bytes Resident set size\n\
             # TYPE digest_memory_resident_bytes gauge\n\
             digest_memory_resident_bytes {}\n",
            memory.resident_bytes
        ));
        output.push_str(&format!(
            "# HELP digest_memory_virtual_bytes Virtual memory size\n\
             # TYPE digest_memory_virtual_bytes gauge\n\
             digest_memory_virtual_bytes {}\n",
            memory.virtual_bytes
        ));
        output.push_str(&format!(
            "# HELP digest_uptime_seconds Seconds since process start\n\
             # TYPE digest_uptime_seconds gauge\n\
             digest_uptime_seconds {}\n",
            self.uptime_seconds()
        ));

        output
    }
}

/// Reads process memory from `/proc/self/statm`; zeros elsewhere.
pub fn read_memory_stats() -> MemoryStats {
    #[cfg(target_os = "linux")]
    {
        const PAGE_SIZE: u64 = 4096;
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            let mut fields = statm.split_whitespace();
            let virtual_pages: u64 = fields.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            let resident_pages: u64 = fields.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            return MemoryStats {
                virtual_bytes: virtual_pages * PAGE_SIZE,
                resident_bytes: resident_pages * PAGE_SIZE,
            };
        }
    }
    MemoryStats::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_recording() {
        let metrics = DigestMetrics::new();
        metrics.record_request(true);
        metrics.record_request(true);
        metrics.record_request(false);
        assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.requests_success.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.requests_error.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_json_export_shape() {
        let metrics = DigestMetrics::new();
        metrics.record_cache_hit();
        let value = metrics.to_json("chain-digest/v0.1.0");
        assert_eq!(value["cache"]["hits"], 1);
        assert_eq!(value["build_info"], "chain-digest/v0.1.0");
        assert!(value["memory"]["resident_bytes"].is_u64());
    }

    #[test]
    fn test_exposition_format() {
        let metrics = DigestMetrics::new();
        metrics.record_request(true);
        let text = metrics.to_exposition();
        assert!(text.contains("# TYPE digest_requests_total counter"));
        assert!(text.contains("digest_requests_total 1"));
        assert!(text.contains("digest_uptime_seconds"));
    }
}
