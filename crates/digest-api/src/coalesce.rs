//! Request coalescing.
//!
//! Concurrent requests bearing the same cache key share one fetch: the
//! first caller executes, late callers await the same in-flight future and
//! receive the identical result. This bounds duplicate store load during
//! request storms. Failed fetches propagate to every waiter and are never
//! cached.

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;

use crate::cache::CacheClass;
use crate::error::Problem;

/// Output of one fetch: the serialized envelope plus its TTL class.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    pub class: CacheClass,
}

pub type FlightResult = Result<Fetched, Problem>;

type Flight = Shared<BoxFuture<'static, FlightResult>>;

/// In-flight fetches keyed by cache key. Safe for concurrent use across all
/// handler invocations, independent of the store.
#[derive(Default)]
pub struct SingleFlight {
    inflight: DashMap<String, Flight>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fetch` unless an identical request is already in flight, in
    /// which case its result is awaited instead. Returns the result and
    /// whether it was shared (i.e. this caller did not execute the fetch).
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> (FlightResult, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult> + Send + 'static,
    {
        use dashmap::mapref::entry::Entry;

        let (flight, leader) = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let flight: Flight = fetch().boxed().shared();
                entry.insert(flight.clone());
                (flight, true)
            }
        };

        let result = flight.await;
        if leader {
            self.inflight.remove(key);
        }
        (result, !leader)
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }
}
