//! Document store abstraction for the digest.
//!
//! This crate defines the document and query model the projector writes and
//! the read API queries, the [`DocumentStore`]/[`StoreTransaction`] ports,
//! the declarative index registry, and an in-memory transactional adapter.
//!
//! # Design
//!
//! The store is an external collaborator: a transactional document database
//! with multi-collection ACID transactions, ordered bulk insert, filtered
//! delete and named compound indexes. Components depend on the port, never a
//! concrete backend; the in-memory adapter implements the same visibility
//! contract (staged writes are invisible until commit) and carries fault
//! hooks so failure paths can be exercised in tests.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod context;
pub mod document;
pub mod index;
pub mod port;
pub mod query;

pub use adapters::memory::MemoryStore;
pub use context::OpContext;
pub use document::Document;
pub use index::{IndexDirection, IndexKey, IndexRegistry, IndexSpec};
pub use port::{DocumentStore, StoreError, StoreTransaction};
pub use query::{Filter, HeightRange, Query, SortOrder};
