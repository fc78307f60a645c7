//! The projection engine: finalized blocks in, queryable documents out.
//!
//! A finalized block, its ordered operation list, the operation-result tree
//! and the resulting states are handed to a [`BlockSession`]. The session
//! classifies states through the [`domains::DomainRegistry`] into
//! per-collection write batches, collects key-scoped compactions for mutable
//! logical keys, and commits everything as a single atomic multi-collection
//! transaction.
//!
//! # Architecture
//!
//! ```text
//! BlockManifest ─┐
//! Operations ────┤                  ┌── write batches ──┐
//! ResultSet ─────┼──▶ BlockSession ─┤                   ├──▶ DocumentStore
//! States ────────┘     (Prepare)    └── compactions ────┘      (Commit)
//!                                          ▲
//!                          DomainRegistry ─┘
//!                (predicate + builder per domain)
//! ```
//!
//! Read queries live beside each domain module and go straight to the store;
//! they never touch a session.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod block;
pub mod domains;
pub mod error;
pub mod keys;
pub mod processor;
pub mod queries;
pub mod session;

pub use block::{COL_BLOCK, COL_OPERATION};
pub use domains::{BlockRef, Compaction, DomainHandler, DomainRegistry, Insert, StateProjection};
pub use error::EngineError;
pub use processor::{DuplicationChecker, DuplicationError};
pub use session::{BlockSession, CommitSummary, BULK_WRITE_LIMIT};
