//! Outbound port to the document store.
//!
//! The backing store must provide causally-consistent sessions with
//! snapshot read isolation and majority write durability. All cross-cutting
//! coordination (atomicity, isolation) is delegated to the store's
//! transaction primitive, not to in-process locks.

use async_trait::async_trait;

use crate::context::OpContext;
use crate::document::Document;
use crate::index::IndexRegistry;
use crate::query::{Filter, HeightRange, Query};

/// Store-level failures. Connectivity, abort and deadline errors are
/// retryable by the caller because a commit is all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store connectivity error: {0}")]
    Connectivity(String),

    #[error("write error: {0}")]
    Write(String),

    /// Bulk insert acknowledged fewer documents than submitted.
    #[error("not inserted to {collection}: expected {expected}, inserted {inserted}")]
    ShortWrite {
        collection: String,
        expected: u64,
        inserted: u64,
    },

    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("store deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The store handle was opened read-only; projection is not allowed.
    #[error("readonly mode")]
    ReadOnly,
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Connectivity(_)
                | StoreError::TransactionAborted(_)
                | StoreError::DeadlineExceeded
        )
    }
}

/// A multi-collection ACID transaction. Writes staged through it are
/// invisible to readers until [`StoreTransaction::commit`] returns.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Ordered bulk insert; returns the acknowledged insert count.
    async fn insert_many(
        &mut self,
        ctx: &OpContext,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<u64, StoreError>;

    /// Filtered delete scoped by denormalized fields and a height bound;
    /// returns the number of documents condemned.
    async fn delete_many(
        &mut self,
        ctx: &OpContext,
        collection: &str,
        filter: &Filter,
        height: HeightRange,
    ) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>, ctx: &OpContext) -> Result<(), StoreError>;

    async fn abort(self: Box<Self>) -> Result<(), StoreError>;
}

/// The document store port.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a causally-consistent session and starts a transaction with
    /// snapshot read isolation and majority write durability.
    async fn begin(&self, ctx: &OpContext) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn find_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        query: &Query,
    ) -> Result<Option<Document>, StoreError>;

    async fn find(
        &self,
        ctx: &OpContext,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError>;

    /// Applies the registry; creation is a no-op for indexes that already
    /// exist under the same name.
    async fn ensure_indexes(
        &self,
        ctx: &OpContext,
        registry: &IndexRegistry,
    ) -> Result<(), StoreError>;

    /// Whether this handle rejects writes.
    fn read_only(&self) -> bool {
        false
    }
}
