//! In-memory document store adapter.
//!
//! Implements the full port contract: staged transaction writes are
//! invisible until commit, deletes and inserts apply in staging order, and
//! index provisioning is idempotent by name. Fault hooks let tests fail a
//! transaction mid-write or undercount a bulk insert.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::context::OpContext;
use crate::document::Document;
use crate::index::{IndexRegistry, IndexSpec};
use crate::port::{DocumentStore, StoreError, StoreTransaction};
use crate::query::{Filter, HeightRange, Query, SortOrder};

#[derive(Default)]
struct FaultPlan {
    /// Number of transaction write calls to allow before failing one.
    fail_after_writes: Option<u64>,
    /// Fail the next commit with a transaction abort.
    fail_next_commit: bool,
    /// Acknowledge one fewer insert than submitted for this collection.
    undercount_collection: Option<String>,
}

struct Shared {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    indexes: RwLock<BTreeMap<String, BTreeMap<String, IndexSpec>>>,
    faults: Mutex<FaultPlan>,
}

/// Shared-handle in-memory store. Clones view the same data.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    read_only: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                collections: RwLock::new(HashMap::new()),
                indexes: RwLock::new(BTreeMap::new()),
                faults: Mutex::new(FaultPlan::default()),
            }),
            read_only: false,
        }
    }

    /// A handle over the same data that rejects transactions.
    pub fn read_only_handle(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            read_only: true,
        }
    }

    /// Fault hook: allow `n` transaction write calls, then fail the next.
    pub fn fail_after_writes(&self, n: u64) {
        self.shared.faults.lock().fail_after_writes = Some(n);
    }

    /// Fault hook: abort the next commit.
    pub fn fail_next_commit(&self) {
        self.shared.faults.lock().fail_next_commit = true;
    }

    /// Fault hook: acknowledge one fewer insert than submitted for
    /// `collection`.
    pub fn undercount_inserts_on(&self, collection: &str) {
        self.shared.faults.lock().undercount_collection = Some(collection.to_string());
    }

    /// Number of committed documents in a collection.
    pub fn collection_size(&self, collection: &str) -> usize {
        self.shared
            .collections
            .read()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Names of indexes provisioned for a collection.
    pub fn index_names(&self, collection: &str) -> Vec<String> {
        self.shared
            .indexes
            .read()
            .get(collection)
            .map(|specs| specs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

enum StagedOp {
    Insert {
        collection: String,
        documents: Vec<Document>,
    },
    Delete {
        collection: String,
        filter: Filter,
        height: HeightRange,
    },
}

struct MemoryTransaction {
    shared: Arc<Shared>,
    staged: Vec<StagedOp>,
}

impl MemoryTransaction {
    fn check_write_fault(&self) -> Result<(), StoreError> {
        let mut faults = self.shared.faults.lock();
        if let Some(remaining) = faults.fail_after_writes {
            if remaining == 0 {
                faults.fail_after_writes = None;
                return Err(StoreError::Write("injected write failure".to_string()));
            }
            faults.fail_after_writes = Some(remaining - 1);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_many(
        &mut self,
        ctx: &OpContext,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<u64, StoreError> {
        ctx.check()?;
        self.check_write_fault()?;

        let submitted = documents.len() as u64;
        self.staged.push(StagedOp::Insert {
            collection: collection.to_string(),
            documents,
        });

        let undercount = self
            .shared
            .faults
            .lock()
            .undercount_collection
            .as_deref()
            .is_some_and(|c| c == collection);
        if undercount && submitted > 0 {
            return Ok(submitted - 1);
        }
        Ok(submitted)
    }

    async fn delete_many(
        &mut self,
        ctx: &OpContext,
        collection: &str,
        filter: &Filter,
        height: HeightRange,
    ) -> Result<u64, StoreError> {
        ctx.check()?;
        self.check_write_fault()?;

        // Count against the committed snapshot; the actual delete applies in
        // staging order at commit.
        let condemned = {
            let collections = self.shared.collections.read();
            collections
                .get(collection)
                .map(|docs| {
                    docs.iter()
                        .filter(|doc| filter.matches(doc) && height.matches_doc(doc))
                        .count() as u64
                })
                .unwrap_or(0)
        };

        self.staged.push(StagedOp::Delete {
            collection: collection.to_string(),
            filter: filter.clone(),
            height,
        });
        Ok(condemned)
    }

    async fn commit(self: Box<Self>, ctx: &OpContext) -> Result<(), StoreError> {
        ctx.check()?;
        let this = *self;

        {
            let mut faults = this.shared.faults.lock();
            if faults.fail_next_commit {
                faults.fail_next_commit = false;
                return Err(StoreError::TransactionAborted(
                    "injected commit failure".to_string(),
                ));
            }
        }

        let mut collections = this.shared.collections.write();
        for op in this.staged {
            match op {
                StagedOp::Insert {
                    collection,
                    documents,
                } => {
                    collections.entry(collection).or_default().extend(documents);
                }
                StagedOp::Delete {
                    collection,
                    filter,
                    height,
                } => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.retain(|doc| !(filter.matches(doc) && height.matches_doc(doc)));
                    }
                }
            }
        }
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        debug!(staged = self.staged.len(), "transaction aborted");
        Ok(())
    }
}

fn run_query(docs: &[Document], query: &Query) -> Vec<Document> {
    let mut matched: Vec<&Document> = docs
        .iter()
        .filter(|doc| query.filter.matches(doc) && query.height.matches_doc(doc))
        .collect();

    // Stable sort keeps insertion order for equal heights.
    match query.sort {
        SortOrder::Ascending => {
            matched.sort_by_key(|doc| doc.u64_field("height").unwrap_or(0));
        }
        SortOrder::Descending => {
            matched.sort_by_key(|doc| std::cmp::Reverse(doc.u64_field("height").unwrap_or(0)));
        }
    }

    if let Some(limit) = query.limit {
        matched.truncate(limit as usize);
    }
    matched.into_iter().cloned().collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn begin(&self, ctx: &OpContext) -> Result<Box<dyn StoreTransaction>, StoreError> {
        ctx.check()?;
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            staged: Vec::new(),
        }))
    }

    async fn find_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        query: &Query,
    ) -> Result<Option<Document>, StoreError> {
        ctx.check()?;
        let collections = self.shared.collections.read();
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(None),
        };
        Ok(run_query(docs, query).into_iter().next())
    }

    async fn find(
        &self,
        ctx: &OpContext,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        ctx.check()?;
        let collections = self.shared.collections.read();
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };
        Ok(run_query(docs, query))
    }

    async fn ensure_indexes(
        &self,
        ctx: &OpContext,
        registry: &IndexRegistry,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        let mut indexes = self.shared.indexes.write();
        for collection in registry.collections() {
            let entry = indexes.entry(collection.to_string()).or_default();
            for spec in registry.specs(collection) {
                entry.entry(spec.name.clone()).or_insert_with(|| spec.clone());
            }
        }
        Ok(())
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexDirection;
    use serde_json::json;
    use shared_types::Height;

    fn doc(contract: &str, height: u64) -> Document {
        let mut d = Document::with_payload(json!({"v": height}), Height::new(height));
        d.set("contract", contract);
        d
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();

        let mut txn = store.begin(&ctx).await.unwrap();
        txn.insert_many(&ctx, "col", vec![doc("C1a", 1)]).await.unwrap();
        assert_eq!(store.collection_size("col"), 0);

        txn.commit(&ctx).await.unwrap();
        assert_eq!(store.collection_size("col"), 1);
    }

    #[tokio::test]
    async fn test_abort_discards_staging() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();

        let mut txn = store.begin(&ctx).await.unwrap();
        txn.insert_many(&ctx, "col", vec![doc("C1a", 1)]).await.unwrap();
        txn.abort().await.unwrap();
        assert_eq!(store.collection_size("col"), 0);
    }

    #[tokio::test]
    async fn test_delete_then_insert_applies_in_order() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();

        let mut txn = store.begin(&ctx).await.unwrap();
        txn.insert_many(&ctx, "col", vec![doc("C1a", 1)]).await.unwrap();
        txn.commit(&ctx).await.unwrap();

        // Delete everything at or below height 2, then insert the height-2
        // replacement inside the same transaction.
        let mut txn = store.begin(&ctx).await.unwrap();
        txn.delete_many(
            &ctx,
            "col",
            &Filter::new().eq("contract", "C1a"),
            HeightRange::AtOrBelow(Height::new(2)),
        )
        .await
        .unwrap();
        txn.insert_many(&ctx, "col", vec![doc("C1a", 2)]).await.unwrap();
        txn.commit(&ctx).await.unwrap();

        assert_eq!(store.collection_size("col"), 1);
        let remaining = store
            .find_one(
                &ctx,
                "col",
                &Query::latest(Filter::new().eq("contract", "C1a")),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remaining.height(), Some(Height::new(2)));
    }

    #[tokio::test]
    async fn test_sort_and_limit() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();

        let mut txn = store.begin(&ctx).await.unwrap();
        txn.insert_many(&ctx, "col", vec![doc("C1a", 3), doc("C1a", 1), doc("C1a", 2)])
            .await
            .unwrap();
        txn.commit(&ctx).await.unwrap();

        let ascending = store
            .find(
                &ctx,
                "col",
                &Query::new(Filter::new().eq("contract", "C1a")).limit(2),
            )
            .await
            .unwrap();
        let heights: Vec<u64> = ascending.iter().filter_map(|d| d.u64_field("height")).collect();
        assert_eq!(heights, vec![1, 2]);

        let latest = store
            .find_one(
                &ctx,
                "col",
                &Query::latest(Filter::new().eq("contract", "C1a")),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.height(), Some(Height::new(3)));
    }

    #[tokio::test]
    async fn test_write_fault_injection() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();
        store.fail_after_writes(1);

        let mut txn = store.begin(&ctx).await.unwrap();
        txn.insert_many(&ctx, "a", vec![doc("C1a", 1)]).await.unwrap();
        let err = txn
            .insert_many(&ctx, "b", vec![doc("C1a", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Write(_)));
        txn.abort().await.unwrap();
        assert_eq!(store.collection_size("a"), 0);
    }

    #[tokio::test]
    async fn test_undercount_fault() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();
        store.undercount_inserts_on("col");

        let mut txn = store.begin(&ctx).await.unwrap();
        let inserted = txn
            .insert_many(&ctx, "col", vec![doc("C1a", 1), doc("C1a", 2)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        txn.abort().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_only_handle_rejects_begin() {
        let store = MemoryStore::new();
        let handle = store.read_only_handle();
        let err = match handle.begin(&OpContext::background()).await {
            Ok(_) => panic!("expected begin to be rejected"),
            Err(e) => e,
        };
        assert_eq!(err, StoreError::ReadOnly);
    }

    #[tokio::test]
    async fn test_ensure_indexes_idempotent() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();

        let mut registry = IndexRegistry::new();
        registry.register(
            "col",
            vec![IndexSpec::new(
                "col_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );

        store.ensure_indexes(&ctx, &registry).await.unwrap();
        store.ensure_indexes(&ctx, &registry).await.unwrap();
        assert_eq!(store.index_names("col").len(), 1);
    }
}
