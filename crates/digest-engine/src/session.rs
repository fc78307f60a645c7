//! The per-block unit of work.
//!
//! A session owns everything between `prepare` and `commit`: the in-memory
//! write batches per collection, the compaction set for mutable logical
//! keys, and the single transaction that makes the whole block's projection
//! visible atomically. Sessions are single-use; the caller guarantees
//! heights are submitted in increasing order with no concurrent commits.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use digest_store::{
    Document, DocumentStore, HeightRange, OpContext, StoreError, StoreTransaction,
};
use shared_types::{BlockManifest, Height, OperationRecord, OperationResultSet, ProposalInfo, State};
use tracing::{debug, info, instrument};

use crate::block::{self, COL_BLOCK, COL_OPERATION};
use crate::domains::{BlockRef, Compaction, DomainRegistry};
use crate::error::EngineError;

/// Maximum documents per bulk-insert request; larger batches are split into
/// ordered chunks.
pub const BULK_WRITE_LIMIT: usize = 500;

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub height: Height,
    pub documents_written: u64,
}

/// Per-block projection session.
pub struct BlockSession {
    store: Arc<dyn DocumentStore>,
    registry: Arc<DomainRegistry>,
    manifest: BlockManifest,
    operations: Vec<OperationRecord>,
    results: OperationResultSet,
    states: Vec<State>,
    proposal: ProposalInfo,
    confirmed_at: DateTime<Utc>,
    build_info: String,
    batches: HashMap<&'static str, Vec<Document>>,
    compactions: BTreeMap<String, Compaction>,
    prepared: bool,
    closed: bool,
}

impl BlockSession {
    /// Creates a session over a writable store handle.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<DomainRegistry>,
        manifest: BlockManifest,
        operations: Vec<OperationRecord>,
        results: OperationResultSet,
        states: Vec<State>,
        proposal: ProposalInfo,
        confirmed_at: DateTime<Utc>,
        build_info: impl Into<String>,
    ) -> Result<Self, EngineError> {
        if store.read_only() {
            return Err(EngineError::Store(StoreError::ReadOnly));
        }

        Ok(Self {
            store,
            registry,
            manifest,
            operations,
            results,
            states,
            proposal,
            confirmed_at,
            build_info: build_info.into(),
            batches: HashMap::new(),
            compactions: BTreeMap::new(),
            prepared: false,
            closed: false,
        })
    }

    pub fn height(&self) -> Height {
        self.manifest.height
    }

    /// Classifies the block into per-collection write batches. Pure
    /// in-memory computation; no partial batch survives an error.
    #[instrument(skip(self), fields(height = %self.manifest.height))]
    pub fn prepare(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::SessionClosed);
        }

        match self.build_batches() {
            Ok(()) => {
                self.prepared = true;
                debug!(
                    collections = self.batches.len(),
                    compactions = self.compactions.len(),
                    "block session prepared"
                );
                Ok(())
            }
            Err(e) => {
                self.batches.clear();
                self.compactions.clear();
                Err(e)
            }
        }
    }

    fn build_batches(&mut self) -> Result<(), EngineError> {
        self.prepare_block()?;
        self.prepare_operations()?;
        self.prepare_states()
    }

    fn prepare_block(&mut self) -> Result<(), EngineError> {
        let doc = block::manifest_doc(
            &self.manifest,
            &self.proposal,
            self.confirmed_at,
            self.operations.len() as u64,
            &self.build_info,
        )?;
        self.batches.entry(COL_BLOCK).or_default().push(doc);
        Ok(())
    }

    fn prepare_operations(&mut self) -> Result<(), EngineError> {
        if self.operations.is_empty() {
            return Ok(());
        }

        let outcomes = self.results.indexed();
        let mut docs = Vec::with_capacity(self.operations.len());
        for (index, record) in self.operations.iter().enumerate() {
            let node = outcomes.get(&record.fact_hash.to_hex()).ok_or_else(|| {
                EngineError::MissingOperationResult {
                    fact_hash: record.fact_hash.to_hex(),
                }
            })?;
            docs.push(block::operation_doc(
                record,
                self.manifest.height,
                self.confirmed_at,
                node.in_state,
                node.reason.as_deref(),
                index as u64,
            )?);
        }
        self.batches.entry(COL_OPERATION).or_default().extend(docs);
        Ok(())
    }

    fn prepare_states(&mut self) -> Result<(), EngineError> {
        let block_ref = BlockRef {
            height: self.manifest.height,
            proposed_at: &self.manifest.proposed_at,
        };

        for state in &self.states {
            // First matching domain wins; states from unknown domains are
            // skipped so foreign state shapes never abort the block.
            let handler = match self.registry.classify(&state.key) {
                Some(handler) => handler,
                None => continue,
            };

            let projection = handler.project(state, &block_ref)?;
            for insert in projection.inserts {
                self.batches
                    .entry(insert.collection)
                    .or_default()
                    .push(insert.document);
            }
            for compaction in projection.compactions {
                self.compactions
                    .entry(compaction.dedup_key())
                    .or_insert(compaction);
            }
        }
        Ok(())
    }

    /// Persists every batch in one atomic multi-collection transaction:
    /// either every document for this height becomes visible, or none do.
    /// The session closes regardless of outcome and must not be reused.
    #[instrument(skip(self, ctx), fields(height = %self.manifest.height))]
    pub async fn commit(&mut self, ctx: &OpContext) -> Result<CommitSummary, EngineError> {
        if self.closed {
            return Err(EngineError::SessionClosed);
        }
        if !self.prepared {
            return Err(EngineError::NotPrepared);
        }

        let started = Instant::now();
        let result = self.run_commit(ctx).await;
        self.close();

        match &result {
            Ok(summary) => info!(
                height = %summary.height,
                documents = summary.documents_written,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "block committed"
            ),
            Err(e) => info!(
                height = %self.manifest.height,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "block commit failed"
            ),
        }
        result
    }

    async fn run_commit(&mut self, ctx: &OpContext) -> Result<CommitSummary, EngineError> {
        let mut txn = self.store.begin(ctx).await?;

        let written = match self.write_all(&mut txn, ctx).await {
            Ok(written) => written,
            Err(e) => {
                let _ = txn.abort().await;
                return Err(e);
            }
        };

        txn.commit(ctx).await?;
        Ok(CommitSummary {
            height: self.manifest.height,
            documents_written: written,
        })
    }

    async fn write_all(
        &mut self,
        txn: &mut Box<dyn StoreTransaction>,
        ctx: &OpContext,
    ) -> Result<u64, EngineError> {
        // Block header first, then operations, then domain collections in
        // registry order. The order is a convenience; atomicity comes from
        // the enclosing transaction.
        let mut ordered: Vec<&'static str> = vec![COL_BLOCK, COL_OPERATION];
        ordered.extend(self.registry.collections());

        let mut written = 0u64;
        for collection in ordered {
            // Condemn superseded rows for mutable logical keys before the
            // compensating inserts land, inside the same transaction.
            for compaction in self
                .compactions
                .values()
                .filter(|c| c.collection == collection)
            {
                let removed = txn
                    .delete_many(
                        ctx,
                        collection,
                        &compaction.to_filter(),
                        HeightRange::AtOrBelow(self.manifest.height),
                    )
                    .await?;
                if removed > 0 {
                    debug!(collection, removed, "condemned superseded documents");
                }
            }

            let docs = match self.batches.get(collection) {
                Some(docs) if !docs.is_empty() => docs.clone(),
                _ => continue,
            };
            written += write_models(txn, ctx, collection, docs).await?;
        }
        Ok(written)
    }

    /// Releases the session's working storage. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.batches.clear();
        self.compactions.clear();
        self.states.clear();
        self.operations.clear();
        self.results.nodes.clear();
        self.closed = true;
    }
}

/// Writes one collection's batch in ordered chunks of [`BULK_WRITE_LIMIT`].
/// A failure in chunk `i` never attempts chunk `i + 1`.
async fn write_models(
    txn: &mut Box<dyn StoreTransaction>,
    ctx: &OpContext,
    collection: &str,
    docs: Vec<Document>,
) -> Result<u64, EngineError> {
    let mut written = 0u64;
    for chunk in docs.chunks(BULK_WRITE_LIMIT) {
        let expected = chunk.len() as u64;
        let inserted = txn.insert_many(ctx, collection, chunk.to_vec()).await?;
        if inserted < expected {
            return Err(EngineError::Store(StoreError::ShortWrite {
                collection: collection.to_string(),
                expected,
                inserted,
            }));
        }
        written += inserted;
    }
    Ok(written)
}
