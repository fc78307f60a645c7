//! Block manifest and operation documents.
//!
//! One manifest document per height; one operation document per submitted
//! operation, carrying its outcome and its position index within the block.

use chrono::{DateTime, Utc};
use digest_store::{
    Document, DocumentStore, Filter, IndexDirection, IndexRegistry, IndexSpec, OpContext,
    StoreError,
};
use serde_json::json;
use shared_types::{BlockManifest, Hash, Height, OperationRecord, ProposalInfo};

use crate::error::EngineError;
use crate::queries;

pub const COL_BLOCK: &str = "digest_block";
pub const COL_OPERATION: &str = "digest_operation";

/// Builds the manifest document for one block.
pub fn manifest_doc(
    manifest: &BlockManifest,
    proposal: &ProposalInfo,
    confirmed_at: DateTime<Utc>,
    operation_count: u64,
    build_info: &str,
) -> Result<Document, EngineError> {
    let payload = serde_json::to_value(manifest).map_err(|e| EngineError::MalformedValue {
        key: format!("block manifest {}", manifest.height),
        detail: e.to_string(),
    })?;

    let mut doc = Document::with_payload(payload, manifest.height);
    doc.set("proposer", proposal.proposer.as_str());
    doc.set("round", proposal.round);
    doc.set("confirmed_at", confirmed_at.to_rfc3339());
    doc.set("operations", operation_count);
    doc.set("build_info", build_info);
    Ok(doc)
}

/// Builds one operation document with its applied/rejected outcome.
pub fn operation_doc(
    record: &OperationRecord,
    height: Height,
    confirmed_at: DateTime<Utc>,
    in_state: bool,
    reason: Option<&str>,
    index: u64,
) -> Result<Document, EngineError> {
    let payload = serde_json::to_value(&record.fact).map_err(|e| EngineError::MalformedValue {
        key: format!("operation {}", record.fact_hash),
        detail: e.to_string(),
    })?;

    let addresses: Vec<String> = record
        .fact
        .addresses()
        .into_iter()
        .map(|a| a.as_str().to_string())
        .collect();

    let mut doc = Document::with_payload(payload, height);
    doc.set("facthash", record.fact_hash.to_hex());
    doc.set("index", index);
    doc.set("in_state", in_state);
    doc.set("reason", reason.unwrap_or(""));
    doc.set("addresses", json!(addresses));
    doc.set("confirmed_at", confirmed_at.to_rfc3339());
    Ok(doc)
}

/// Manifest document for a height.
pub async fn block_by_height(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    height: Height,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_BLOCK,
        Filter::new().eq("height", height.as_u64()),
    )
    .await
}

/// Operation document by fact hash.
pub async fn operation_by_fact_hash(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    fact_hash: &Hash,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_OPERATION,
        Filter::new().eq("facthash", fact_hash.to_hex()),
    )
    .await
}

/// Index specs for the block and operation collections.
pub fn register_indexes(registry: &mut IndexRegistry) {
    registry.register(
        COL_BLOCK,
        vec![IndexSpec::new(
            "block_height",
            &[("height", IndexDirection::Descending)],
        )],
    );
    registry.register(
        COL_OPERATION,
        vec![
            IndexSpec::new("operation_facthash", &[("facthash", IndexDirection::Ascending)]),
            IndexSpec::new(
                "operation",
                &[
                    ("height", IndexDirection::Ascending),
                    ("index", IndexDirection::Ascending),
                ],
            ),
            IndexSpec::new(
                "account_operation",
                &[
                    ("addresses", IndexDirection::Ascending),
                    ("height", IndexDirection::Ascending),
                    ("index", IndexDirection::Ascending),
                ],
            ),
            IndexSpec::new("operation_height", &[("height", IndexDirection::Descending)]),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Address, OperationFact};

    fn manifest(height: u64) -> BlockManifest {
        BlockManifest {
            height: Height::new(height),
            previous: Hash::new([1; 32]),
            proposal: Hash::new([2; 32]),
            operations_tree: Hash::new([3; 32]),
            states_tree: Hash::new([4; 32]),
            suffrage: Hash::new([5; 32]),
            proposed_at: Utc::now(),
        }
    }

    #[test]
    fn test_manifest_doc_fields() {
        let proposal = ProposalInfo {
            proposer: Address::parse("proposer1").unwrap(),
            round: 2,
        };
        let doc = manifest_doc(&manifest(42), &proposal, Utc::now(), 3, "v0.1.0").unwrap();
        assert_eq!(doc.height(), Some(Height::new(42)));
        assert_eq!(doc.str_field("proposer"), Some("proposer1"));
        assert_eq!(doc.u64_field("round"), Some(2));
        assert_eq!(doc.u64_field("operations"), Some(3));
        assert_eq!(doc.str_field("build_info"), Some("v0.1.0"));
    }

    #[test]
    fn test_operation_doc_rejection_reason() {
        let record = OperationRecord {
            fact_hash: Hash::new([9; 32]),
            fact: OperationFact::Transfer {
                sender: Address::parse("sender1").unwrap(),
            },
        };
        let doc = operation_doc(
            &record,
            Height::new(7),
            Utc::now(),
            false,
            Some("insufficient balance"),
            4,
        )
        .unwrap();
        assert_eq!(doc.bool_field("in_state"), Some(false));
        assert_eq!(doc.str_field("reason"), Some("insufficient balance"));
        assert_eq!(doc.u64_field("index"), Some(4));
        assert_eq!(doc.str_field("facthash"), Some(Hash::new([9; 32]).to_hex().as_str()));
    }
}
