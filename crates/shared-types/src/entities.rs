//! # Core Domain Entities
//!
//! Defines the chain-side inputs the digest consumes: heights, hashes,
//! addresses, versioned states, block manifests and operation records.
//!
//! ## Clusters
//!
//! - **Chain**: `BlockManifest`, `ProposalInfo`
//! - **Execution output**: `State`, `StateKey`, `OperationRecord`,
//!   `OperationResultSet`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EntityError;

/// The strictly increasing integer identifying a finalized block; also the
/// version marker for states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Height(u64);

impl Height {
    pub const fn new(height: u64) -> Self {
        Self(height)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Height {
    fn from(height: u64) -> Self {
        Self(height)
    }
}

/// A 32-byte hash, rendered as lowercase hex in JSON and URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, EntityError> {
        let raw = hex::decode(s).map_err(|_| EntityError::InvalidHash(s.to_string()))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| EntityError::InvalidHash(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A chain address: alphanumeric, 3..=100 characters.
///
/// Path parameters naming contracts, accounts and holders are validated
/// against this shape before any store query runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(s: &str) -> Result<Self, EntityError> {
        if !is_valid_address(s) {
            return Err(EntityError::InvalidAddress(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Address shape shared by handlers and entity parsing.
pub fn is_valid_address(s: &str) -> bool {
    (2..=100).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// A domain-prefixed state key, e.g. `storage:<contract>:design`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable, height-versioned key/value record produced by applying one
/// operation. A logical entity's current value is the state with the highest
/// height for its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Domain-prefixed key encoding contract address and sub-identifiers.
    pub key: StateKey,
    /// Block height at which this version was produced.
    pub height: Height,
    /// Domain-typed payload; each domain's accessor decodes it.
    pub value: serde_json::Value,
    /// Ordered hashes of the operations that touched this key at this height.
    pub operations: Vec<Hash>,
}

/// One per height; created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockManifest {
    pub height: Height,
    pub previous: Hash,
    pub proposal: Hash,
    pub operations_tree: Hash,
    pub states_tree: Hash,
    pub suffrage: Hash,
    pub proposed_at: DateTime<Utc>,
}

/// Metadata of the winning proposal for a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalInfo {
    pub proposer: Address,
    pub round: u64,
}

/// A submitted operation, identified by its fact hash.
///
/// Outcomes live in the separate [`OperationResultSet`]; position within the
/// block is the record's index in the block's operation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub fact_hash: Hash,
    pub fact: OperationFact,
}

/// The duplication-relevant shape of an operation fact.
///
/// The digest does not validate operation semantics; it only needs the
/// mutually-exclusive resources each fact claims within a proposal, the
/// addresses to denormalize into operation documents, and a payload to embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationFact {
    CreateAccount {
        sender: Address,
        targets: Vec<Address>,
    },
    CreateContractAccount {
        sender: Address,
        targets: Vec<Address>,
    },
    Transfer {
        sender: Address,
    },
    Mint {
        sender: Address,
    },
    RegisterCurrency {
        sender: Address,
        currency_id: String,
    },
    UpdateCurrency {
        sender: Address,
        currency_id: String,
    },
    /// Registers a contract model (nft, credential, storage, timestamp,
    /// prescription, ...) under a contract account.
    RegisterModel {
        sender: Address,
        contract: Address,
    },
    IssueCredential {
        sender: Address,
        items: Vec<CredentialRef>,
    },
    RevokeCredential {
        sender: Address,
        items: Vec<CredentialRef>,
    },
    /// Storage data creation or update under (contract, data_key).
    UpsertData {
        sender: Address,
        contract: Address,
        data_key: String,
    },
    DeleteData {
        sender: Address,
        contract: Address,
        data_key: String,
    },
    RegisterPrescription {
        sender: Address,
        contract: Address,
        prescription_hash: String,
    },
    UsePrescription {
        sender: Address,
        contract: Address,
        prescription_hash: String,
    },
    IssueTimestamp {
        sender: Address,
    },
}

/// The (contract, template, credential id) triple a credential item names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialRef {
    pub contract: Address,
    pub template_id: String,
    pub credential_id: String,
}

impl OperationFact {
    /// The sending address of the fact.
    pub fn sender(&self) -> &Address {
        match self {
            OperationFact::CreateAccount { sender, .. }
            | OperationFact::CreateContractAccount { sender, .. }
            | OperationFact::Transfer { sender }
            | OperationFact::Mint { sender }
            | OperationFact::RegisterCurrency { sender, .. }
            | OperationFact::UpdateCurrency { sender, .. }
            | OperationFact::RegisterModel { sender, .. }
            | OperationFact::IssueCredential { sender, .. }
            | OperationFact::RevokeCredential { sender, .. }
            | OperationFact::UpsertData { sender, .. }
            | OperationFact::DeleteData { sender, .. }
            | OperationFact::RegisterPrescription { sender, .. }
            | OperationFact::UsePrescription { sender, .. }
            | OperationFact::IssueTimestamp { sender } => sender,
        }
    }

    /// All addresses the fact touches, sender first. Denormalized into
    /// operation documents for address-scoped lookups.
    pub fn addresses(&self) -> Vec<Address> {
        let mut out = vec![self.sender().clone()];
        match self {
            OperationFact::CreateAccount { targets, .. }
            | OperationFact::CreateContractAccount { targets, .. } => {
                out.extend(targets.iter().cloned());
            }
            OperationFact::RegisterModel { contract, .. }
            | OperationFact::UpsertData { contract, .. }
            | OperationFact::DeleteData { contract, .. }
            | OperationFact::RegisterPrescription { contract, .. }
            | OperationFact::UsePrescription { contract, .. } => {
                out.push(contract.clone());
            }
            _ => {}
        }
        out
    }
}

/// Outcome node for one operation in a block's result tree.
///
/// Tree keys are fact-hash hex strings; rejected entries carry a trailing
/// marker character appended by the tree builder, stripped during indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResultNode {
    pub key: String,
    pub in_state: bool,
    pub reason: Option<String>,
}

/// The operation-result tree for one block, supporting outcome-by-hash
/// lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResultSet {
    pub nodes: Vec<OperationResultNode>,
}

impl OperationResultSet {
    pub fn new(nodes: Vec<OperationResultNode>) -> Self {
        Self { nodes }
    }

    /// Index nodes by fact hash, stripping the rejection marker from keys of
    /// reason-bearing entries.
    pub fn indexed(&self) -> std::collections::HashMap<String, &OperationResultNode> {
        let mut out = std::collections::HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.reason.is_none() {
                out.insert(node.key.clone(), node);
            } else {
                let trimmed = node.key[..node.key.len().saturating_sub(1)].to_string();
                out.insert(trimmed, node);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_round_trip() {
        let h = Hash::new([0xab; 32]);
        let restored = Hash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, restored);
    }

    #[test]
    fn test_hash_rejects_bad_hex() {
        assert!(Hash::from_hex("zz").is_err());
        assert!(Hash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(Address::parse("C1alpha").is_ok());
        assert!(Address::parse("C1").is_ok());
        assert!(Address::parse("x").is_err());
        assert!(Address::parse("has space").is_err());
        assert!(Address::parse("dash-ed").is_err());
    }

    #[test]
    fn test_fact_addresses_include_targets() {
        let fact = OperationFact::CreateAccount {
            sender: Address::parse("sender1").unwrap(),
            targets: vec![Address::parse("target1").unwrap()],
        };
        let addrs = fact.addresses();
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0].as_str(), "sender1");
    }

    #[test]
    fn test_result_set_strips_rejection_marker() {
        let applied = OperationResultNode {
            key: "aa11".into(),
            in_state: true,
            reason: None,
        };
        let rejected = OperationResultNode {
            key: "bb22x".into(),
            in_state: false,
            reason: Some("insufficient balance".into()),
        };
        let set = OperationResultSet::new(vec![applied, rejected]);
        let idx = set.indexed();
        assert!(idx.contains_key("aa11"));
        assert!(idx.contains_key("bb22"));
        assert!(!idx.contains_key("bb22x"));
    }
}
