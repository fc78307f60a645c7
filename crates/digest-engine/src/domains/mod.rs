//! Domain state handlers.
//!
//! Each domain owns an "is this state key mine" predicate and the document
//! builders for its collections. The registry holds `{predicate, builder}`
//! pairs in a fixed, deterministic order; the classifier tries each in turn
//! and the first match wins. Adding a domain means registering a handler;
//! the classifier itself never changes.

use chrono::{DateTime, Utc};
use digest_store::{Document, Filter, IndexRegistry};
use serde_json::Value;
use shared_types::{Height, State, StateKey};

use crate::error::EngineError;

pub mod credential;
pub mod currency;
pub mod nft;
pub mod prescription;
pub mod storage;
pub mod timestamp;

/// The block context document builders denormalize from.
#[derive(Debug, Clone, Copy)]
pub struct BlockRef<'a> {
    pub height: Height,
    pub proposed_at: &'a DateTime<Utc>,
}

/// One pending document insert.
#[derive(Debug, Clone)]
pub struct Insert {
    pub collection: &'static str,
    pub document: Document,
}

/// A key-scoped delete condemning superseded versions of a mutable logical
/// key. Executed inside the commit transaction, immediately before the
/// compensating insert, bounded at or below the committing height.
#[derive(Debug, Clone)]
pub struct Compaction {
    pub collection: &'static str,
    pub filter: Vec<(&'static str, Value)>,
}

impl Compaction {
    /// Stable identity used to run each logical-key cleanup once per block.
    pub fn dedup_key(&self) -> String {
        let mut key = self.collection.to_string();
        for (field, value) in &self.filter {
            key.push(':');
            key.push_str(field);
            key.push('=');
            key.push_str(&value.to_string());
        }
        key
    }

    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new();
        for (field, value) in &self.filter {
            filter = filter.eq(field, value.clone());
        }
        filter
    }
}

/// Everything one state contributes to the block's write set.
#[derive(Debug, Default)]
pub struct StateProjection {
    pub inserts: Vec<Insert>,
    pub compactions: Vec<Compaction>,
}

impl StateProjection {
    pub fn insert(collection: &'static str, document: Document) -> Self {
        Self {
            inserts: vec![Insert {
                collection,
                document,
            }],
            compactions: Vec::new(),
        }
    }

    pub fn with_compaction(mut self, compaction: Compaction) -> Self {
        self.compactions.push(compaction);
        self
    }
}

/// A domain's predicate/builder pair plus its collection and index
/// declarations.
pub trait DomainHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this state key belongs to the domain. Keys must never match
    /// more than one registered domain; ambiguity is an upstream contract
    /// violation the classifier does not resolve.
    fn matches(&self, key: &StateKey) -> bool;

    /// Builds the documents (and compactions) for a matched state. Pure:
    /// the same state always yields identical documents.
    fn project(&self, state: &State, block: &BlockRef<'_>) -> Result<StateProjection, EngineError>;

    /// Collections this domain writes, in commit order.
    fn collections(&self) -> &'static [&'static str];

    /// Registers the compound indexes this domain's query shapes need.
    fn register_indexes(&self, registry: &mut IndexRegistry);
}

/// Ordered set of domain handlers, built once at startup and passed by
/// reference to the components that need it.
pub struct DomainRegistry {
    handlers: Vec<Box<dyn DomainHandler>>,
}

impl DomainRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// The standard domain set in classification order.
    pub fn standard() -> Self {
        Self::empty()
            .with_handler(Box::new(currency::CurrencyHandler))
            .with_handler(Box::new(storage::StorageHandler))
            .with_handler(Box::new(credential::CredentialHandler))
            .with_handler(Box::new(nft::NftHandler))
            .with_handler(Box::new(timestamp::TimestampHandler))
            .with_handler(Box::new(prescription::PrescriptionHandler))
    }

    pub fn with_handler(mut self, handler: Box<dyn DomainHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// First handler whose predicate accepts the key.
    pub fn classify(&self, key: &StateKey) -> Option<&dyn DomainHandler> {
        self.handlers
            .iter()
            .map(Box::as_ref)
            .find(|handler| handler.matches(key))
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn DomainHandler> {
        self.handlers.iter().map(Box::as_ref)
    }

    /// Domain collections in commit order.
    pub fn collections(&self) -> Vec<&'static str> {
        self.handlers
            .iter()
            .flat_map(|handler| handler.collections().iter().copied())
            .collect()
    }

    /// Full index registry: block/operation defaults plus every domain's
    /// declarations.
    pub fn index_registry(&self) -> IndexRegistry {
        let mut registry = IndexRegistry::new();
        crate::block::register_indexes(&mut registry);
        for handler in &self.handlers {
            handler.register_indexes(&mut registry);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_classification_is_deterministic() {
        let registry = DomainRegistry::standard();

        let storage_key = StateKey::new("storage:C1alpha:design");
        assert_eq!(registry.classify(&storage_key).unwrap().name(), "storage");

        let account_key = StateKey::new("addr0001:account");
        assert_eq!(registry.classify(&account_key).unwrap().name(), "currency");

        let unknown = StateKey::new("exotic:C1alpha:design");
        assert!(registry.classify(&unknown).is_none());
    }

    #[test]
    fn test_compaction_dedup_key_is_stable() {
        let a = Compaction {
            collection: "digest_nft",
            filter: vec![("contract", Value::from("C1alpha")), ("nft_idx", Value::from(3u64))],
        };
        let b = a.clone();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_registry_collections_follow_handler_order() {
        let registry = DomainRegistry::standard();
        let collections = registry.collections();
        let currency_pos = collections
            .iter()
            .position(|c| *c == currency::COL_CURRENCY)
            .unwrap();
        let storage_pos = collections
            .iter()
            .position(|c| *c == storage::COL_STORAGE)
            .unwrap();
        assert!(currency_pos < storage_pos);
    }
}
