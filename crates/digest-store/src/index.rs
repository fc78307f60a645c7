//! Declarative secondary-index provisioning.
//!
//! Each domain registers the compound indexes its query shapes need, keyed
//! by collection. The registry is built once at startup and handed to
//! [`crate::DocumentStore::ensure_indexes`]; creation is idempotent by index
//! name. A missing registration is a latent performance bug, not a
//! correctness one.

use std::collections::BTreeMap;

/// Prefix shared by every provisioned index name.
pub const INDEX_PREFIX: &str = "digest_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDirection {
    Ascending,
    Descending,
}

/// One field of a compound index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub direction: IndexDirection,
}

/// A named compound index over one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<IndexKey>,
}

impl IndexSpec {
    /// Builds a spec, prefixing the name with [`INDEX_PREFIX`].
    pub fn new(name: &str, keys: &[(&str, IndexDirection)]) -> Self {
        Self {
            name: format!("{INDEX_PREFIX}{name}"),
            keys: keys
                .iter()
                .map(|(field, direction)| IndexKey {
                    field: (*field).to_string(),
                    direction: *direction,
                })
                .collect(),
        }
    }
}

/// Collection name → required index specs.
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    by_collection: BTreeMap<String, Vec<IndexSpec>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds specs for a collection. Specs whose name is already registered
    /// for that collection are ignored.
    pub fn register(&mut self, collection: &str, specs: Vec<IndexSpec>) {
        let entry = self.by_collection.entry(collection.to_string()).or_default();
        for spec in specs {
            if !entry.iter().any(|existing| existing.name == spec.name) {
                entry.push(spec);
            }
        }
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.by_collection.keys().map(String::as_str)
    }

    pub fn specs(&self, collection: &str) -> &[IndexSpec] {
        self.by_collection
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_collection.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_collection.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_dedups_by_name() {
        let mut registry = IndexRegistry::new();
        let spec = IndexSpec::new("balance", &[("address", IndexDirection::Ascending)]);
        registry.register("digest_balance", vec![spec.clone()]);
        registry.register("digest_balance", vec![spec]);
        assert_eq!(registry.specs("digest_balance").len(), 1);
    }

    #[test]
    fn test_names_are_prefixed() {
        let spec = IndexSpec::new("account", &[("address", IndexDirection::Ascending)]);
        assert_eq!(spec.name, "digest_account");
    }
}
