//! Query model for the document store.
//!
//! Queries are equality filters over denormalized fields plus an optional
//! height bound, sorted by height. "Current value" lookups sort descending
//! and take the first row; history scans bound the height strictly above or
//! below an offset depending on direction.

use serde_json::Value;
use shared_types::Height;

use crate::document::{Document, FIELD_HEIGHT};

/// Conjunction of field equality clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}

/// Bound on the `height` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeightRange {
    /// No bound.
    #[default]
    Any,
    /// Strictly above: `height > h`. Forward history pagination.
    Above(Height),
    /// Strictly below: `height < h`. Reverse history pagination.
    Below(Height),
    /// At or below: `height <= h`. Compaction deletes.
    AtOrBelow(Height),
}

impl HeightRange {
    pub fn matches(&self, height: Height) -> bool {
        match self {
            HeightRange::Any => true,
            HeightRange::Above(h) => height > *h,
            HeightRange::Below(h) => height < *h,
            HeightRange::AtOrBelow(h) => height <= *h,
        }
    }

    pub fn matches_doc(&self, doc: &Document) -> bool {
        match doc.u64_field(FIELD_HEIGHT) {
            Some(h) => self.matches(Height::new(h)),
            // Documents without a height only pass the unbounded range.
            None => matches!(self, HeightRange::Any),
        }
    }
}

/// Sort direction over the `height` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A read against one collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub filter: Filter,
    pub height: HeightRange,
    pub sort: SortOrder,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Latest-row query: sort by height descending, first match wins.
    pub fn latest(filter: Filter) -> Self {
        Self {
            filter,
            height: HeightRange::Any,
            sort: SortOrder::Descending,
            limit: Some(1),
        }
    }

    pub fn height(mut self, range: HeightRange) -> Self {
        self.height = range;
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(contract: &str, height: u64) -> Document {
        let mut d = Document::new();
        d.set("contract", contract);
        d.set(FIELD_HEIGHT, height);
        d
    }

    #[test]
    fn test_filter_matches_all_clauses() {
        let f = Filter::new().eq("contract", "C1a").eq("data_key", "k");
        let mut d = doc("C1a", 1);
        assert!(!f.matches(&d));
        d.set("data_key", "k");
        assert!(f.matches(&d));
    }

    #[test]
    fn test_height_range_bounds_are_strict() {
        let d = doc("C1a", 10);
        assert!(!HeightRange::Above(Height::new(10)).matches_doc(&d));
        assert!(HeightRange::Above(Height::new(9)).matches_doc(&d));
        assert!(!HeightRange::Below(Height::new(10)).matches_doc(&d));
        assert!(HeightRange::AtOrBelow(Height::new(10)).matches_doc(&d));
    }
}
