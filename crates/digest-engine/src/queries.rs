//! Shared read-query helpers.
//!
//! Every "current value" lookup sorts by height descending and takes the
//! first match. History queries apply the `offset` height as a strict bound
//! (`>` forward, `<` reverse) and cap `limit` at [`MAX_LIMIT`].

use digest_store::{DocumentStore, Filter, HeightRange, OpContext, Query, SortOrder, StoreError};
use digest_store::Document;
use shared_types::Height;

/// Server-enforced ceiling on page sizes.
pub const MAX_LIMIT: u64 = 600;

/// Latest document matching the filter.
pub async fn latest(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    collection: &str,
    filter: Filter,
) -> Result<Option<Document>, StoreError> {
    store.find_one(ctx, collection, &Query::latest(filter)).await
}

/// Height-paginated history scan.
///
/// Forward (`reverse == false`): ascending heights strictly above `offset`.
/// Reverse: descending heights strictly below `offset`.
pub async fn history(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    collection: &str,
    filter: Filter,
    offset: Option<u64>,
    reverse: bool,
    limit: u64,
) -> Result<Vec<Document>, StoreError> {
    let height = match (offset, reverse) {
        (None, _) => HeightRange::Any,
        (Some(o), false) => HeightRange::Above(Height::new(o)),
        (Some(o), true) => HeightRange::Below(Height::new(o)),
    };
    let sort = if reverse {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    };
    let query = Query {
        filter,
        height,
        sort,
        limit: Some(limit.min(MAX_LIMIT).max(1)),
    };
    store.find(ctx, collection, &query).await
}
