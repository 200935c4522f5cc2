//! Cursor pagination with overflow-fetch trim
//!
//! One store round-trip per page: ask for `limit + 1` ordered rows, and if the
//! extra row arrives, drop it and report that a next page exists. The next
//! cursor comes from the last *retained* row (index `limit - 1`), never from the
//! dropped overflow row.

use crate::geo::haversine_km;
use crate::query::{Cursor, Page, Predicate, Row, SortOrder, StoreQuery};
use crate::store::ItemStore;
use crate::types::Catalog;
use crate::{Error, Result};

/// Executes paginated queries against an [`ItemStore`]
pub struct CursorPaginator;

impl CursorPaginator {
    /// Fetch one page. Store failures are returned unchanged and never retried.
    pub async fn fetch(
        store: &dyn ItemStore,
        catalog: Catalog,
        predicate: Predicate,
        order: SortOrder,
        limit: usize,
    ) -> Result<Page> {
        if limit == 0 {
            return Err(Error::InvalidLimit("limit must be at least 1".to_string()));
        }

        let query = StoreQuery {
            catalog,
            predicate,
            order,
            limit: Some(limit.saturating_add(1)),
        };

        let mut rows = store.fetch(&query).await.map_err(|e| {
            tracing::warn!(catalog = %catalog, error = %e, "Store fetch failed");
            e
        })?;

        let has_next = rows.len() > limit;
        if has_next {
            rows.truncate(limit);
        }

        let next_cursor = match (has_next, rows.last()) {
            (true, Some(last)) => Some(Self::cursor_from_row(last, &order)?),
            _ => None,
        };

        tracing::debug!(
            catalog = %catalog,
            order = order.name(),
            limit,
            returned = rows.len(),
            has_next,
            "Fetched page"
        );

        Ok(Page { rows, next_cursor })
    }

    /// Derive the continuation cursor from a retained row.
    ///
    /// For distance orderings the store's own ordering value is used when it is
    /// present; otherwise the distance is recomputed with [`haversine_km`].
    pub fn cursor_from_row(row: &Row, order: &SortOrder) -> Result<Cursor> {
        match order {
            SortOrder::DistanceAsc { origin } => {
                let point = row.item.point.as_ref();
                let recomputed = point.map(|p| haversine_km(origin, p));

                let distance = match (row.distance_km, recomputed) {
                    (Some(stored), Some(local)) => {
                        if stored.to_bits() != local.to_bits() {
                            tracing::warn!(
                                id = row.item.id,
                                stored,
                                local,
                                "Store distance differs from local haversine; using store value"
                            );
                        }
                        stored
                    }
                    (Some(stored), None) => stored,
                    (None, Some(local)) => local,
                    (None, None) => {
                        return Err(Error::internal(format!(
                            "row {} has neither a point nor a distance",
                            row.item.id
                        )))
                    }
                };

                Ok(Cursor::for_distance(origin, distance, row.item.id))
            }
            order => Ok(Cursor::for_id(row.item.id, order)),
        }
    }
}
