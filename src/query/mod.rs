//! Query construction and cursor pagination
//!
//! - [`predicate`]: filter tree built from viewport, category, keyword, radius and cursor
//! - [`cursor`]: opaque continuation token
//! - [`paginator`]: overflow-fetch trim and next-cursor derivation
//! - [`sql`]: pushdown rendering of a [`StoreQuery`] for relational stores

use serde::{Deserialize, Serialize};

use crate::geo::DistanceLabel;
use crate::types::{Catalog, ItemId, Point, SearchableItem};

pub mod cursor;
pub mod paginator;
pub mod predicate;
pub mod sql;

pub use cursor::{Cursor, CursorRank};
pub use paginator::CursorPaginator;
pub use predicate::{Predicate, PredicateBuilder};

/// Ordering of a paginated query. Ties are always broken by id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortOrder {
    /// Nearest first from `origin`, then id ascending
    DistanceAsc { origin: Point },
    /// Newest first
    IdDesc,
    /// Oldest first
    IdAsc,
}

impl SortOrder {
    pub fn origin(&self) -> Option<&Point> {
        match self {
            SortOrder::DistanceAsc { origin } => Some(origin),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SortOrder::DistanceAsc { .. } => "distance_asc",
            SortOrder::IdDesc => "id_desc",
            SortOrder::IdAsc => "id_asc",
        }
    }
}

/// One ordered, filtered read against a store
#[derive(Debug, Clone)]
pub struct StoreQuery {
    pub catalog: Catalog,
    pub predicate: Predicate,
    pub order: SortOrder,
    /// `None` reads every matching row
    pub limit: Option<usize>,
}

/// A matching item as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub item: SearchableItem,
    /// Distance from the query origin, set for distance orderings
    pub distance_km: Option<f64>,
}

impl Row {
    pub fn id(&self) -> ItemId {
        self.item.id
    }
}

/// One page of results. `next_cursor` is `None` iff nothing followed at fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub rows: Vec<Row>,
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.rows.iter().map(Row::id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Serialized page as handed to API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse {
    pub items: Vec<PageItem>,
    pub next_cursor: Option<String>,
    pub has_next: bool,
}

/// Single page entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageItem {
    pub id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<DistanceLabel>,
    pub item: SearchableItem,
}

impl From<Page> for PageResponse {
    fn from(page: Page) -> Self {
        let next_cursor = page.next_cursor.as_ref().map(Cursor::encode);
        let has_next = next_cursor.is_some();

        let items = page
            .rows
            .into_iter()
            .map(|row| PageItem {
                id: row.item.id,
                distance_km: row.distance_km,
                distance: row.distance_km.map(DistanceLabel::from_km),
                item: row.item,
            })
            .collect();

        Self {
            items,
            next_cursor,
            has_next,
        }
    }
}
