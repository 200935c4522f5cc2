//! Item store abstraction
//!
//! The engine only reads through [`ItemStore::fetch`], [`ItemStore::popularity`]
//! and [`ItemStore::categories`]; the write methods exist so a store can be
//! populated through the same handle the server holds.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::query::{Predicate, Row, StoreQuery};
use crate::types::{Catalog, ItemId, SearchableItem, UserId};
use crate::Result;

pub mod memory;

pub use memory::MemoryStore;

/// Store backend trait
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Filter, order and limit. For distance orderings each row carries the
    /// distance the store ordered by.
    async fn fetch(&self, query: &StoreQuery) -> Result<Vec<Row>>;

    /// Get a single item
    async fn get(&self, catalog: Catalog, id: ItemId) -> Result<Option<SearchableItem>>;

    /// Every item matching `predicate` with its save count (0 when never saved)
    async fn popularity(
        &self,
        catalog: Catalog,
        predicate: &Predicate,
    ) -> Result<Vec<(SearchableItem, u64)>>;

    /// Closed category taxonomy
    async fn categories(&self) -> Result<BTreeSet<String>>;

    /// Insert or replace items, returning how many were written
    async fn upsert(&self, catalog: Catalog, items: Vec<SearchableItem>) -> Result<usize>;

    /// Delete an item and its saves
    async fn remove(&self, catalog: Catalog, id: ItemId) -> Result<bool>;

    /// Record a save; false if the user had already saved the item
    async fn mark(&self, catalog: Catalog, id: ItemId, user: UserId) -> Result<bool>;

    /// Remove a save; false if there was none
    async fn unmark(&self, catalog: Catalog, id: ItemId, user: UserId) -> Result<bool>;
}
