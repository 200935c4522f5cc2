//! In-memory store
//!
//! Evaluates [`Predicate`] trees directly and ranks with [`haversine_km`], the
//! same function cursors are derived from.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tokio::sync::RwLock;

use crate::geo::haversine_km;
use crate::query::{Predicate, Row, SortOrder, StoreQuery};
use crate::types::{Catalog, ItemId, SearchableItem, UserId};
use crate::{Error, Result};

use super::ItemStore;

/// Items kept per catalog, ordered by id
pub struct MemoryStore {
    categories: BTreeSet<String>,
    items: RwLock<HashMap<Catalog, BTreeMap<ItemId, SearchableItem>>>,
    marks: DashMap<(Catalog, ItemId), HashSet<UserId>>,
}

/// On-disk seed file layout
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub places: Vec<SearchableItem>,
    pub collections: Vec<SearchableItem>,
    pub marks: Vec<SeedMark>,
}

#[derive(Debug, Deserialize)]
pub struct SeedMark {
    pub catalog: Catalog,
    pub id: ItemId,
    pub user: UserId,
}

impl MemoryStore {
    /// Create an empty store with a closed category taxonomy
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories = categories
            .into_iter()
            .map(|c| c.into().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            categories,
            items: RwLock::new(HashMap::new()),
            marks: DashMap::new(),
        }
    }

    /// Load items and marks from a JSON seed file
    pub async fn load_seed(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| Error::store(format!("failed to read seed {}: {}", path.display(), e)))?;
        let seed: SeedData = serde_json::from_slice(&raw)?;
        self.apply_seed(seed).await
    }

    pub async fn apply_seed(&self, seed: SeedData) -> Result<usize> {
        let mut loaded = self.upsert(Catalog::Places, seed.places).await?;
        loaded += self.upsert(Catalog::Collections, seed.collections).await?;
        for mark in seed.marks {
            self.mark(mark.catalog, mark.id, mark.user).await?;
        }

        tracing::info!(items = loaded, "Loaded seed data");
        Ok(loaded)
    }

    pub async fn len(&self, catalog: Catalog) -> usize {
        self.items
            .read()
            .await
            .get(&catalog)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, catalog: Catalog) -> bool {
        self.len(catalog).await == 0
    }

    fn validate_item(&self, item: &SearchableItem) -> Result<()> {
        if let Some(point) = &item.point {
            point.validate()?;
        }
        if let Some(unknown) = item
            .categories
            .iter()
            .find(|c| !self.categories.contains(c.as_str()))
        {
            return Err(Error::InvalidRequest(format!(
                "item {} has category '{}' outside the taxonomy",
                item.id, unknown
            )));
        }
        Ok(())
    }

    fn save_count(&self, catalog: Catalog, id: ItemId) -> u64 {
        self.marks
            .get(&(catalog, id))
            .map(|users| users.len() as u64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn fetch(&self, query: &StoreQuery) -> Result<Vec<Row>> {
        let items = self.items.read().await;
        let Some(catalog) = items.get(&query.catalog) else {
            return Ok(Vec::new());
        };

        let limit = query.limit.unwrap_or(usize::MAX);

        let rows = match &query.order {
            SortOrder::DistanceAsc { origin } => {
                let mut ranked: Vec<(f64, &SearchableItem)> = catalog
                    .values()
                    .filter(|item| query.predicate.matches(item))
                    .filter_map(|item| {
                        item.point
                            .as_ref()
                            .map(|point| (haversine_km(origin, point), item))
                    })
                    .collect();

                ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));

                ranked
                    .into_iter()
                    .take(limit)
                    .map(|(distance, item)| Row {
                        item: item.clone(),
                        distance_km: Some(distance),
                    })
                    .collect()
            }
            SortOrder::IdDesc => catalog
                .values()
                .rev()
                .filter(|item| query.predicate.matches(item))
                .take(limit)
                .map(|item| Row {
                    item: item.clone(),
                    distance_km: None,
                })
                .collect(),
            SortOrder::IdAsc => catalog
                .values()
                .filter(|item| query.predicate.matches(item))
                .take(limit)
                .map(|item| Row {
                    item: item.clone(),
                    distance_km: None,
                })
                .collect(),
        };

        Ok(rows)
    }

    async fn get(&self, catalog: Catalog, id: ItemId) -> Result<Option<SearchableItem>> {
        let items = self.items.read().await;
        Ok(items.get(&catalog).and_then(|c| c.get(&id)).cloned())
    }

    async fn popularity(
        &self,
        catalog: Catalog,
        predicate: &Predicate,
    ) -> Result<Vec<(SearchableItem, u64)>> {
        let items = self.items.read().await;
        let Some(entries) = items.get(&catalog) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .values()
            .filter(|item| predicate.matches(item))
            .map(|item| (item.clone(), self.save_count(catalog, item.id)))
            .collect())
    }

    async fn categories(&self) -> Result<BTreeSet<String>> {
        Ok(self.categories.clone())
    }

    async fn upsert(&self, catalog: Catalog, items: Vec<SearchableItem>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        // Validate everything before writing anything
        for item in &items {
            self.validate_item(item)?;
        }

        let count = items.len();
        let mut all = self.items.write().await;
        let entries = all.entry(catalog).or_default();
        for item in items {
            entries.insert(item.id, item);
        }

        tracing::debug!(catalog = %catalog, count, "Upserted items");
        Ok(count)
    }

    async fn remove(&self, catalog: Catalog, id: ItemId) -> Result<bool> {
        // Marks are cleared under the write guard so a concurrent `mark` cannot
        // land between the item going away and its saves being dropped.
        let mut items = self.items.write().await;
        let removed = items
            .get_mut(&catalog)
            .and_then(|entries| entries.remove(&id))
            .is_some();

        self.marks.remove(&(catalog, id));
        Ok(removed)
    }

    async fn mark(&self, catalog: Catalog, id: ItemId, user: UserId) -> Result<bool> {
        let items = self.items.read().await;
        if !items.get(&catalog).is_some_and(|c| c.contains_key(&id)) {
            return Err(Error::NotFound(format!("{} item {}", catalog, id)));
        }
        Ok(self.marks.entry((catalog, id)).or_default().insert(user))
    }

    async fn unmark(&self, catalog: Catalog, id: ItemId, user: UserId) -> Result<bool> {
        let key = (catalog, id);
        let removed = match self.marks.get_mut(&key) {
            Some(mut users) => users.remove(&user),
            None => false,
        };
        self.marks.remove_if(&key, |_, users| users.is_empty());
        Ok(removed)
    }
}
