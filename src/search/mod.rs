//! Ranked search service
//!
//! Validates requests, builds predicates and drives [`CursorPaginator`] for the
//! three paginated query shapes:
//!
//! - place search ranked by distance from the user, narrowed by any of a
//!   viewport, a district or neighborhood, a category and a keyword
//! - nearby search inside a radius, ranked by distance
//! - collection search by keyword/category, newest first
//!
//! plus the un-paginated map markers and the popularity leaderboard.
//! All validation happens before the store is touched.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::query::{Cursor, CursorPaginator, Page, PredicateBuilder, SortOrder, StoreQuery};
use crate::store::ItemStore;
use crate::types::{Catalog, ItemId, Point, Viewport};
use crate::{Error, Result};

pub mod popular;

pub use popular::{PopularEntry, PopularityRanker};

/// What a place or collection query with no keyword, category, viewport or region means
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlankFilterPolicy {
    /// Match every item
    #[default]
    BrowseAll,
    /// Reject with [`Error::MissingFilter`]
    RequireFilter,
}

/// Runtime search settings
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    pub collection_page_size: usize,
    pub popular_limit: usize,
    pub nearby_radius_km: f64,
    pub blank_filter: BlankFilterPolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 100,
            collection_page_size: 6,
            popular_limit: 8,
            nearby_radius_km: 1.0,
            blank_filter: BlankFilterPolicy::BrowseAll,
        }
    }
}

/// Places nearest to `origin` first. Without a viewport or region this is the
/// related-places search over the whole catalog.
#[derive(Debug, Clone)]
pub struct PlaceSearch {
    pub viewport: Option<Viewport>,
    /// District or neighborhood name
    pub region: Option<String>,
    pub origin: Point,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub cursor: Option<Cursor>,
    pub limit: Option<usize>,
}

/// Places within a radius of `origin`, nearest first
#[derive(Debug, Clone)]
pub struct NearbySearch {
    pub origin: Point,
    pub radius_km: Option<f64>,
    pub exclude_id: Option<ItemId>,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub cursor: Option<Cursor>,
    pub limit: Option<usize>,
}

/// Collections by keyword and/or category, newest first
#[derive(Debug, Clone, Default)]
pub struct CollectionSearch {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub cursor: Option<Cursor>,
    pub limit: Option<usize>,
}

/// Every place in a viewport and/or region, for map markers
#[derive(Debug, Clone, Default)]
pub struct MarkerQuery {
    pub viewport: Option<Viewport>,
    pub region: Option<String>,
    pub category: Option<String>,
}

/// Radius restriction for the leaderboard
#[derive(Debug, Clone, Copy)]
pub struct Proximity {
    pub origin: Point,
    pub radius_km: f64,
}

/// Top-N by save count
#[derive(Debug, Clone)]
pub struct PopularQuery {
    pub catalog: Catalog,
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub near: Option<Proximity>,
    pub exclude_id: Option<ItemId>,
    pub limit: Option<usize>,
}

impl PopularQuery {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            keyword: None,
            category: None,
            near: None,
            exclude_id: None,
            limit: None,
        }
    }
}

/// Map marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Marker {
    pub id: ItemId,
    pub latitude: f64,
    pub longitude: f64,
    /// The selected category, or the place's first category
    pub category: Option<String>,
}

/// Search service
pub struct SearchService {
    store: Arc<dyn ItemStore>,
    settings: SearchSettings,
}

impl SearchService {
    pub fn new(store: Arc<dyn ItemStore>, settings: SearchSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    /// Place search ranked by distance from the user's position
    pub async fn search_places(&self, request: PlaceSearch) -> Result<Page> {
        if let Some(viewport) = &request.viewport {
            viewport.validate()?;
        }
        request.origin.validate()?;
        let limit = self.resolve_limit(request.limit, self.settings.default_limit)?;
        let category = self.resolve_category(request.category).await?;

        let order = SortOrder::DistanceAsc {
            origin: request.origin,
        };
        if let Some(cursor) = &request.cursor {
            cursor.ensure_compatible(&order)?;
        }

        let builder = PredicateBuilder::new(Catalog::Places)
            .viewport(request.viewport)
            .region(request.region)
            .category(category)
            .keyword(request.keyword);
        self.check_blank(&builder)?;

        let predicate = builder.after(request.cursor.as_ref(), &order).build();

        CursorPaginator::fetch(self.store.as_ref(), Catalog::Places, predicate, order, limit).await
    }

    /// Radius search around a point, ranked by distance
    pub async fn search_nearby(&self, request: NearbySearch) -> Result<Page> {
        request.origin.validate()?;
        let radius_km = request.radius_km.unwrap_or(self.settings.nearby_radius_km);
        validate_radius(radius_km)?;
        let limit = self.resolve_limit(request.limit, self.settings.default_limit)?;
        let category = self.resolve_category(request.category).await?;

        let order = SortOrder::DistanceAsc {
            origin: request.origin,
        };
        if let Some(cursor) = &request.cursor {
            cursor.ensure_compatible(&order)?;
        }

        let predicate = PredicateBuilder::new(Catalog::Places)
            .radius(request.origin, radius_km)
            .category(category)
            .keyword(request.keyword)
            .exclude(request.exclude_id)
            .after(request.cursor.as_ref(), &order)
            .build();

        CursorPaginator::fetch(self.store.as_ref(), Catalog::Places, predicate, order, limit).await
    }

    /// Nearby search centred on a stored place, excluding the place itself
    pub async fn search_near_item(
        &self,
        id: ItemId,
        mut request: NearbySearch,
    ) -> Result<Page> {
        let place = self
            .store
            .get(Catalog::Places, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("place {}", id)))?;
        let origin = place
            .point
            .ok_or_else(|| Error::InvalidRequest(format!("place {} has no location", id)))?;

        request.origin = origin;
        request.exclude_id = Some(id);
        self.search_nearby(request).await
    }

    /// Keyword/category collection search, newest first
    pub async fn search_collections(&self, request: CollectionSearch) -> Result<Page> {
        let limit = self.resolve_limit(request.limit, self.settings.collection_page_size)?;
        let category = self.resolve_category(request.category).await?;

        let order = SortOrder::IdDesc;
        if let Some(cursor) = &request.cursor {
            cursor.ensure_compatible(&order)?;
        }

        let builder = PredicateBuilder::new(Catalog::Collections)
            .category(category)
            .keyword(request.keyword);

        self.check_blank(&builder)?;

        let predicate = builder.after(request.cursor.as_ref(), &order).build();

        CursorPaginator::fetch(
            self.store.as_ref(),
            Catalog::Collections,
            predicate,
            order,
            limit,
        )
        .await
    }

    /// Every place in a viewport and/or region, optionally restricted to one category
    pub async fn markers(&self, request: MarkerQuery) -> Result<Vec<Marker>> {
        if let Some(viewport) = &request.viewport {
            viewport.validate()?;
        }
        let region = crate::query::predicate::normalize_label(request.region);
        if request.viewport.is_none() && region.is_none() {
            return Err(Error::InvalidRequest(
                "markers need a viewport or a region".to_string(),
            ));
        }
        let category = self.resolve_category(request.category).await?;

        let predicate = PredicateBuilder::new(Catalog::Places)
            .viewport(request.viewport)
            .region(region)
            .category(category.clone())
            .build();

        let rows = self
            .store
            .fetch(&StoreQuery {
                catalog: Catalog::Places,
                predicate,
                order: SortOrder::IdAsc,
                limit: None,
            })
            .await?;

        let markers: Vec<Marker> = rows
            .into_iter()
            .filter_map(|row| {
                let point = row.item.point?;
                Some(Marker {
                    id: row.item.id,
                    latitude: point.latitude,
                    longitude: point.longitude,
                    category: category
                        .clone()
                        .or_else(|| row.item.primary_category().map(str::to_string)),
                })
            })
            .collect();

        tracing::debug!(count = markers.len(), "Resolved map markers");
        Ok(markers)
    }

    /// Top-N leaderboard by save count
    pub async fn search_popular(&self, request: PopularQuery) -> Result<Vec<PopularEntry>> {
        let limit = self.resolve_limit(request.limit, self.settings.popular_limit)?;
        let category = self.resolve_category(request.category).await?;

        let mut builder = PredicateBuilder::new(request.catalog)
            .category(category)
            .keyword(request.keyword)
            .exclude(request.exclude_id);

        if let Some(near) = request.near {
            near.origin.validate()?;
            validate_radius(near.radius_km)?;
            builder = builder.radius(near.origin, near.radius_km);
        }

        let counted = self
            .store
            .popularity(request.catalog, &builder.build())
            .await?;
        let entries = PopularityRanker::rank(counted, limit);

        tracing::debug!(
            catalog = %request.catalog,
            limit,
            returned = entries.len(),
            "Ranked popular items"
        );
        Ok(entries)
    }

    fn check_blank(&self, builder: &PredicateBuilder) -> Result<()> {
        if !builder.has_filters() && self.settings.blank_filter == BlankFilterPolicy::RequireFilter
        {
            tracing::debug!("Rejecting search without filters");
            return Err(Error::MissingFilter);
        }
        Ok(())
    }

    fn resolve_limit(&self, requested: Option<usize>, default: usize) -> Result<usize> {
        let limit = requested.unwrap_or(default);
        if limit == 0 || limit > self.settings.max_limit {
            return Err(Error::InvalidLimit(format!(
                "limit must be between 1 and {}, got {}",
                self.settings.max_limit, limit
            )));
        }
        Ok(limit)
    }

    /// Normalise and check against the closed taxonomy. Blank means no filter.
    async fn resolve_category(&self, category: Option<String>) -> Result<Option<String>> {
        let Some(category) = crate::query::predicate::normalize_label(category) else {
            return Ok(None);
        };

        let known = self.store.categories().await?;
        if !known.contains(&category) {
            tracing::debug!(%category, "Rejecting unknown category");
            return Err(Error::UnknownCategory(category));
        }
        Ok(Some(category))
    }
}

fn validate_radius(radius_km: f64) -> Result<()> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(Error::InvalidRequest(format!(
            "radius must be a positive number of kilometres, got {}",
            radius_km
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{SearchableItem, TextField};

    async fn service(settings: SearchSettings) -> SearchService {
        let store = MemoryStore::new(["cafe", "bar"]);
        store
            .upsert(
                Catalog::Collections,
                vec![
                    SearchableItem::new(1)
                        .with_category("cafe")
                        .with_field(TextField::Title, "Quiet cafes"),
                    SearchableItem::new(2)
                        .with_category("bar")
                        .with_field(TextField::Title, "Late bars"),
                ],
            )
            .await
            .unwrap();
        SearchService::new(Arc::new(store), settings)
    }

    #[tokio::test]
    async fn test_blank_filters_browse_all() {
        let service = service(SearchSettings::default()).await;
        let page = service
            .search_collections(CollectionSearch {
                keyword: Some("  ".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.ids(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_blank_filters_rejected_when_required() {
        let service = service(SearchSettings {
            blank_filter: BlankFilterPolicy::RequireFilter,
            ..Default::default()
        })
        .await;

        let result = service.search_collections(CollectionSearch::default()).await;
        assert!(matches!(result, Err(Error::MissingFilter)));

        let page = service
            .search_collections(CollectionSearch {
                category: Some("bar".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.ids(), vec![2]);
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let service = service(SearchSettings::default()).await;
        let result = service
            .search_collections(CollectionSearch {
                category: Some("karaoke".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(Error::UnknownCategory(c)) if c == "karaoke"));
    }

    #[tokio::test]
    async fn test_limit_bounds() {
        let service = service(SearchSettings {
            max_limit: 10,
            ..Default::default()
        })
        .await;

        for limit in [0, 11] {
            let result = service
                .search_collections(CollectionSearch {
                    limit: Some(limit),
                    ..Default::default()
                })
                .await;
            assert!(matches!(result, Err(Error::InvalidLimit(_))));
        }
    }

    #[tokio::test]
    async fn test_invalid_viewport_rejected() {
        let service = service(SearchSettings::default()).await;
        let result = service
            .search_places(PlaceSearch {
                viewport: Some(Viewport::new(Point::new(10.0, 10.0), Point::new(5.0, 5.0))),
                region: None,
                origin: Point::new(7.0, 7.0),
                category: None,
                keyword: None,
                cursor: None,
                limit: None,
            })
            .await;
        assert!(matches!(result, Err(Error::InvalidViewport(_))));
    }

    async fn with_places(service: SearchService) -> SearchService {
        let place = |id: ItemId, lng: f64, name: &str, district: &str, category: &str| {
            SearchableItem::new(id)
                .with_point(Point::new(37.55, lng))
                .with_category(category)
                .with_field(TextField::Name, name)
                .with_field(TextField::District, district)
        };
        service
            .store()
            .upsert(
                Catalog::Places,
                vec![
                    place(10, 126.93, "Roastery One", "Mapo-gu", "cafe"),
                    place(11, 126.905, "Roastery Two", "Jongno-gu", "cafe"),
                    place(12, 126.95, "Roastery Bar", "Mapo-gu", "bar"),
                    place(13, 126.90, "Night Owl", "Mapo-gu", "bar"),
                    place(14, 127.40, "Roastery Far", "Gangnam-gu", "cafe"),
                ],
            )
            .await
            .unwrap();
        service
    }

    fn around_user() -> PlaceSearch {
        PlaceSearch {
            viewport: None,
            region: None,
            origin: Point::new(37.55, 126.92),
            category: None,
            keyword: None,
            cursor: None,
            limit: Some(2),
        }
    }

    async fn all_pages(service: &SearchService, mut request: PlaceSearch) -> Vec<ItemId> {
        let mut ids = Vec::new();
        loop {
            let page = service.search_places(request.clone()).await.unwrap();
            ids.extend(page.ids());
            match page.next_cursor {
                Some(cursor) => request.cursor = Some(cursor),
                None => return ids,
            }
        }
    }

    #[tokio::test]
    async fn test_keyword_place_search_without_viewport_ranks_whole_catalog() {
        let service = with_places(service(SearchSettings::default()).await).await;
        let request = PlaceSearch {
            keyword: Some("roastery".to_string()),
            ..around_user()
        };

        let first = service.search_places(request.clone()).await.unwrap();
        assert_eq!(first.ids(), vec![10, 11]);
        assert!(first.has_next());

        assert_eq!(all_pages(&service, request).await, vec![10, 11, 12, 14]);
    }

    #[tokio::test]
    async fn test_region_search_pages_by_distance() {
        let service = with_places(service(SearchSettings::default()).await).await;
        let request = PlaceSearch {
            region: Some(" mapo-GU ".to_string()),
            ..around_user()
        };
        assert_eq!(all_pages(&service, request.clone()).await, vec![10, 13, 12]);

        let bars = PlaceSearch {
            category: Some("bar".to_string()),
            ..request
        };
        assert_eq!(all_pages(&service, bars).await, vec![13, 12]);
    }

    #[tokio::test]
    async fn test_place_search_without_filters_follows_blank_policy() {
        let browse = with_places(service(SearchSettings::default()).await).await;
        assert_eq!(all_pages(&browse, around_user()).await, vec![10, 11, 13, 12, 14]);

        let strict = with_places(
            service(SearchSettings {
                blank_filter: BlankFilterPolicy::RequireFilter,
                ..Default::default()
            })
            .await,
        )
        .await;
        let result = strict.search_places(around_user()).await;
        assert!(matches!(result, Err(Error::MissingFilter)));
    }

    #[tokio::test]
    async fn test_region_markers() {
        let service = with_places(service(SearchSettings::default()).await).await;
        let markers = service
            .markers(MarkerQuery {
                region: Some("Mapo-gu".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<ItemId> = markers.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![10, 12, 13]);
        assert_eq!(markers[1].category.as_deref(), Some("bar"));

        let result = service.markers(MarkerQuery::default()).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_collection_filters_may_match_different_linked_places() {
        let service = service(SearchSettings::default()).await;
        service
            .store()
            .upsert(
                Catalog::Collections,
                vec![SearchableItem::new(3)
                    .with_category("cafe")
                    .with_category("bar")
                    .with_field(TextField::Title, "Weekend")
                    .with_field(TextField::Address, "12 Espresso Lane")
                    .with_field(TextField::Address, "3 Pub Street")],
            )
            .await
            .unwrap();

        // "pub" comes from one linked place and "cafe" from another
        let page = service
            .search_collections(CollectionSearch {
                keyword: Some("pub".to_string()),
                category: Some("cafe".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.ids(), vec![3]);
    }

    #[tokio::test]
    async fn test_non_positive_radius_rejected() {
        let service = service(SearchSettings::default()).await;
        let result = service
            .search_nearby(NearbySearch {
                origin: Point::new(37.5, 127.0),
                radius_km: Some(0.0),
                exclude_id: None,
                category: None,
                keyword: None,
                cursor: None,
                limit: None,
            })
            .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}
