//! Cursor pagination tests
//!
//! Walk every ordering page by page against the in-memory store and check that
//! the concatenation equals the unpaginated result.

use spotlist::query::{Cursor, Page, Predicate, SortOrder, StoreQuery};
use spotlist::search::{
    BlankFilterPolicy, CollectionSearch, NearbySearch, PlaceSearch, SearchService, SearchSettings,
};
use spotlist::store::{ItemStore, MemoryStore};
use spotlist::types::{Catalog, ItemId, Point, SearchableItem, TextField, Viewport};
use spotlist::Error;
use std::collections::HashSet;
use std::sync::Arc;

const CATEGORIES: [&str; 3] = ["cafe", "bar", "food"];

fn seoul_viewport() -> Viewport {
    Viewport::new(Point::new(37.40, 126.80), Point::new(37.70, 127.20))
}

/// Random places around Seoul, with a few sharing exact coordinates
fn random_places(seed: u64, count: u64) -> Vec<SearchableItem> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut places: Vec<SearchableItem> = (1..=count)
        .map(|id| {
            let lat = 37.45 + rng.f64() * 0.2;
            let lng = 126.85 + rng.f64() * 0.3;
            SearchableItem::new(id)
                .with_point(Point::new(lat, lng))
                .with_category(CATEGORIES[rng.usize(..CATEGORIES.len())])
                .with_field(TextField::Name, format!("place {}", id))
        })
        .collect();

    // Stack every tenth place on top of the first one to force distance ties
    if let Some(anchor) = places.first().and_then(|p| p.point) {
        for place in places.iter_mut().skip(9).step_by(10) {
            place.point = Some(anchor);
        }
    }
    places
}

async fn service_with(places: Vec<SearchableItem>, settings: SearchSettings) -> SearchService {
    let store = MemoryStore::new(CATEGORIES);
    store.upsert(Catalog::Places, places).await.unwrap();
    SearchService::new(Arc::new(store), settings)
}

async fn walk_places(
    service: &SearchService,
    origin: Point,
    category: Option<&str>,
    limit: usize,
) -> Vec<ItemId> {
    let mut ids = Vec::new();
    let mut cursor: Option<Cursor> = None;

    loop {
        let page = service
            .search_places(PlaceSearch {
                viewport: Some(seoul_viewport()),
                region: None,
                origin,
                category: category.map(str::to_string),
                keyword: None,
                // Cursors travel through their token form
                cursor: cursor.map(|c| c.encode().parse().unwrap()),
                limit: Some(limit),
            })
            .await
            .unwrap();

        assert!(page.len() <= limit);
        ids.extend(page.ids());
        match page.next_cursor {
            Some(next) => {
                assert_eq!(page.len(), limit, "non-final page must be full");
                cursor = Some(next);
            }
            None => break,
        }
    }
    ids
}

async fn full_distance_order(service: &SearchService, origin: Point, category: Option<&str>) -> Vec<ItemId> {
    let mut predicate = vec![Predicate::InViewport(seoul_viewport())];
    if let Some(category) = category {
        predicate.push(Predicate::CategoryEq(category.to_string()));
    }
    service
        .store()
        .fetch(&StoreQuery {
            catalog: Catalog::Places,
            predicate: Predicate::And(predicate),
            order: SortOrder::DistanceAsc { origin },
            limit: None,
        })
        .await
        .unwrap()
        .iter()
        .map(|row| row.id())
        .collect()
}

#[tokio::test]
async fn test_distance_pages_cover_full_order() {
    let service = service_with(random_places(7, 57), SearchSettings::default()).await;
    let origin = Point::new(37.55, 126.98);
    let expected = full_distance_order(&service, origin, None).await;
    assert_eq!(expected.len(), 57);

    for limit in [1, 2, 5, 8, 57, 100] {
        let walked = walk_places(&service, origin, None, limit).await;
        assert_eq!(walked, expected, "limit {}", limit);
    }
}

#[tokio::test]
async fn test_distance_pages_with_category_filter() {
    let service = service_with(random_places(11, 40), SearchSettings::default()).await;
    let origin = Point::new(37.50, 127.05);

    for category in CATEGORIES {
        let expected = full_distance_order(&service, origin, Some(category)).await;
        let walked = walk_places(&service, origin, Some(category), 3).await;
        assert_eq!(walked, expected, "category {}", category);

        let unique: HashSet<ItemId> = walked.iter().copied().collect();
        assert_eq!(unique.len(), walked.len());
    }
}

#[tokio::test]
async fn test_ties_split_across_pages_by_id() {
    let shared = Point::new(37.56, 126.97);
    let places = vec![
        SearchableItem::new(5).with_point(shared).with_category("cafe"),
        SearchableItem::new(3).with_point(shared).with_category("cafe"),
        SearchableItem::new(9)
            .with_point(Point::new(37.57, 126.97))
            .with_category("cafe"),
        SearchableItem::new(1)
            .with_point(Point::new(37.58, 126.97))
            .with_category("cafe"),
    ];
    let service = service_with(places, SearchSettings::default()).await;
    let origin = Point::new(37.55, 126.97);

    let first = service
        .search_places(PlaceSearch {
            viewport: Some(seoul_viewport()),
            region: None,
            origin,
            category: None,
            keyword: None,
            cursor: None,
            limit: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(first.ids(), vec![3]);

    let second = service
        .search_places(PlaceSearch {
            viewport: Some(seoul_viewport()),
            region: None,
            origin,
            category: None,
            keyword: None,
            cursor: first.next_cursor,
            limit: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(second.ids(), vec![5, 9]);

    let third = service
        .search_places(PlaceSearch {
            viewport: Some(seoul_viewport()),
            region: None,
            origin,
            category: None,
            keyword: None,
            cursor: second.next_cursor,
            limit: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(third.ids(), vec![1]);
    assert!(!third.has_next());
}

#[tokio::test]
async fn test_boundary_trim() {
    let places: Vec<SearchableItem> = (1..=4)
        .map(|id| {
            SearchableItem::new(id)
                .with_point(Point::new(37.5 + id as f64 * 0.01, 127.0))
                .with_category("bar")
        })
        .collect();
    let service = service_with(places, SearchSettings::default()).await;

    let search = |limit| PlaceSearch {
        viewport: Some(seoul_viewport()),
        region: None,
        origin: Point::new(37.5, 127.0),
        category: None,
        keyword: None,
        cursor: None,
        limit: Some(limit),
    };

    let exact = service.search_places(search(4)).await.unwrap();
    assert_eq!(exact.len(), 4);
    assert!(exact.next_cursor.is_none());

    let short = service.search_places(search(3)).await.unwrap();
    assert_eq!(short.ids(), vec![1, 2, 3]);
    let cursor = short.next_cursor.unwrap();
    assert_eq!(cursor.last_id, 3);
}

#[tokio::test]
async fn test_nearby_radius_pages_and_exclusion() {
    let service = service_with(random_places(23, 60), SearchSettings::default()).await;
    let origin = Point::new(37.55, 127.0);

    let mut ids = Vec::new();
    let mut cursor = None;
    loop {
        let page: Page = service
            .search_nearby(NearbySearch {
                origin,
                radius_km: Some(6.0),
                exclude_id: Some(1),
                category: None,
                keyword: None,
                cursor,
                limit: Some(4),
            })
            .await
            .unwrap();
        ids.extend(page.ids());
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    let expected: Vec<ItemId> = service
        .store()
        .fetch(&StoreQuery {
            catalog: Catalog::Places,
            predicate: Predicate::And(vec![
                Predicate::WithinRadius {
                    origin,
                    radius_km: 6.0,
                },
                Predicate::ExcludeId(1),
            ]),
            order: SortOrder::DistanceAsc { origin },
            limit: None,
        })
        .await
        .unwrap()
        .iter()
        .map(|row| row.id())
        .collect();

    assert_eq!(ids, expected);
    assert!(!ids.contains(&1));
}

#[tokio::test]
async fn test_cursor_bound_to_origin() {
    let service = service_with(random_places(3, 20), SearchSettings::default()).await;

    let page = service
        .search_places(PlaceSearch {
            viewport: Some(seoul_viewport()),
            region: None,
            origin: Point::new(37.55, 126.98),
            category: None,
            keyword: None,
            cursor: None,
            limit: Some(5),
        })
        .await
        .unwrap();

    let moved = service
        .search_places(PlaceSearch {
            viewport: Some(seoul_viewport()),
            region: None,
            origin: Point::new(37.60, 127.10),
            category: None,
            keyword: None,
            cursor: page.next_cursor,
            limit: Some(5),
        })
        .await;
    assert!(matches!(moved, Err(Error::CursorOriginMismatch)));
}

#[tokio::test]
async fn test_collection_cursor_rejected_by_place_search() {
    let service = service_with(random_places(5, 5), SearchSettings::default()).await;
    let result = service
        .search_places(PlaceSearch {
            viewport: Some(seoul_viewport()),
            region: None,
            origin: Point::new(37.55, 126.98),
            category: None,
            keyword: None,
            cursor: Some(Cursor::for_id(10, &SortOrder::IdDesc)),
            limit: None,
        })
        .await;
    assert!(matches!(result, Err(Error::InvalidCursor(_))));
}

async fn collection_service(settings: SearchSettings) -> SearchService {
    let store = MemoryStore::new(CATEGORIES);
    let collections: Vec<SearchableItem> = (1..=13)
        .map(|id| {
            let item = SearchableItem::new(id)
                .with_field(TextField::Title, format!("Course {}", id))
                .with_field(TextField::District, if id % 2 == 0 { "Mapo-gu" } else { "Jongno-gu" });
            if id % 3 == 0 {
                item.with_category("bar")
            } else {
                item.with_category("cafe")
            }
        })
        .collect();
    store.upsert(Catalog::Collections, collections).await.unwrap();
    SearchService::new(Arc::new(store), settings)
}

async fn walk_collections(
    service: &SearchService,
    keyword: Option<&str>,
    category: Option<&str>,
) -> Vec<ItemId> {
    let mut ids = Vec::new();
    let mut cursor = None;
    loop {
        let page = service
            .search_collections(CollectionSearch {
                keyword: keyword.map(str::to_string),
                category: category.map(str::to_string),
                cursor,
                limit: None,
            })
            .await
            .unwrap();
        assert!(page.len() <= service.settings().collection_page_size);
        ids.extend(page.ids());
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }
    ids
}

#[tokio::test]
async fn test_collections_newest_first() {
    let service = collection_service(SearchSettings::default()).await;

    let all = walk_collections(&service, None, None).await;
    assert_eq!(all, (1..=13).rev().collect::<Vec<_>>());

    let mapo = walk_collections(&service, Some("MAPO"), None).await;
    assert_eq!(mapo, vec![12, 10, 8, 6, 4, 2]);

    let bars = walk_collections(&service, None, Some("bar")).await;
    assert_eq!(bars, vec![12, 9, 6, 3]);

    let both = walk_collections(&service, Some("mapo"), Some(" bar ")).await;
    assert_eq!(both, vec![12, 6]);
}

#[tokio::test]
async fn test_collection_pages_survive_insertions() {
    let service = collection_service(SearchSettings::default()).await;

    let first = service
        .search_collections(CollectionSearch::default())
        .await
        .unwrap();
    assert_eq!(first.ids(), vec![13, 12, 11, 10, 9, 8]);

    // A newer collection does not shift the next page
    service
        .store()
        .upsert(
            Catalog::Collections,
            vec![SearchableItem::new(14).with_category("cafe")],
        )
        .await
        .unwrap();

    let second = service
        .search_collections(CollectionSearch {
            cursor: first.next_cursor,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second.ids(), vec![7, 6, 5, 4, 3, 2]);
}

#[tokio::test]
async fn test_blank_filter_policy() {
    let browse = collection_service(SearchSettings::default()).await;
    let page = browse
        .search_collections(CollectionSearch {
            keyword: Some("   ".to_string()),
            category: Some(String::new()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 6);

    let strict = collection_service(SearchSettings {
        blank_filter: BlankFilterPolicy::RequireFilter,
        ..Default::default()
    })
    .await;
    let result = strict
        .search_collections(CollectionSearch::default())
        .await;
    assert!(matches!(result, Err(Error::MissingFilter)));
}

#[tokio::test]
async fn test_concurrent_first_pages_agree() {
    let service = Arc::new(service_with(random_places(31, 30), SearchSettings::default()).await);
    let origin = Point::new(37.52, 126.93);

    let pages = futures::future::join_all((0..8).map(|_| {
        let service = service.clone();
        async move {
            service
                .search_places(PlaceSearch {
                    viewport: Some(seoul_viewport()),
                    region: None,
                    origin,
                    category: None,
                    keyword: None,
                    cursor: None,
                    limit: Some(7),
                })
                .await
                .unwrap()
        }
    }))
    .await;

    let first = pages[0].ids();
    assert_eq!(first.len(), 7);
    for page in &pages {
        assert_eq!(page.ids(), first);
        assert_eq!(page.next_cursor, pages[0].next_cursor);
    }
}
