//! API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::query::{Cursor, PageResponse};
use crate::search::{
    CollectionSearch, Marker, MarkerQuery, NearbySearch, PlaceSearch, PopularEntry, PopularQuery,
    Proximity,
};
use crate::types::{Catalog, ItemId, Point, SearchableItem, UserId, Viewport};
use crate::Error;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Map a library error onto an HTTP status
pub fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }
    (status, err.to_string())
}

/// Health check
pub async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let categories = state.store.categories().await.map_err(error_response)?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        categories: categories.len(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub categories: usize,
}

#[derive(Debug, Deserialize)]
pub struct PlaceSearchParams {
    pub sw_lat: Option<f64>,
    pub sw_lng: Option<f64>,
    pub ne_lat: Option<f64>,
    pub ne_lng: Option<f64>,
    /// District or neighborhood name
    pub region: Option<String>,
    pub user_lat: f64,
    pub user_lng: f64,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Places nearest to the user first, within the viewport or region when given
pub async fn search_places(
    State(state): State<AppState>,
    Query(params): Query<PlaceSearchParams>,
) -> ApiResult<PageResponse> {
    let request = PlaceSearch {
        viewport: parse_viewport(params.sw_lat, params.sw_lng, params.ne_lat, params.ne_lng)
            .map_err(error_response)?,
        region: params.region,
        origin: Point::new(params.user_lat, params.user_lng),
        category: params.category,
        keyword: params.keyword,
        cursor: parse_cursor(params.cursor).map_err(error_response)?,
        limit: parse_limit(params.limit).map_err(error_response)?,
    };

    let page = state
        .service
        .search_places(request)
        .await
        .map_err(error_response)?;
    Ok(Json(page.into()))
}

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Centre on a stored place instead of `lat`/`lng`
    pub near_id: Option<ItemId>,
    pub radius_km: Option<f64>,
    pub exclude_id: Option<ItemId>,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Places within a radius, nearest first
pub async fn search_nearby(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> ApiResult<PageResponse> {
    let mut request = NearbySearch {
        origin: Point::new(0.0, 0.0),
        radius_km: params.radius_km,
        exclude_id: params.exclude_id,
        category: params.category,
        keyword: params.keyword,
        cursor: parse_cursor(params.cursor).map_err(error_response)?,
        limit: parse_limit(params.limit).map_err(error_response)?,
    };

    let page = match (params.near_id, params.lat, params.lng) {
        (Some(id), _, _) => state.service.search_near_item(id, request).await,
        (None, Some(lat), Some(lng)) => {
            request.origin = Point::new(lat, lng);
            state.service.search_nearby(request).await
        }
        _ => Err(Error::InvalidRequest(
            "either near_id or both lat and lng must be provided".to_string(),
        )),
    }
    .map_err(error_response)?;

    Ok(Json(page.into()))
}

#[derive(Debug, Deserialize)]
pub struct MarkerParams {
    pub sw_lat: Option<f64>,
    pub sw_lng: Option<f64>,
    pub ne_lat: Option<f64>,
    pub ne_lng: Option<f64>,
    pub region: Option<String>,
    pub category: Option<String>,
}

/// All place markers in the viewport and/or region
pub async fn markers(
    State(state): State<AppState>,
    Query(params): Query<MarkerParams>,
) -> ApiResult<MarkersResponse> {
    let viewport = parse_viewport(params.sw_lat, params.sw_lng, params.ne_lat, params.ne_lng)
        .map_err(error_response)?;
    let markers = state
        .service
        .markers(MarkerQuery {
            viewport,
            region: params.region,
            category: params.category,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(MarkersResponse { markers }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkersResponse {
    pub markers: Vec<Marker>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionParams {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Collections by keyword/category, newest first
pub async fn search_collections(
    State(state): State<AppState>,
    Query(params): Query<CollectionParams>,
) -> ApiResult<PageResponse> {
    let request = CollectionSearch {
        keyword: params.keyword,
        category: params.category,
        cursor: parse_cursor(params.cursor).map_err(error_response)?,
        limit: parse_limit(params.limit).map_err(error_response)?,
    };

    let page = state
        .service
        .search_collections(request)
        .await
        .map_err(error_response)?;
    Ok(Json(page.into()))
}

#[derive(Debug, Deserialize)]
pub struct PopularParams {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub exclude_id: Option<ItemId>,
    pub limit: Option<i64>,
}

/// Most-saved items of a catalog
pub async fn popular(
    State(state): State<AppState>,
    Path(catalog): Path<String>,
    Query(params): Query<PopularParams>,
) -> ApiResult<PopularResponse> {
    let catalog: Catalog = catalog.parse().map_err(error_response)?;

    let near = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => Some(Proximity {
            origin: Point::new(lat, lng),
            radius_km: params
                .radius_km
                .unwrap_or(state.service.settings().nearby_radius_km),
        }),
        (None, None) if params.radius_km.is_some() => {
            return Err(error_response(Error::InvalidRequest(
                "radius_km requires lat and lng".to_string(),
            )))
        }
        (None, None) => None,
        _ => {
            return Err(error_response(Error::InvalidRequest(
                "lat and lng must be provided together".to_string(),
            )))
        }
    };

    let query = PopularQuery {
        keyword: params.keyword,
        category: params.category,
        near,
        exclude_id: params.exclude_id,
        limit: parse_limit(params.limit).map_err(error_response)?,
        ..PopularQuery::new(catalog)
    };

    let entries = state
        .service
        .search_popular(query)
        .await
        .map_err(error_response)?;
    Ok(Json(PopularResponse { entries }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PopularResponse {
    pub entries: Vec<PopularEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
    pub items: Vec<SearchableItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub count: usize,
}

/// Insert or replace items
pub async fn upsert(
    State(state): State<AppState>,
    Path(catalog): Path<String>,
    Json(payload): Json<UpsertRequest>,
) -> ApiResult<UpsertResponse> {
    let catalog: Catalog = catalog.parse().map_err(error_response)?;
    let count = state
        .store
        .upsert(catalog, payload.items)
        .await
        .map_err(error_response)?;

    tracing::info!(%catalog, count, "Items upserted");
    Ok(Json(UpsertResponse { count }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

/// Delete an item and its saves
pub async fn remove(
    State(state): State<AppState>,
    Path((catalog, id)): Path<(String, ItemId)>,
) -> ApiResult<RemoveResponse> {
    let catalog: Catalog = catalog.parse().map_err(error_response)?;
    let removed = state
        .store
        .remove(catalog, id)
        .await
        .map_err(error_response)?;

    if !removed {
        return Err(error_response(Error::NotFound(format!(
            "{} item {}",
            catalog, id
        ))));
    }
    Ok(Json(RemoveResponse { removed }))
}

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub user: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkResponse {
    /// False when the call did not change anything
    pub changed: bool,
}

/// Record a save
pub async fn mark(
    State(state): State<AppState>,
    Path((catalog, id)): Path<(String, ItemId)>,
    Json(payload): Json<MarkRequest>,
) -> ApiResult<MarkResponse> {
    let catalog: Catalog = catalog.parse().map_err(error_response)?;
    let changed = state
        .store
        .mark(catalog, id, payload.user)
        .await
        .map_err(error_response)?;
    Ok(Json(MarkResponse { changed }))
}

/// Withdraw a save
pub async fn unmark(
    State(state): State<AppState>,
    Path((catalog, id)): Path<(String, ItemId)>,
    Json(payload): Json<MarkRequest>,
) -> ApiResult<MarkResponse> {
    let catalog: Catalog = catalog.parse().map_err(error_response)?;
    let changed = state
        .store
        .unmark(catalog, id, payload.user)
        .await
        .map_err(error_response)?;
    Ok(Json(MarkResponse { changed }))
}

/// All four corners or none
fn parse_viewport(
    sw_lat: Option<f64>,
    sw_lng: Option<f64>,
    ne_lat: Option<f64>,
    ne_lng: Option<f64>,
) -> crate::Result<Option<Viewport>> {
    match (sw_lat, sw_lng, ne_lat, ne_lng) {
        (Some(sw_lat), Some(sw_lng), Some(ne_lat), Some(ne_lng)) => Ok(Some(Viewport::new(
            Point::new(sw_lat, sw_lng),
            Point::new(ne_lat, ne_lng),
        ))),
        (None, None, None, None) => Ok(None),
        _ => Err(Error::InvalidRequest(
            "sw_lat, sw_lng, ne_lat and ne_lng must be provided together".to_string(),
        )),
    }
}

/// Blank cursor means first page
fn parse_cursor(cursor: Option<String>) -> crate::Result<Option<Cursor>> {
    match cursor.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(token) => Cursor::decode(token).map(Some),
    }
}

fn parse_limit(limit: Option<i64>) -> crate::Result<Option<usize>> {
    match limit {
        None => Ok(None),
        Some(n) if n < 0 => Err(Error::InvalidLimit(format!(
            "limit must be positive, got {}",
            n
        ))),
        Some(n) => usize::try_from(n)
            .map(Some)
            .map_err(|_| Error::InvalidLimit(format!("limit {} is too large", n))),
    }
}
