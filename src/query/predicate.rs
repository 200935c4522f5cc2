//! Filter predicates
//!
//! A [`Predicate`] is a small boolean tree over item fields. The in-memory store
//! evaluates it with [`Predicate::matches`]; relational stores render it with
//! [`crate::query::sql`]. Inputs reaching [`PredicateBuilder`] are already
//! validated by the search service.

use crate::geo::{haversine_km, BoundingBox};
use crate::query::{Cursor, CursorRank, SortOrder};
use crate::types::{Catalog, ItemId, Point, SearchableItem, TextField, Viewport};

/// Filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every item
    All,
    /// `lat BETWEEN sw.lat AND ne.lat AND lng BETWEEN sw.lng AND ne.lng`
    InViewport(Viewport),
    /// Exact match on a normalised category label
    CategoryEq(String),
    /// Case-insensitive substring match on any of `fields`; `keyword` is lowercase
    KeywordAny {
        fields: Vec<TextField>,
        keyword: String,
    },
    /// Exact match of `district` or `neighborhood`, case-insensitive; `region` is lowercase
    InRegion(String),
    /// Bounding-box pre-filter, then `distance <= radius_km`
    WithinRadius { origin: Point, radius_km: f64 },
    /// `distance > d OR (distance = d AND id > last_id)`
    DistanceAfter {
        origin: Point,
        last_distance_km: f64,
        last_id: ItemId,
    },
    /// `id < last_id`
    IdBefore(ItemId),
    /// `id > last_id`
    IdAfter(ItemId),
    /// `id <> id`
    ExcludeId(ItemId),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate against an item. Distance conditions use [`haversine_km`] and
    /// never match items without a point.
    pub fn matches(&self, item: &SearchableItem) -> bool {
        match self {
            Predicate::All => true,
            Predicate::InViewport(viewport) => item
                .point
                .as_ref()
                .map(|p| viewport.contains(p))
                .unwrap_or(false),
            Predicate::CategoryEq(category) => item.categories.iter().any(|c| c == category),
            Predicate::KeywordAny { fields, keyword } => fields.iter().any(|field| {
                item.field_values(*field)
                    .iter()
                    .any(|value| value.to_lowercase().contains(keyword.as_str()))
            }),
            Predicate::InRegion(region) => [TextField::District, TextField::Neighborhood]
                .iter()
                .any(|field| {
                    item.field_values(*field)
                        .iter()
                        .any(|value| value.trim().to_lowercase() == *region)
                }),
            Predicate::WithinRadius { origin, radius_km } => match &item.point {
                Some(point) => {
                    BoundingBox::around(origin, *radius_km).contains(point)
                        && haversine_km(origin, point) <= *radius_km
                }
                None => false,
            },
            Predicate::DistanceAfter {
                origin,
                last_distance_km,
                last_id,
            } => match &item.point {
                Some(point) => {
                    let distance = haversine_km(origin, point);
                    distance > *last_distance_km
                        || (distance == *last_distance_km && item.id > *last_id)
                }
                None => false,
            },
            Predicate::IdBefore(id) => item.id < *id,
            Predicate::IdAfter(id) => item.id > *id,
            Predicate::ExcludeId(id) => item.id != *id,
            Predicate::And(conditions) => conditions.iter().all(|c| c.matches(item)),
            Predicate::Or(conditions) => conditions.iter().any(|c| c.matches(item)),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::All)
    }
}

/// Composes the filter for one query.
///
/// Absent or blank filters are omitted rather than turned into wildcards; a
/// builder with no filters produces [`Predicate::All`].
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    catalog: Catalog,
    viewport: Option<Viewport>,
    category: Option<String>,
    keyword: Option<String>,
    region: Option<String>,
    radius: Option<(Point, f64)>,
    exclude_id: Option<ItemId>,
    cursor_condition: Option<Predicate>,
}

impl PredicateBuilder {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            viewport: None,
            category: None,
            keyword: None,
            region: None,
            radius: None,
            exclude_id: None,
            cursor_condition: None,
        }
    }

    pub fn viewport(mut self, viewport: Option<Viewport>) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = normalize_label(category);
        self
    }

    pub fn keyword(mut self, keyword: Option<String>) -> Self {
        self.keyword = normalize_label(keyword).map(|k| k.to_lowercase());
        self
    }

    /// Restrict to a district or neighborhood by name
    pub fn region(mut self, region: Option<String>) -> Self {
        self.region = normalize_label(region).map(|r| r.to_lowercase());
        self
    }

    pub fn radius(mut self, origin: Point, radius_km: f64) -> Self {
        self.radius = Some((origin, radius_km));
        self
    }

    pub fn exclude(mut self, id: Option<ItemId>) -> Self {
        self.exclude_id = id;
        self
    }

    /// Continue after `cursor` under `order`. A cursor whose kind does not fit
    /// the ordering is ignored here; the service rejects it earlier.
    pub fn after(mut self, cursor: Option<&Cursor>, order: &SortOrder) -> Self {
        self.cursor_condition = cursor.and_then(|cursor| match (order, &cursor.rank) {
            (
                SortOrder::DistanceAsc { origin },
                CursorRank::Distance {
                    last_distance_km, ..
                },
            ) => Some(Predicate::DistanceAfter {
                origin: *origin,
                last_distance_km: *last_distance_km,
                last_id: cursor.last_id,
            }),
            (SortOrder::IdDesc, CursorRank::IdDesc) => Some(Predicate::IdBefore(cursor.last_id)),
            (SortOrder::IdAsc, CursorRank::IdAsc) => Some(Predicate::IdAfter(cursor.last_id)),
            _ => None,
        });
        self
    }

    /// True when a viewport, region, category, keyword or radius narrows the query
    pub fn has_filters(&self) -> bool {
        self.viewport.is_some()
            || self.region.is_some()
            || self.category.is_some()
            || self.keyword.is_some()
            || self.radius.is_some()
    }

    pub fn build(self) -> Predicate {
        let mut conditions = Vec::new();

        if let Some(viewport) = self.viewport {
            conditions.push(Predicate::InViewport(viewport));
        }
        if let Some(region) = self.region {
            conditions.push(Predicate::InRegion(region));
        }
        if let Some((origin, radius_km)) = self.radius {
            conditions.push(Predicate::WithinRadius { origin, radius_km });
        }
        if let Some(category) = self.category {
            conditions.push(Predicate::CategoryEq(category));
        }
        if let Some(keyword) = self.keyword {
            conditions.push(Predicate::KeywordAny {
                fields: self.catalog.keyword_fields().to_vec(),
                keyword,
            });
        }
        if let Some(id) = self.exclude_id {
            conditions.push(Predicate::ExcludeId(id));
        }
        if let Some(cursor_condition) = self.cursor_condition {
            conditions.push(cursor_condition);
        }

        match conditions.len() {
            0 => Predicate::All,
            1 => conditions.remove(0),
            _ => Predicate::And(conditions),
        }
    }
}

/// Trim a user-supplied label; blank means absent
pub fn normalize_label(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
