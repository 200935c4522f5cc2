//! SQL pushdown rendering
//!
//! Renders a [`StoreQuery`] into a parameterised `SELECT` for relational
//! stores. The distance expression is generated from [`EARTH_RADIUS_KM`] and
//! mirrors [`crate::geo::haversine_km`] term by term (same operand order, same
//! clamp, same zero short-circuit), so the values a store orders by are the
//! values a cursor carries.
//!
//! Expected schema: one table per catalog (`places`, `collections`) with
//! `id`, `latitude`, `longitude` and one column per text field, plus a
//! `<table>_categories(item_id, name)` table.
//!
//! Keyword and region matching go through SQL `LOWER()`. Many engines fold only
//! ASCII (or fold by the session locale), whereas [`Predicate::matches`] uses
//! Unicode lowercasing, so the two can disagree on non-ASCII keywords unless
//! the database collation folds Unicode case.

use crate::geo::{BoundingBox, EARTH_RADIUS_KM};
use crate::query::{Predicate, SortOrder, StoreQuery};
use crate::types::Point;

/// Positional parameter bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Float(f64),
    Int(u64),
    Text(String),
}

/// Rendered statement; `params` are in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Render a full `SELECT ... WHERE ... ORDER BY ... LIMIT ...`
pub fn render(query: &StoreQuery) -> SqlStatement {
    let table = query.catalog.as_str();
    let mut params = Vec::new();

    let mut sql = format!("SELECT {table}.*");
    if let SortOrder::DistanceAsc { origin } = &query.order {
        sql.push_str(", ");
        sql.push_str(&distance_expr(origin, &mut params));
        sql.push_str(" AS distance_km");
    }
    sql.push_str(&format!(" FROM {table} WHERE "));
    sql.push_str(&render_predicate(&query.predicate, table, &mut params));

    match &query.order {
        SortOrder::DistanceAsc { .. } => sql.push_str(" ORDER BY distance_km ASC, id ASC"),
        SortOrder::IdDesc => sql.push_str(" ORDER BY id DESC"),
        SortOrder::IdAsc => sql.push_str(" ORDER BY id ASC"),
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(SqlParam::Int(limit as u64));
    }

    SqlStatement { sql, params }
}

/// Render only the boolean condition of a predicate
pub fn render_predicate(predicate: &Predicate, table: &str, params: &mut Vec<SqlParam>) -> String {
    match predicate {
        Predicate::All => "1 = 1".to_string(),
        Predicate::InViewport(viewport) => {
            params.push(SqlParam::Float(viewport.south_west.latitude));
            params.push(SqlParam::Float(viewport.north_east.latitude));
            params.push(SqlParam::Float(viewport.south_west.longitude));
            params.push(SqlParam::Float(viewport.north_east.longitude));
            "(latitude BETWEEN ? AND ? AND longitude BETWEEN ? AND ?)".to_string()
        }
        Predicate::CategoryEq(category) => {
            params.push(SqlParam::Text(category.clone()));
            format!(
                "EXISTS (SELECT 1 FROM {table}_categories c WHERE c.item_id = {table}.id AND c.name = ?)"
            )
        }
        Predicate::KeywordAny { fields, keyword } => {
            let pattern = format!("%{}%", escape_like(keyword));
            let clauses: Vec<String> = fields
                .iter()
                .map(|field| {
                    params.push(SqlParam::Text(pattern.clone()));
                    format!("LOWER({}) LIKE ? ESCAPE '\\'", field.column())
                })
                .collect();
            format!("({})", clauses.join(" OR "))
        }
        Predicate::InRegion(region) => {
            params.push(SqlParam::Text(region.clone()));
            params.push(SqlParam::Text(region.clone()));
            "(LOWER(TRIM(district)) = ? OR LOWER(TRIM(neighborhood)) = ?)".to_string()
        }
        Predicate::WithinRadius { origin, radius_km } => {
            let bbox = BoundingBox::around(origin, *radius_km);
            params.push(SqlParam::Float(bbox.min_lat));
            params.push(SqlParam::Float(bbox.max_lat));
            let longitude = if bbox.min_lng <= -180.0 && bbox.max_lng >= 180.0 {
                String::new()
            } else {
                params.push(SqlParam::Float(bbox.min_lng));
                params.push(SqlParam::Float(bbox.max_lng));
                if bbox.wraps() {
                    " AND (longitude >= ? OR longitude <= ?)".to_string()
                } else {
                    " AND longitude BETWEEN ? AND ?".to_string()
                }
            };
            let distance = distance_expr(origin, params);
            params.push(SqlParam::Float(*radius_km));
            format!("(latitude BETWEEN ? AND ?{longitude} AND {distance} <= ?)")
        }
        Predicate::DistanceAfter {
            origin,
            last_distance_km,
            last_id,
        } => {
            let first = distance_expr(origin, params);
            params.push(SqlParam::Float(*last_distance_km));
            let second = distance_expr(origin, params);
            params.push(SqlParam::Float(*last_distance_km));
            params.push(SqlParam::Int(*last_id));
            format!("({first} > ? OR ({second} = ? AND id > ?))")
        }
        Predicate::IdBefore(id) => {
            params.push(SqlParam::Int(*id));
            "id < ?".to_string()
        }
        Predicate::IdAfter(id) => {
            params.push(SqlParam::Int(*id));
            "id > ?".to_string()
        }
        Predicate::ExcludeId(id) => {
            params.push(SqlParam::Int(*id));
            "id <> ?".to_string()
        }
        Predicate::And(conditions) => join(conditions, " AND ", table, params),
        Predicate::Or(conditions) => join(conditions, " OR ", table, params),
    }
}

/// Distance from `origin` to the row's coordinates, in km.
///
/// `CASE WHEN latitude = ? AND longitude = ? THEN 0 ELSE R * ACOS(LEAST(1, GREATEST(-1,
/// SIN(a) * SIN(b) + COS(a) * COS(b) * COS(ABS(RADIANS(longitude) - RADIANS(?)))))) END`
pub fn distance_expr(origin: &Point, params: &mut Vec<SqlParam>) -> String {
    params.push(SqlParam::Float(origin.latitude));
    params.push(SqlParam::Float(origin.longitude));
    params.push(SqlParam::Float(origin.latitude));
    params.push(SqlParam::Float(origin.latitude));
    params.push(SqlParam::Float(origin.longitude));

    format!(
        "(CASE WHEN latitude = ? AND longitude = ? THEN 0.0 ELSE {radius:?} * ACOS(LEAST(1.0, GREATEST(-1.0, \
         SIN(RADIANS(?)) * SIN(RADIANS(latitude)) + \
         COS(RADIANS(?)) * COS(RADIANS(latitude)) * COS(ABS(RADIANS(longitude) - RADIANS(?)))))) END)",
        radius = EARTH_RADIUS_KM
    )
}

fn join(conditions: &[Predicate], separator: &str, table: &str, params: &mut Vec<SqlParam>) -> String {
    if conditions.is_empty() {
        return "1 = 1".to_string();
    }
    let parts: Vec<String> = conditions
        .iter()
        .map(|c| render_predicate(c, table, params))
        .collect();
    format!("({})", parts.join(separator))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
