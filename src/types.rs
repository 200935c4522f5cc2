//! Core types for spotlist

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// Item ID type
pub type ItemId = u64;

/// User ID type (used by marks)
pub type UserId = u64;

/// WGS-84 coordinate in degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidPoint(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidPoint(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// Axis-aligned lat/lng bounding box of a map screen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub south_west: Point,
    pub north_east: Point,
}

impl Viewport {
    pub fn new(south_west: Point, north_east: Point) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Reject inverted or out-of-range boxes. Nothing is swapped or clamped.
    pub fn validate(&self) -> Result<()> {
        self.south_west
            .validate()
            .map_err(|e| Error::InvalidViewport(format!("south-west corner: {}", e)))?;
        self.north_east
            .validate()
            .map_err(|e| Error::InvalidViewport(format!("north-east corner: {}", e)))?;

        if self.south_west.latitude > self.north_east.latitude
            || self.south_west.longitude > self.north_east.longitude
        {
            return Err(Error::InvalidViewport(format!(
                "south-west ({}, {}) is not below north-east ({}, {})",
                self.south_west.latitude,
                self.south_west.longitude,
                self.north_east.latitude,
                self.north_east.longitude
            )));
        }
        Ok(())
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.latitude >= self.south_west.latitude
            && point.latitude <= self.north_east.latitude
            && point.longitude >= self.south_west.longitude
            && point.longitude <= self.north_east.longitude
    }
}

/// Which set of items a query runs against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Catalog {
    Places,
    Collections,
}

impl Catalog {
    pub fn as_str(&self) -> &'static str {
        match self {
            Catalog::Places => "places",
            Catalog::Collections => "collections",
        }
    }

    /// Fields a keyword is matched against, OR-ed together
    pub fn keyword_fields(&self) -> &'static [TextField] {
        match self {
            Catalog::Places => &[
                TextField::Name,
                TextField::Address,
                TextField::District,
                TextField::Neighborhood,
            ],
            Catalog::Collections => &[
                TextField::Title,
                TextField::Text,
                TextField::Address,
                TextField::District,
                TextField::Neighborhood,
            ],
        }
    }
}

impl std::str::FromStr for Catalog {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "places" => Ok(Catalog::Places),
            "collections" => Ok(Catalog::Collections),
            other => Err(Error::InvalidRequest(format!("unknown catalog: {}", other))),
        }
    }
}

impl std::fmt::Display for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text field of a searchable item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    Name,
    Address,
    District,
    Neighborhood,
    Title,
    Text,
}

impl TextField {
    pub fn column(&self) -> &'static str {
        match self {
            TextField::Name => "name",
            TextField::Address => "address",
            TextField::District => "district",
            TextField::Neighborhood => "neighborhood",
            TextField::Title => "title",
            TextField::Text => "text",
        }
    }
}

/// A record the engine can filter and rank.
///
/// Collections carry the address fields of their linked places and the union of
/// those places' categories, so both catalogs share one predicate model. A
/// collection filtered by keyword and category therefore matches when one
/// linked place supplies the keyword and another the category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchableItem {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<Point>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub fields: HashMap<TextField, Vec<String>>,
}

impl SearchableItem {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            point: None,
            categories: Vec::new(),
            fields: HashMap::new(),
        }
    }

    pub fn with_point(mut self, point: Point) -> Self {
        self.point = Some(point);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_field(mut self, field: TextField, value: impl Into<String>) -> Self {
        self.fields.entry(field).or_default().push(value.into());
        self
    }

    pub fn field_values(&self, field: TextField) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First category label, used as the display category of a marker
    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}
