//! Spotlist - location-ranked, keyword-filtered search with stable cursors
//!
//! - Viewport and radius search ranked by great-circle distance
//! - Keyword and category filtering over places and collections
//! - Opaque cursors bound to the ordering (and origin) that issued them
//! - Popularity leaderboards from user saves
//! - Simple HTTP API

pub mod api;
pub mod config;
pub mod error;
pub mod geo;
pub mod query;
pub mod search;
pub mod store;
pub mod types;

pub use error::{Error, Result};
