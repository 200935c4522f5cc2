//! API server state

use std::sync::Arc;

use crate::search::{SearchService, SearchSettings};
use crate::store::ItemStore;

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// Validating search front-end
    pub service: Arc<SearchService>,

    /// Backing store, used directly by the ingest and mark endpoints
    pub store: Arc<dyn ItemStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ItemStore>, settings: SearchSettings) -> Self {
        let service = Arc::new(SearchService::new(store.clone(), settings));
        Self { service, store }
    }
}
