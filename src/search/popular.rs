//! Popularity leaderboard
//!
//! A fixed top-N snapshot: grouped by item, ranked by save count descending,
//! ties by id ascending. There is no cursor; callers wanting more re-run with
//! a larger N.

use serde::{Deserialize, Serialize};

use crate::types::SearchableItem;

/// One leaderboard entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopularEntry {
    pub rank: usize,
    pub saves: u64,
    pub item: SearchableItem,
}

pub struct PopularityRanker;

impl PopularityRanker {
    /// Rank `(item, saves)` pairs and keep the first `limit`
    pub fn rank(mut counted: Vec<(SearchableItem, u64)>, limit: usize) -> Vec<PopularEntry> {
        counted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
        counted.truncate(limit);

        counted
            .into_iter()
            .enumerate()
            .map(|(i, (item, saves))| PopularEntry {
                rank: i + 1,
                saves,
                item,
            })
            .collect()
    }
}
