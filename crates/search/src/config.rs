use serde::{Deserialize, Serialize};

fn default_batch_size() -> usize {
    20
}

fn default_query_cache_size() -> usize {
    100
}

/// Tuning for [`ConjugationSearchIndex`](crate::ConjugationSearchIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Verbs indexed between cooperative yields.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Recent queries whose results are kept. Zero disables the cache.
    #[serde(default = "default_query_cache_size")]
    pub query_cache_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            batch_size: default_batch_size(),
            query_cache_size: default_query_cache_size(),
        }
    }
}
