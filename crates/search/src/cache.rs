//! Bounded query → results cache, evicting the oldest insertion first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::index::SearchIndexEntry;

pub(crate) struct QueryCache {
    capacity: usize,
    order: VecDeque<String>,
    results: HashMap<String, Arc<Vec<SearchIndexEntry>>>,
}

impl QueryCache {
    pub(crate) fn new(capacity: usize) -> Self {
        QueryCache {
            capacity,
            order: VecDeque::with_capacity(capacity),
            results: HashMap::with_capacity(capacity),
        }
    }

    /// Lookups do not refresh an entry's position.
    pub(crate) fn get(&self, query: &str) -> Option<Arc<Vec<SearchIndexEntry>>> {
        self.results.get(query).cloned()
    }

    pub(crate) fn insert(&mut self, query: String, results: Arc<Vec<SearchIndexEntry>>) {
        if self.capacity == 0 {
            return;
        }
        if self.results.insert(query.clone(), results).is_some() {
            return;
        }
        self.order.push_back(query);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.results.remove(&oldest);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.results.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.results.len()
    }
}
