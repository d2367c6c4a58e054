//! Reverse index from surface forms to the verbs that produce them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zmna_core::{is_sentinel, Person, Tense, VerbRecord};
use zmna_store::{ResourceSource, StoreError, VerbDataStore};

use crate::cache::QueryCache;
use crate::config::IndexConfig;

/// Where one indexed surface form came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchIndexEntry {
    pub verb_id: String,
    /// The form as displayed, before normalization.
    pub form: String,
    pub tense: Tense,
    pub person: Person,
    pub preverb: String,
    pub has_multiple_preverbs: bool,
}

/// Outcome of one index build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub verbs_indexed: usize,
    /// Verbs whose data could not be loaded.
    pub verbs_skipped: usize,
    pub entries: usize,
}

/// Index key for a form or query.
pub fn normalize_form(form: &str) -> String {
    form.trim().to_lowercase()
}

type Forms = HashMap<String, Vec<SearchIndexEntry>>;

/// Search-by-conjugated-form over every verb the store can load.
///
/// The index is filled in batches and is searchable while it fills.
/// Building is idempotent: concurrent or repeated calls to
/// [`build_index`](Self::build_index) share one build until
/// [`reset_index`](Self::reset_index).
pub struct ConjugationSearchIndex<S> {
    store: Arc<VerbDataStore<S>>,
    config: IndexConfig,
    forms: RwLock<Forms>,
    build: Mutex<Arc<OnceCell<BuildSummary>>>,
    /// Bumped by every reset; batches from an older build are discarded.
    generation: AtomicU64,
    builds: AtomicUsize,
    queries: Mutex<QueryCache>,
}

impl<S: ResourceSource> ConjugationSearchIndex<S> {
    pub fn new(store: Arc<VerbDataStore<S>>, config: IndexConfig) -> Self {
        ConjugationSearchIndex {
            store,
            config,
            forms: RwLock::new(HashMap::new()),
            build: Mutex::new(Arc::new(OnceCell::new())),
            generation: AtomicU64::new(0),
            builds: AtomicUsize::new(0),
            queries: Mutex::new(QueryCache::new(config.query_cache_size)),
        }
    }

    pub fn store(&self) -> &Arc<VerbDataStore<S>> {
        &self.store
    }

    // ── Building ──────────────────────────────────────────────────────────────

    /// Index every listed verb, or return the summary of the build already
    /// done or underway.
    pub async fn build_index(&self, verb_ids: &[String]) -> BuildSummary {
        let (cell, generation) = {
            let build = lock(&self.build);
            (build.clone(), self.generation.load(Ordering::SeqCst))
        };
        *cell
            .get_or_init(|| self.run_build(verb_ids, generation))
            .await
    }

    /// [`build_index`](Self::build_index) over the store's whole catalog.
    pub async fn build_from_catalog(&self) -> Result<BuildSummary, StoreError> {
        let verb_ids = self.store.verb_ids().await?;
        Ok(self.build_index(&verb_ids).await)
    }

    /// Drop the index and allow a fresh build.
    pub fn reset_index(&self) {
        let mut build = lock(&self.build);
        *build = Arc::new(OnceCell::new());
        self.generation.fetch_add(1, Ordering::SeqCst);
        write(&self.forms).clear();
        lock(&self.queries).clear();
        info!("search index reset");
    }

    pub fn is_built(&self) -> bool {
        lock(&self.build).initialized()
    }

    /// Number of distinct normalized forms.
    pub fn len(&self) -> usize {
        read(&self.forms).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.forms).is_empty()
    }

    pub fn entry_count(&self) -> usize {
        read(&self.forms).values().map(Vec::len).sum()
    }

    /// Builds started since construction.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn cached_queries(&self) -> usize {
        lock(&self.queries).len()
    }

    async fn run_build(&self, verb_ids: &[String], generation: u64) -> BuildSummary {
        self.builds.fetch_add(1, Ordering::SeqCst);
        info!(verbs = verb_ids.len(), "building conjugation search index");
        // A build abandoned mid-way may have left partial batches behind.
        self.merge(Vec::new(), generation, true);

        let mut summary = BuildSummary::default();
        for (batch_no, batch) in verb_ids.chunks(self.config.batch_size.max(1)).enumerate() {
            let mut entries = Vec::new();
            for verb_id in batch {
                match self.store.try_get_verb_data(verb_id).await {
                    Ok(record) => {
                        let before = entries.len();
                        entries.extend(entries_for(&record));
                        summary.verbs_indexed += 1;
                        summary.entries += entries.len() - before;
                    }
                    Err(e) => {
                        summary.verbs_skipped += 1;
                        warn!(verb_id = %verb_id, error = %e, "skipping verb in search index");
                    }
                }
            }

            if !self.merge(entries, generation, false) {
                debug!("index reset during build; abandoning");
                return summary;
            }
            debug!(batch = batch_no + 1, "indexed batch");
            tokio::task::yield_now().await;
        }

        info!(
            verbs = summary.verbs_indexed,
            skipped = summary.verbs_skipped,
            entries = summary.entries,
            "search index built"
        );
        summary
    }

    /// Add a batch, unless the index was reset since the build began.
    fn merge(&self, entries: Vec<SearchIndexEntry>, generation: u64, replace: bool) -> bool {
        let mut forms = write(&self.forms);
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        if replace {
            forms.clear();
        }
        for entry in entries {
            forms
                .entry(normalize_form(&entry.form))
                .or_default()
                .push(entry);
        }
        drop(forms);
        lock(&self.queries).clear();
        true
    }

    // ── Searching ─────────────────────────────────────────────────────────────

    /// Forms matching `term`: exact matches, then prefix, suffix, and
    /// substring matches.
    pub fn search(&self, term: &str) -> Vec<SearchIndexEntry> {
        let query = normalize_form(term);
        if query.is_empty() {
            return Vec::new();
        }

        let cached = lock(&self.queries).get(&query);
        if let Some(results) = cached {
            debug!(query = %query, "search cache hit");
            return results.as_ref().clone();
        }

        // Cache while still holding the read lock so a concurrent batch
        // cannot clear the cache between lookup and insert.
        let forms = read(&self.forms);
        let results = rank(&forms, &query);
        lock(&self.queries).insert(query, Arc::new(results.clone()));
        results
    }
}

/// Every displayable form of a verb, under every preverb it takes.
fn entries_for(record: &VerbRecord) -> Vec<SearchIndexEntry> {
    let multiple = record.preverb_config.has_multiple_preverbs;
    let mut entries = Vec::new();
    for preverb in record.preverbs() {
        for (tense, data) in record.forms_for(&preverb) {
            for (person, form) in data.forms.iter() {
                if is_sentinel(form) {
                    continue;
                }
                entries.push(SearchIndexEntry {
                    verb_id: record.id.clone(),
                    form: form.to_string(),
                    tense,
                    person,
                    preverb: preverb.clone(),
                    has_multiple_preverbs: multiple,
                });
            }
        }
    }
    entries
}

fn rank(forms: &Forms, query: &str) -> Vec<SearchIndexEntry> {
    let mut tiers: [Vec<&SearchIndexEntry>; 4] = Default::default();
    for (form, entries) in forms {
        let tier = if form == query {
            0
        } else if form.starts_with(query) {
            1
        } else if form.ends_with(query) {
            2
        } else if form.contains(query) {
            3
        } else {
            continue;
        };
        tiers[tier].extend(entries);
    }

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for mut tier in tiers {
        tier.sort_by(|a, b| sort_key(a, query).cmp(&sort_key(b, query)));
        for entry in tier {
            let key = (
                entry.verb_id.as_str(),
                entry.form.as_str(),
                entry.tense,
                entry.person,
            );
            if seen.insert(key) {
                results.push(entry.clone());
            }
        }
    }
    results
}

/// Exact first, then shorter, then alphabetical; the rest only makes the
/// order deterministic.
fn sort_key<'a>(
    entry: &'a SearchIndexEntry,
    query: &str,
) -> (bool, usize, &'a str, &'a str, Tense, Person, &'a str) {
    (
        normalize_form(&entry.form) != query,
        entry.form.chars().count(),
        &entry.form,
        &entry.verb_id,
        entry.tense,
        entry.person,
        &entry.preverb,
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zmna_store::{Resource, StaticSource, StoreConfig};

    fn source() -> StaticSource {
        let mut source = StaticSource::new();
        source.insert(
            Resource::Verbs,
            json!({
                "to_go": {
                    "georgian": "მისვლა",
                    "preverb_config": {
                        "has_multiple_preverbs": true,
                        "default_preverb": "მი",
                        "available_preverbs": ["მი", "წა", "გა"]
                    }
                },
                "walk": {
                    "georgian": "walk",
                    "preverb_config": {"default_preverb": ""}
                }
            }),
        );
        source.insert(
            Resource::Conjugations,
            json!({
                "to_go": {
                    "present": {"forms": {"1sg": "მივდივარ", "3pl": "-"}},
                    "aorist": {"forms": {"3sg": "წავიდა"}}
                },
                "walk": {
                    "present": {"forms": {
                        "1sg": "mivdivar",
                        "2sg": "vdivar",
                        "3sg": "divar",
                        "1pl": "vdivari",
                        "2pl": "",
                        "3pl": "divari"
                    }}
                }
            }),
        );
        source.insert(
            Resource::PreverbConfigs,
            json!({"to_go": {"default": "მი", "replacements": {"წა": "წა", "გა": "გა"}}}),
        );
        source.insert(Resource::Examples, json!({}));
        source.insert(Resource::GlossAnalyses, json!({}));
        source
    }

    fn index_with(config: IndexConfig) -> ConjugationSearchIndex<StaticSource> {
        let store = VerbDataStore::new(source(), StoreConfig::default());
        ConjugationSearchIndex::new(Arc::new(store), config)
    }

    fn index() -> ConjugationSearchIndex<StaticSource> {
        index_with(IndexConfig::default())
    }

    fn ids() -> Vec<String> {
        vec!["to_go".to_string(), "walk".to_string()]
    }

    fn forms(results: &[SearchIndexEntry]) -> Vec<&str> {
        results.iter().map(|e| e.form.as_str()).collect()
    }

    #[tokio::test]
    async fn tiers_rank_exact_prefix_suffix_then_substring() {
        let index = index();
        index.build_index(&ids()).await;

        let results = index.search("divar");
        assert_eq!(
            forms(&results),
            vec!["divar", "divari", "vdivar", "mivdivar", "vdivari"]
        );
    }

    #[tokio::test]
    async fn queries_are_trimmed_and_lowercased() {
        let index = index();
        index.build_index(&ids()).await;
        assert_eq!(index.search("  DIVAR "), index.search("divar"));
        assert!(index.search("   ").is_empty());
        assert!(index.search("").is_empty());
    }

    #[tokio::test]
    async fn derived_forms_are_indexed_per_preverb() {
        let index = index();
        index.build_index(&ids()).await;

        let results = index.search("წავდივარ");
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.verb_id, "to_go");
        assert_eq!(hit.preverb, "წა");
        assert_eq!(hit.tense, Tense::Present);
        assert_eq!(hit.person, Person::FirstSingular);
        assert!(hit.has_multiple_preverbs);

        assert_eq!(index.search("გავდივარ")[0].preverb, "გა");
        assert_eq!(index.search("მივდივარ")[0].preverb, "მი");
    }

    #[tokio::test]
    async fn same_cell_under_several_preverbs_is_reported_once() {
        let index = index();
        index.build_index(&ids()).await;
        // The irregular aorist is copied unchanged for all three preverbs.
        assert_eq!(index.search("წავიდა").len(), 1);
        assert_eq!(index.entry_count(), 3 + 3 + 5);
    }

    #[tokio::test]
    async fn sentinels_are_not_indexed() {
        let index = index();
        index.build_index(&ids()).await;
        assert!(index.search("-").is_empty());
        assert!(!index.search("divar").iter().any(|e| e.person == Person::SecondPlural));
    }

    #[tokio::test]
    async fn parallel_builds_run_once() {
        let index = index();
        let ids = ids();
        let (a, b) = tokio::join!(index.build_index(&ids), index.build_index(&ids));
        assert_eq!(a, b);
        assert_eq!(index.build_count(), 1);

        let again = index.build_index(&ids).await;
        assert_eq!(again, a);
        assert_eq!(index.build_count(), 1);
        assert!(index.is_built());
        assert_eq!(a.verbs_indexed, 2);
        assert_eq!(a.entries, index.entry_count());
    }

    #[tokio::test]
    async fn reset_allows_a_fresh_build() {
        let index = index();
        index.build_index(&ids()).await;
        index.search("divar");
        assert_eq!(index.cached_queries(), 1);

        index.reset_index();
        assert!(!index.is_built());
        assert!(index.is_empty());
        assert_eq!(index.cached_queries(), 0);
        assert!(index.search("divar").is_empty());

        index.build_index(&ids()).await;
        assert_eq!(index.build_count(), 2);
        assert_eq!(index.search("divar").len(), 5);
    }

    #[tokio::test]
    async fn unloadable_verbs_are_skipped() {
        let index = index_with(IndexConfig {
            batch_size: 1,
            ..IndexConfig::default()
        });
        let summary = index
            .build_index(&["to_fly".to_string(), "walk".to_string()])
            .await;
        assert_eq!(summary.verbs_indexed, 1);
        assert_eq!(summary.verbs_skipped, 1);
        assert_eq!(index.search("divar").len(), 5);
    }

    #[tokio::test]
    async fn builds_from_the_catalog() {
        let index = index();
        let summary = index.build_from_catalog().await.unwrap();
        assert_eq!(summary.verbs_indexed, 2);
        assert_eq!(summary.verbs_skipped, 0);
    }

    #[tokio::test]
    async fn repeated_queries_are_served_from_cache() {
        let index = index_with(IndexConfig {
            query_cache_size: 1,
            ..IndexConfig::default()
        });
        index.build_index(&ids()).await;
        let first = index.search("divar");
        assert_eq!(index.search("divar"), first);
        index.search("vdivar");
        assert_eq!(index.cached_queries(), 1);
    }
}
