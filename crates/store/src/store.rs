//! The verb data store.
//!
//! Each verb id moves through a single state map:
//! absent (unloaded) → `Loading { attempt }` → `Loaded(entry)`, or
//! → `Failed` once retries run out. Failures are never served from the
//! cache: a `Failed` verb is fetched from scratch on the next request.
//!
//! Shared resources (bundled mode) are cached separately, keyed by
//! [`Resource`], so each shared file is fetched at most once no matter how
//! many verbs are assembled from it. Nothing expires on its own; entries
//! leave the cache only through [`VerbDataStore::clear_verb_cache`] or
//! [`VerbDataStore::clear_all`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zmna_core::{Conjugations, PreverbRules, TenseBundle, VerbMeta, VerbRecord};

use crate::config::{DeploymentMode, StoreConfig};
use crate::error::{SourceError, StoreError};
use crate::flight::{lock, Flights};
use crate::resource::Resource;
use crate::source::ResourceSource;

/// A cached verb record.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub verb_id: String,
    pub data: Arc<VerbRecord>,
    pub fetched_at: SystemTime,
}

/// Diagnostic counts over the store's state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Verbs with a cached record.
    pub loaded: usize,
    /// Verbs with a load in progress.
    pub loading: usize,
    /// Loading verbs past their first fetch attempt.
    pub retrying: usize,
    /// Verbs whose last load failed.
    pub failed: usize,
    /// Shared resources held in memory.
    pub cached_resources: usize,
    /// Verb loads currently running.
    pub in_flight: usize,
}

/// Where a verb stands, as seen by schedulers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Never requested, cleared, or last load failed.
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Debug, Clone)]
enum VerbState {
    /// `token` identifies the load; a clear during the load invalidates it.
    Loading { attempt: u32, token: u64 },
    Loaded(CacheEntry),
    Failed { attempts: u32 },
}

type Catalog = Arc<BTreeMap<String, VerbMeta>>;
type VerbResult = Result<Arc<VerbRecord>, StoreError>;
type ResourceResult = Result<Arc<serde_json::Value>, StoreError>;

/// The verb on whose behalf a resource is fetched, for attempt tracking.
type Owner<'a> = Option<(&'a str, u64)>;

/// Verbs waiting on one shared resource fetch.
#[derive(Debug, Default)]
struct ResourceWaiters {
    /// Attempt the fetch is on; zero before the first.
    attempt: u32,
    /// Verb id to load token.
    verbs: HashMap<String, u64>,
}

type WaiterMap = Mutex<HashMap<Resource, ResourceWaiters>>;

/// Registration of a verb as waiting on a shared resource. Dropping it
/// deregisters the verb.
struct Waiting<'a> {
    waiters: &'a WaiterMap,
    resource: Resource,
    verb_id: String,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        let mut waiters = lock(self.waiters);
        if let Some(entry) = waiters.get_mut(&self.resource) {
            entry.verbs.remove(&self.verb_id);
            if entry.verbs.is_empty() && entry.attempt == 0 {
                waiters.remove(&self.resource);
            }
        }
    }
}

/// Fetches, assembles, and caches verb records.
pub struct VerbDataStore<S> {
    source: S,
    config: StoreConfig,
    resources: Mutex<HashMap<Resource, Arc<serde_json::Value>>>,
    resource_flights: Flights<Resource, ResourceResult>,
    waiters: WaiterMap,
    catalog: Mutex<Option<Catalog>>,
    verbs: Mutex<HashMap<String, VerbState>>,
    verb_flights: Flights<String, VerbResult>,
    next_token: AtomicU64,
}

impl<S: ResourceSource> VerbDataStore<S> {
    pub fn new(source: S, config: StoreConfig) -> Self {
        VerbDataStore {
            source,
            config,
            resources: Mutex::new(HashMap::new()),
            resource_flights: Flights::new(),
            waiters: Mutex::new(HashMap::new()),
            catalog: Mutex::new(None),
            verbs: Mutex::new(HashMap::new()),
            verb_flights: Flights::new(),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Load a verb, or `None` if it cannot be loaded.
    ///
    /// Errors are logged and swallowed here so one verb's failure never
    /// propagates into unrelated callers; use
    /// [`try_get_verb_data`](Self::try_get_verb_data) to see the cause.
    pub async fn get_verb_data(&self, verb_id: &str) -> Option<Arc<VerbRecord>> {
        match self.try_get_verb_data(verb_id).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(verb_id, error = %e, "verb data unavailable");
                None
            }
        }
    }

    /// Load a verb, serving from cache when possible.
    ///
    /// Unknown ids are rejected against the verb index before any per-verb
    /// fetch. Concurrent calls for the same id share one load.
    pub async fn try_get_verb_data(&self, verb_id: &str) -> VerbResult {
        if let Some(record) = self.cached(verb_id) {
            debug!(verb_id, "verb cache hit");
            return Ok(record);
        }

        let catalog = self.catalog_map().await?;
        let meta = catalog
            .get(verb_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownVerb {
                verb_id: verb_id.to_string(),
            })?;

        self.verb_flights
            .run(verb_id.to_string(), move || async move {
                self.load_verb(meta).await
            })
            .await
    }

    /// The cached record for a verb, without fetching.
    pub fn cached(&self, verb_id: &str) -> Option<Arc<VerbRecord>> {
        self.cache_entry(verb_id).map(|entry| entry.data)
    }

    pub fn cache_entry(&self, verb_id: &str) -> Option<CacheEntry> {
        match lock(&self.verbs).get(verb_id) {
            Some(VerbState::Loaded(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    pub fn is_loaded(&self, verb_id: &str) -> bool {
        matches!(lock(&self.verbs).get(verb_id), Some(VerbState::Loaded(_)))
    }

    pub fn is_loading(&self, verb_id: &str) -> bool {
        matches!(
            lock(&self.verbs).get(verb_id),
            Some(VerbState::Loading { .. })
        ) || self.verb_flights.contains(&verb_id.to_string())
    }

    pub fn load_state(&self, verb_id: &str) -> LoadState {
        match lock(&self.verbs).get(verb_id) {
            Some(VerbState::Loaded(_)) => return LoadState::Loaded,
            Some(VerbState::Loading { .. }) => return LoadState::Loading,
            Some(VerbState::Failed { .. }) | None => {}
        }
        if self.verb_flights.contains(&verb_id.to_string()) {
            LoadState::Loading
        } else {
            LoadState::Unloaded
        }
    }

    /// Fetch attempts spent on the verb's last load, if it failed.
    pub fn failed_attempts(&self, verb_id: &str) -> Option<u32> {
        match lock(&self.verbs).get(verb_id) {
            Some(VerbState::Failed { attempts }) => Some(*attempts),
            _ => None,
        }
    }

    /// Every verb in the index, ordered by id.
    pub async fn catalog(&self) -> Result<Vec<VerbMeta>, StoreError> {
        Ok(self.catalog_map().await?.values().cloned().collect())
    }

    /// Every verb id in the index, ordered.
    pub async fn verb_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.catalog_map().await?.keys().cloned().collect())
    }

    // ── Cache management ──────────────────────────────────────────────────────

    /// Forget a verb's cached record and any load bookkeeping for it.
    ///
    /// A load already running still answers its own callers but its
    /// result is not cached. Returns whether anything was removed.
    pub fn clear_verb_cache(&self, verb_id: &str) -> bool {
        let removed = lock(&self.verbs).remove(verb_id).is_some();
        let key = verb_id.to_string();
        let was_in_flight = self.verb_flights.contains(&key);
        self.verb_flights.forget(&key);
        if removed || was_in_flight {
            debug!(verb_id, "verb cache cleared");
        }
        removed || was_in_flight
    }

    /// Drop every cached verb, shared resource, and the verb index.
    pub fn clear_all(&self) {
        lock(&self.verbs).clear();
        lock(&self.resources).clear();
        *lock(&self.catalog) = None;
        info!("verb data cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            cached_resources: lock(&self.resources).len(),
            in_flight: self.verb_flights.len(),
            ..CacheStats::default()
        };
        for state in lock(&self.verbs).values() {
            match state {
                VerbState::Loaded(_) => stats.loaded += 1,
                VerbState::Loading { attempt, .. } => {
                    stats.loading += 1;
                    if *attempt > 1 {
                        stats.retrying += 1;
                    }
                }
                VerbState::Failed { .. } => stats.failed += 1,
            }
        }
        stats
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    async fn load_verb(&self, meta: VerbMeta) -> VerbResult {
        let verb_id = meta.id.clone();
        // Another caller may have finished between our cache check and
        // joining the flight.
        if let Some(record) = self.cached(&verb_id) {
            return Ok(record);
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        lock(&self.verbs).insert(verb_id.clone(), VerbState::Loading { attempt: 1, token });
        debug!(verb_id = %verb_id, mode = ?self.config.mode, "loading verb data");

        let result = match self.config.mode {
            DeploymentMode::Bundled => self.assemble(meta, token).await,
            DeploymentMode::PerVerb => self.fetch_merged(&verb_id, token).await,
        }
        .and_then(|record| {
            record.validate()?;
            Ok(Arc::new(record))
        });

        let mut verbs = lock(&self.verbs);
        let attempts = match verbs.get(&verb_id) {
            Some(VerbState::Loading { attempt, token: t }) if *t == token => Some(*attempt),
            _ => None,
        };
        match (&result, attempts) {
            (Ok(record), Some(_)) => {
                verbs.insert(
                    verb_id.clone(),
                    VerbState::Loaded(CacheEntry {
                        verb_id: verb_id.clone(),
                        data: record.clone(),
                        fetched_at: SystemTime::now(),
                    }),
                );
                info!(verb_id = %verb_id, "verb data loaded");
            }
            (Ok(_), None) => {
                debug!(verb_id = %verb_id, "cache cleared during load; result not cached");
            }
            (Err(e), attempts) => {
                if let Some(attempts) = attempts {
                    verbs.insert(verb_id.clone(), VerbState::Failed { attempts });
                }
                warn!(verb_id = %verb_id, error = %e, "failed to load verb data");
            }
        }
        result
    }

    /// Bundled mode: join the verb's slices of the four shared resources
    /// with its metadata.
    async fn assemble(&self, meta: VerbMeta, token: u64) -> Result<VerbRecord, StoreError> {
        let verb_id = meta.id.clone();
        let owner = Some((verb_id.as_str(), token));

        let (conjugations, examples, gloss, rules) = tokio::try_join!(
            self.shared(Resource::Conjugations, owner),
            self.shared(Resource::Examples, owner),
            self.shared(Resource::GlossAnalyses, owner),
            self.shared(Resource::PreverbConfigs, owner),
        )?;

        let conjugations: Conjugations =
            entry(&conjugations, &Resource::Conjugations, &verb_id)?.ok_or_else(|| {
                StoreError::MalformedData {
                    subject: format!("verb '{}'", verb_id),
                    message: format!("no entry in {}", Resource::Conjugations),
                }
            })?;
        let examples: TenseBundle =
            entry(&examples, &Resource::Examples, &verb_id)?.unwrap_or_default();
        let gloss: TenseBundle =
            entry(&gloss, &Resource::GlossAnalyses, &verb_id)?.unwrap_or_default();
        let rules: Option<PreverbRules> = entry(&rules, &Resource::PreverbConfigs, &verb_id)?;

        Ok(VerbRecord::from_parts(
            meta,
            conjugations,
            rules,
            examples,
            gloss,
        )?)
    }

    /// Per-verb mode: one pre-merged file.
    async fn fetch_merged(&self, verb_id: &str, token: u64) -> Result<VerbRecord, StoreError> {
        let resource = Resource::Verb(verb_id.to_string());
        let value = self
            .fetch_with_retry(&resource, Some((verb_id, token)))
            .await?;
        let mut record = VerbRecord::deserialize(&value).map_err(|e| StoreError::MalformedData {
            subject: resource.path(),
            message: e.to_string(),
        })?;
        if record.id.is_empty() {
            record.id = verb_id.to_string();
        }
        Ok(record)
    }

    async fn catalog_map(&self) -> Result<Catalog, StoreError> {
        let cached = lock(&self.catalog).clone();
        if let Some(catalog) = cached {
            return Ok(catalog);
        }

        let value = self.shared(Resource::Verbs, None).await?;
        let mut entries =
            BTreeMap::<String, VerbMeta>::deserialize(value.as_ref()).map_err(|e| {
                StoreError::MalformedData {
                    subject: Resource::Verbs.path(),
                    message: e.to_string(),
                }
            })?;
        for (id, meta) in entries.iter_mut() {
            meta.id = id.clone();
        }

        let catalog = Arc::new(entries);
        *lock(&self.catalog) = Some(catalog.clone());
        Ok(catalog)
    }

    /// A shared resource, fetched at most once and then held in memory.
    ///
    /// Retry attempts are reported to every verb waiting on the fetch, not
    /// only the one whose request started it.
    async fn shared(&self, resource: Resource, owner: Owner<'_>) -> ResourceResult {
        let cached = lock(&self.resources).get(&resource).cloned();
        if let Some(value) = cached {
            return Ok(value);
        }

        let _waiting = owner.map(|(verb_id, token)| self.wait_on(&resource, verb_id, token));
        self.resource_flights
            .run(resource.clone(), move || async move {
                let cached = lock(&self.resources).get(&resource).cloned();
                if let Some(value) = cached {
                    return Ok(value);
                }
                let fetched = self.fetch_with_retry(&resource, None).await;
                lock(&self.waiters).remove(&resource);
                let value = Arc::new(fetched?);
                lock(&self.resources).insert(resource, value.clone());
                Ok(value)
            })
            .await
    }

    fn wait_on(&self, resource: &Resource, verb_id: &str, token: u64) -> Waiting<'_> {
        let attempt = {
            let mut waiters = lock(&self.waiters);
            let entry = waiters.entry(resource.clone()).or_default();
            entry.verbs.insert(verb_id.to_string(), token);
            entry.attempt
        };
        if attempt > 0 {
            self.mark_attempt(verb_id, token, attempt);
        }
        Waiting {
            waiters: &self.waiters,
            resource: resource.clone(),
            verb_id: verb_id.to_string(),
        }
    }

    /// Fetch with exponential backoff on transient failures.
    ///
    /// Malformed bodies fail immediately; retrying cannot fix them.
    async fn fetch_with_retry(
        &self,
        resource: &Resource,
        owner: Owner<'_>,
    ) -> Result<serde_json::Value, StoreError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match owner {
                Some((verb_id, token)) => self.mark_attempt(verb_id, token, attempt),
                None => self.mark_waiters(resource, attempt),
            }
            debug!(resource = %resource, attempt, source = self.source.source_id(), "fetching resource");

            match self.source.fetch(resource).await {
                Ok(value) => return Ok(value),
                Err(SourceError::Malformed { resource, message }) => {
                    return Err(StoreError::MalformedData {
                        subject: resource,
                        message,
                    });
                }
                Err(SourceError::Fetch { message, .. }) if attempt < max_attempts => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        resource = %resource,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "resource fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(SourceError::Fetch { resource, message }) => {
                    return Err(StoreError::ResourceFetch {
                        resource,
                        attempts: attempt,
                        message,
                    });
                }
            }
        }
    }

    /// A verb waiting on several resources reports its furthest attempt.
    fn mark_attempt(&self, verb_id: &str, token: u64, attempt: u32) {
        if let Some(VerbState::Loading { attempt: current, token: t }) =
            lock(&self.verbs).get_mut(verb_id)
        {
            if *t == token {
                *current = (*current).max(attempt);
            }
        }
    }

    fn mark_waiters(&self, resource: &Resource, attempt: u32) {
        let verbs: Vec<(String, u64)> = {
            let mut waiters = lock(&self.waiters);
            let entry = waiters.entry(resource.clone()).or_default();
            entry.attempt = attempt;
            entry
                .verbs
                .iter()
                .map(|(verb_id, token)| (verb_id.clone(), *token))
                .collect()
        };
        for (verb_id, token) in verbs {
            self.mark_attempt(&verb_id, token, attempt);
        }
    }
}

/// A verb's entry in a shared resource. Missing or `null` is `None`.
fn entry<T: DeserializeOwned>(
    value: &serde_json::Value,
    resource: &Resource,
    verb_id: &str,
) -> Result<Option<T>, StoreError> {
    match value.get(verb_id) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => T::deserialize(v)
            .map(Some)
            .map_err(|e| StoreError::MalformedData {
                subject: format!("{} entry for verb '{}'", resource, verb_id),
                message: e.to_string(),
            }),
    }
}
