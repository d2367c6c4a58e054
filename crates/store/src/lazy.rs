//! Deciding when verb data gets loaded.
//!
//! A verb is loaded when its section comes within `root_margin_px` of the
//! viewport, immediately when the user navigates to it, or at startup when
//! the host cannot report viewport positions at all. Each completed load is
//! announced on a broadcast channel so the rendering layer can fill in the
//! verb's section.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use zmna_core::VerbRecord;

use crate::error::StoreError;
use crate::flight::lock;
use crate::source::ResourceSource;
use crate::store::{LoadState, VerbDataStore};

const EVENT_CAPACITY: usize = 256;

fn default_root_margin_px() -> u32 {
    200
}

fn default_max_auto_retries() -> u32 {
    2
}

fn default_observer_supported() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyLoadConfig {
    /// Sections this close to the viewport are loaded.
    #[serde(default = "default_root_margin_px")]
    pub root_margin_px: u32,
    /// Extra store-level attempts after a failed load before giving up.
    #[serde(default = "default_max_auto_retries")]
    pub max_auto_retries: u32,
    /// Whether the host reports section visibility. When false every
    /// verb is loaded at [`LazyLoader::start`].
    #[serde(default = "default_observer_supported")]
    pub observer_supported: bool,
}

impl Default for LazyLoadConfig {
    fn default() -> Self {
        LazyLoadConfig {
            root_margin_px: default_root_margin_px(),
            max_auto_retries: default_max_auto_retries(),
            observer_supported: default_observer_supported(),
        }
    }
}

/// Emitted when a scheduled load finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    Loaded { verb_id: String },
    /// Every automatic re-attempt failed; the verb is back to `Unloaded`.
    Failed { verb_id: String, error: StoreError },
}

impl LoadEvent {
    pub fn verb_id(&self) -> &str {
        match self {
            LoadEvent::Loaded { verb_id } | LoadEvent::Failed { verb_id, .. } => verb_id,
        }
    }
}

/// A verb section's distance from the viewport, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionVisibility {
    pub verb_id: String,
    /// Zero when the section intersects the viewport.
    pub distance_px: u32,
}

impl SectionVisibility {
    pub fn new(verb_id: impl Into<String>, distance_px: u32) -> Self {
        SectionVisibility {
            verb_id: verb_id.into(),
            distance_px,
        }
    }
}

/// Schedules loads against a shared [`VerbDataStore`].
///
/// Load state is read from the store, so clearing a verb there makes it
/// loadable again here. Cloning is cheap; clones share the event channel.
///
/// The synchronous triggers spawn background tasks and must be called
/// from within a Tokio runtime.
pub struct LazyLoader<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for LazyLoader<S> {
    fn clone(&self) -> Self {
        LazyLoader {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S> {
    store: Arc<VerbDataStore<S>>,
    config: LazyLoadConfig,
    /// Verbs with a load task of this loader running.
    pending: Mutex<HashSet<String>>,
    events: broadcast::Sender<LoadEvent>,
}

impl<S: ResourceSource> LazyLoader<S> {
    pub fn new(store: Arc<VerbDataStore<S>>, config: LazyLoadConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        LazyLoader {
            inner: Arc::new(Inner {
                store,
                config,
                pending: Mutex::new(HashSet::new()),
                events,
            }),
        }
    }

    pub fn store(&self) -> &Arc<VerbDataStore<S>> {
        &self.inner.store
    }

    pub fn config(&self) -> &LazyLoadConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoadEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self, verb_id: &str) -> LoadState {
        match self.inner.store.load_state(verb_id) {
            LoadState::Unloaded if lock(&self.inner.pending).contains(verb_id) => {
                LoadState::Loading
            }
            state => state,
        }
    }

    // ── Triggers ──────────────────────────────────────────────────────────────

    /// Called once the page's verb list is known. Without visibility
    /// reports, schedules every verb; otherwise does nothing. Returns the
    /// number of loads started.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self, verb_ids: &[String]) -> usize {
        if self.inner.config.observer_supported {
            return 0;
        }
        info!(count = verb_ids.len(), "no visibility observer; loading all verbs");
        verb_ids.iter().filter(|id| self.request(id)).count()
    }

    /// Schedule loads for sections within the margin. Returns the ids
    /// whose loads were started by this call.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn on_visibility(&self, sections: &[SectionVisibility]) -> Vec<String> {
        let margin = self.inner.config.root_margin_px;
        sections
            .iter()
            .filter(|s| s.distance_px <= margin)
            .filter(|s| self.request(&s.verb_id))
            .map(|s| s.verb_id.clone())
            .collect()
    }

    /// Start a background load unless one is running or done.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn request(&self, verb_id: &str) -> bool {
        if !self.claim(verb_id) {
            return false;
        }
        let loader = self.clone();
        let verb_id = verb_id.to_string();
        tokio::spawn(async move {
            loader.run_load(&verb_id).await;
        });
        true
    }

    /// Load now and wait for the data, for direct navigation.
    pub async fn navigate_to(&self, verb_id: &str) -> Option<Arc<VerbRecord>> {
        debug!(verb_id, "direct navigation");
        if self.claim(verb_id) {
            return self.run_load(verb_id).await;
        }
        // Already loading or loaded; the store joins or serves it.
        self.inner.store.get_verb_data(verb_id).await
    }

    /// Navigate to the verb a URL fragment names.
    pub async fn navigate_to_anchor(&self, anchor: &str) -> Option<Arc<VerbRecord>> {
        let verb_id = resolve_anchor(anchor)?;
        self.navigate_to(&verb_id).await
    }

    /// Load every listed verb and wait for all of them. Returns how many
    /// of them loaded.
    pub async fn load_all(&self, verb_ids: &[String]) -> usize {
        let mut loads = JoinSet::new();
        for verb_id in verb_ids {
            let loader = self.clone();
            let verb_id = verb_id.clone();
            if self.claim(&verb_id) {
                loads.spawn(async move { loader.run_load(&verb_id).await.is_some() });
            } else {
                // Loaded, or loading in another task; the store serves or joins it.
                loads.spawn(async move {
                    loader.inner.store.get_verb_data(&verb_id).await.is_some()
                });
            }
        }
        let mut loaded = 0;
        while let Some(done) = loads.join_next().await {
            if matches!(done, Ok(true)) {
                loaded += 1;
            }
        }
        loaded
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Reserve a load for this loader. Fails if the store already holds
    /// the verb or one of our tasks is loading it.
    fn claim(&self, verb_id: &str) -> bool {
        if self.inner.store.is_loaded(verb_id) {
            return false;
        }
        lock(&self.inner.pending).insert(verb_id.to_string())
    }

    async fn run_load(&self, verb_id: &str) -> Option<Arc<VerbRecord>> {
        let attempts = 1 + self.inner.config.max_auto_retries;
        let mut attempt = 1;
        let outcome = loop {
            match self.inner.store.try_get_verb_data(verb_id).await {
                Ok(record) => break Ok(record),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(verb_id, attempt, error = %e, "verb load failed; re-attempting");
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };
        // Released before announcing, so subscribers may trigger again.
        lock(&self.inner.pending).remove(verb_id);

        // No subscribers is fine.
        match outcome {
            Ok(record) => {
                let _ = self.inner.events.send(LoadEvent::Loaded {
                    verb_id: verb_id.to_string(),
                });
                Some(record)
            }
            Err(error) => {
                warn!(verb_id, attempts = attempt, error = %error, "giving up on verb load");
                let _ = self.inner.events.send(LoadEvent::Failed {
                    verb_id: verb_id.to_string(),
                    error,
                });
                None
            }
        }
    }
}

/// The verb id a URL fragment points at: `#to_go` or `#verb-to_go`.
pub fn resolve_anchor(anchor: &str) -> Option<String> {
    let fragment = anchor.trim().trim_start_matches('#');
    let verb_id = fragment.strip_prefix("verb-").unwrap_or(fragment);
    if verb_id.is_empty() {
        None
    } else {
        Some(verb_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeploymentMode, StoreConfig};
    use crate::resource::Resource;
    use crate::testing::{fixture_source, ScriptedSource};
    use std::time::Duration;

    fn loader_with(source: ScriptedSource, config: LazyLoadConfig) -> LazyLoader<ScriptedSource> {
        let store_config = StoreConfig {
            mode: DeploymentMode::PerVerb,
            ..StoreConfig::default()
        };
        LazyLoader::new(Arc::new(VerbDataStore::new(source, store_config)), config)
    }

    fn loader() -> LazyLoader<ScriptedSource> {
        loader_with(
            ScriptedSource::new(fixture_source()).with_delay(Duration::from_millis(10)),
            LazyLoadConfig::default(),
        )
    }

    #[test]
    fn config_defaults() {
        let config: LazyLoadConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LazyLoadConfig::default());
        assert_eq!(config.root_margin_px, 200);
        assert_eq!(config.max_auto_retries, 2);
        assert!(config.observer_supported);
    }

    #[test]
    fn anchors() {
        assert_eq!(resolve_anchor("#to_go").as_deref(), Some("to_go"));
        assert_eq!(resolve_anchor("#verb-to_go").as_deref(), Some("to_go"));
        assert_eq!(resolve_anchor("to_write").as_deref(), Some("to_write"));
        assert_eq!(resolve_anchor("#"), None);
        assert_eq!(resolve_anchor(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sections_near_viewport_are_loaded() {
        let loader = loader();
        let mut events = loader.subscribe();

        let started = loader.on_visibility(&[
            SectionVisibility::new("to_go", 0),
            SectionVisibility::new("to_write", 201),
        ]);
        assert_eq!(started, vec!["to_go"]);
        assert_eq!(loader.state("to_go"), LoadState::Loading);
        assert_eq!(loader.state("to_write"), LoadState::Unloaded);

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            LoadEvent::Loaded {
                verb_id: "to_go".into()
            }
        );
        assert_eq!(loader.state("to_go"), LoadState::Loaded);

        let started = loader.on_visibility(&[SectionVisibility::new("to_write", 200)]);
        assert_eq!(started, vec!["to_write"]);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_requests_are_no_ops() {
        let loader = loader();
        let mut events = loader.subscribe();

        assert!(loader.request("to_go"));
        assert!(!loader.request("to_go"));
        assert!(loader.on_visibility(&[SectionVisibility::new("to_go", 0)]).is_empty());

        events.recv().await.unwrap();
        assert!(!loader.request("to_go"));
        assert_eq!(
            loader.store().source().calls(&Resource::Verb("to_go".into())),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_verbs_load_again_on_the_next_trigger() {
        let loader = loader();
        let mut events = loader.subscribe();
        let to_go = Resource::Verb("to_go".into());

        assert!(loader.request("to_go"));
        events.recv().await.unwrap();
        assert_eq!(loader.state("to_go"), LoadState::Loaded);

        assert!(loader.store().clear_verb_cache("to_go"));
        assert_eq!(loader.state("to_go"), LoadState::Unloaded);
        assert!(loader.request("to_go"));
        assert_eq!(
            events.recv().await.unwrap(),
            LoadEvent::Loaded {
                verb_id: "to_go".into()
            }
        );
        assert_eq!(loader.store().source().calls(&to_go), 2);

        loader.store().clear_all();
        assert_eq!(loader.state("to_go"), LoadState::Unloaded);
        assert_eq!(
            loader.on_visibility(&[SectionVisibility::new("to_go", 0)]),
            vec!["to_go"]
        );
        events.recv().await.unwrap();
        assert_eq!(loader.store().source().calls(&to_go), 3);
        assert_eq!(loader.state("to_go"), LoadState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_loads_immediately() {
        let loader = loader();
        let mut events = loader.subscribe();

        let record = loader.navigate_to_anchor("#verb-to_go").await.unwrap();
        assert_eq!(record.id, "to_go");
        assert_eq!(loader.state("to_go"), LoadState::Loaded);
        assert_eq!(events.try_recv().unwrap().verb_id(), "to_go");

        // Second navigation is served from cache without another event.
        assert!(loader.navigate_to("to_go").await.is_some());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_joins_a_background_load() {
        let loader = loader();
        assert!(loader.request("to_go"));
        let record = loader.navigate_to("to_go").await;
        assert!(record.is_some());
        assert_eq!(
            loader.store().source().calls(&Resource::Verb("to_go".into())),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_loads_are_reattempted_then_reported() {
        let source = ScriptedSource::new(fixture_source()).failing(Resource::Verb("to_go".into()));
        let loader = loader_with(source, LazyLoadConfig::default());
        let mut events = loader.subscribe();

        assert!(loader.navigate_to("to_go").await.is_none());
        // Three store attempts for each of the three lazy-level attempts.
        assert_eq!(
            loader.store().source().calls(&Resource::Verb("to_go".into())),
            9
        );
        assert_eq!(loader.state("to_go"), LoadState::Unloaded);
        assert!(matches!(
            events.try_recv().unwrap(),
            LoadEvent::Failed { ref verb_id, error: StoreError::ResourceFetch { .. } } if verb_id == "to_go"
        ));

        // Unloaded again, so a later trigger may try once more.
        assert!(loader.request("to_go"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_verbs_fail_without_reattempts() {
        let loader = loader();
        let mut events = loader.subscribe();
        assert!(loader.navigate_to("to_fly").await.is_none());
        assert_eq!(loader.store().source().calls(&Resource::Verbs), 1);
        assert!(matches!(
            events.try_recv().unwrap(),
            LoadEvent::Failed {
                error: StoreError::UnknownVerb { .. },
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn start_loads_everything_without_an_observer() {
        let ids = vec!["to_go".to_string(), "to_write".to_string()];

        let observed = loader();
        assert_eq!(observed.start(&ids), 0);
        assert_eq!(observed.state("to_go"), LoadState::Unloaded);

        let eager = loader_with(
            ScriptedSource::new(fixture_source()),
            LazyLoadConfig {
                observer_supported: false,
                ..LazyLoadConfig::default()
            },
        );
        let mut events = eager.subscribe();
        assert_eq!(eager.start(&ids), 2);
        let mut loaded = vec![
            events.recv().await.unwrap().verb_id().to_string(),
            events.recv().await.unwrap().verb_id().to_string(),
        ];
        loaded.sort();
        assert_eq!(loaded, ids);
    }

    #[tokio::test(start_paused = true)]
    async fn load_all_waits_for_every_verb() {
        let loader = loader();
        let ids = vec!["to_go".to_string(), "to_write".to_string(), "to_fly".to_string()];
        assert!(loader.request("to_go"));
        assert_eq!(loader.load_all(&ids).await, 2);
        assert_eq!(loader.store().cache_stats().loaded, 2);
        assert_eq!(
            loader.store().source().calls(&Resource::Verb("to_go".into())),
            1
        );
    }
}
