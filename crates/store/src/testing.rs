//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use crate::error::SourceError;
use crate::flight::lock;
use crate::resource::Resource;
use crate::source::{ResourceSource, StaticSource};

/// Two verbs: `to_go` (multi-preverb, with rules) and `to_write` (single).
pub(crate) fn fixture_source() -> StaticSource {
    let verbs = json!({
        "to_go": {
            "georgian": "მისვლა",
            "description": "to go (there)",
            "category": "motion",
            "class": "IV",
            "semantic_key": "go",
            "preverb_config": {
                "has_multiple_preverbs": true,
                "default_preverb": "მი",
                "available_preverbs": ["მი", "წა", "გა"]
            }
        },
        "to_write": {
            "georgian": "წერა",
            "description": "to write",
            "category": "communication",
            "class": "I",
            "semantic_key": "write",
            "preverb_config": {
                "has_multiple_preverbs": false,
                "default_preverb": "და",
                "available_preverbs": ["და"]
            }
        }
    });
    let conjugations = json!({
        "to_go": {
            "present": {"forms": {"1sg": "მივდივარ", "3sg": "მიდის", "3pl": "-"}},
            "future": {"forms": {"1sg": "მივალ"}}
        },
        "to_write": {
            "present": {"forms": {"1sg": "ვწერ", "3sg": "წერს"}},
            "future": {"forms": {"1sg": "დავწერ"}}
        }
    });
    let examples = json!({
        "to_go": {"მი": {"present": "<p>mi</p>"}, "წა": {"present": "<p>tsa</p>"}},
        "to_write": {"present": "<p>I write</p>"}
    });
    let gloss = json!({
        "to_go": {"მი": {"present": "<b>PRES</b>"}}
    });
    let rules = json!({
        "to_go": {"default": "მი", "replacements": {"წა": "წა", "გა": "გა"}}
    });

    let merged = |id: &str| {
        let mut record = verbs[id].clone();
        record["id"] = json!(id);
        record["conjugations"] = conjugations[id].clone();
        if let Some(r) = rules.get(id) {
            record["preverb_rules"] = r.clone();
        }
        if let Some(e) = examples.get(id) {
            record["examples"] = e.clone();
        }
        record
    };

    let mut source = StaticSource::new();
    source.insert(Resource::Verb("to_go".into()), merged("to_go"));
    source.insert(Resource::Verb("to_write".into()), merged("to_write"));
    source.insert(Resource::Verbs, verbs);
    source.insert(Resource::Conjugations, conjugations);
    source.insert(Resource::Examples, examples);
    source.insert(Resource::GlossAnalyses, gloss);
    source.insert(Resource::PreverbConfigs, rules);
    source
}

/// Wraps a [`StaticSource`] with call recording, latency, and injected
/// transient failures.
pub(crate) struct ScriptedSource {
    inner: StaticSource,
    delay: Duration,
    failures: Mutex<HashMap<Resource, usize>>,
    calls: Mutex<HashMap<Resource, Vec<Instant>>>,
}

impl ScriptedSource {
    pub(crate) fn new(inner: StaticSource) -> Self {
        ScriptedSource {
            inner,
            delay: Duration::ZERO,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every fetch of `resource`.
    pub(crate) fn failing(self, resource: Resource) -> Self {
        self.failing_times(resource, usize::MAX)
    }

    /// Fail the first `times` fetches of `resource`.
    pub(crate) fn failing_times(self, resource: Resource, times: usize) -> Self {
        lock(&self.failures).insert(resource, times);
        self
    }

    pub(crate) fn calls(&self, resource: &Resource) -> usize {
        lock(&self.calls).get(resource).map_or(0, Vec::len)
    }

    pub(crate) fn call_times(&self, resource: &Resource) -> Vec<Instant> {
        lock(&self.calls).get(resource).cloned().unwrap_or_default()
    }

    pub(crate) fn total_calls(&self) -> usize {
        lock(&self.calls).values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ResourceSource for ScriptedSource {
    async fn fetch(&self, resource: &Resource) -> Result<serde_json::Value, SourceError> {
        lock(&self.calls)
            .entry(resource.clone())
            .or_default()
            .push(Instant::now());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fail = {
            let mut failures = lock(&self.failures);
            match failures.get_mut(resource) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if fail {
            return Err(SourceError::Fetch {
                resource: resource.path(),
                message: "503 Service Unavailable".to_string(),
            });
        }
        self.inner.fetch(resource).await
    }

    fn source_id(&self) -> &str {
        "scripted"
    }
}
