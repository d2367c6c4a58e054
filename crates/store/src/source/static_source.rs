//! In-memory resource source.

use std::collections::HashMap;

use async_trait::async_trait;

use super::ResourceSource;
use crate::error::SourceError;
use crate::resource::Resource;

/// Source backed by a fixed map of resources.
///
/// Useful for tests and for embedding a verb set in a binary.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    values: HashMap<Resource, serde_json::Value>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<Resource, serde_json::Value>) -> Self {
        StaticSource { values }
    }

    pub fn insert(&mut self, resource: Resource, value: serde_json::Value) {
        self.values.insert(resource, value);
    }
}

#[async_trait]
impl ResourceSource for StaticSource {
    async fn fetch(&self, resource: &Resource) -> Result<serde_json::Value, SourceError> {
        self.values
            .get(resource)
            .cloned()
            .ok_or_else(|| SourceError::Fetch {
                resource: resource.path(),
                message: "no such resource".to_string(),
            })
    }

    fn source_id(&self) -> &str {
        "static"
    }
}
