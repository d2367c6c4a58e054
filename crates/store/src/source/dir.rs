//! Directory resource source: reads resources from a local build output.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{parse_body, ResourceSource};
use crate::error::SourceError;
use crate::resource::Resource;

/// Source that reads `{root}/{resource path}`.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        DirSource {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, resource: &Resource) -> PathBuf {
        self.root.join(resource.path())
    }
}

#[async_trait]
impl ResourceSource for DirSource {
    async fn fetch(&self, resource: &Resource) -> Result<serde_json::Value, SourceError> {
        let path = self.path_for(resource);
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::Fetch {
                resource: resource.path(),
                message: format!("cannot read {}: {}", path.display(), e),
            })?;
        parse_body(resource, &body)
    }

    fn source_id(&self) -> &str {
        "dir"
    }
}
