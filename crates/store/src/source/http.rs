//! HTTP resource source: fetches resources from a static file server.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Resource paths are appended to `base_url`.

use async_trait::async_trait;

use super::{parse_body, ResourceSource};
use crate::error::SourceError;
use crate::resource::Resource;

/// Largest body accepted; the bundled conjugation file is the big one.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Source that GETs `{base_url}/{resource path}`.
///
/// Non-2xx statuses and transport errors are [`SourceError::Fetch`];
/// a body that is not JSON is [`SourceError::Malformed`].
pub struct HttpSource {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Self {
        HttpSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    pub fn url_for(&self, resource: &Resource) -> String {
        format!("{}/{}", self.base_url, resource.path())
    }
}

#[async_trait]
impl ResourceSource for HttpSource {
    async fn fetch(&self, resource: &Resource) -> Result<serde_json::Value, SourceError> {
        let url = self.url_for(resource);
        let agent = self.agent.clone();
        let owned = resource.clone();

        tokio::task::spawn_blocking(move || {
            let response = agent.get(&url).call().map_err(|e| SourceError::Fetch {
                resource: owned.path(),
                message: e.to_string(),
            })?;

            let body = response
                .into_body()
                .with_config()
                .limit(MAX_BODY_BYTES)
                .read_to_string()
                .map_err(|e| SourceError::Fetch {
                    resource: owned.path(),
                    message: format!("failed to read response body: {}", e),
                })?;

            parse_body(&owned, &body)
        })
        .await
        .map_err(|e| SourceError::Fetch {
            resource: resource.path(),
            message: format!("task join error: {}", e),
        })?
    }

    fn source_id(&self) -> &str {
        "http"
    }
}
