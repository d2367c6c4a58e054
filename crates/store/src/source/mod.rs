//! Resource sources: where the store's JSON comes from.
//!
//! A source fetches ONE resource per call and knows nothing about caching
//! or retries; [`VerbDataStore`](crate::VerbDataStore) layers those on top.

pub mod dir;
pub mod http;
pub mod static_source;

pub use dir::DirSource;
pub use http::HttpSource;
pub use static_source::StaticSource;

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::resource::Resource;

/// Fetches a JSON resource by name.
///
/// Implementations must classify failures: [`SourceError::Fetch`] for
/// anything a retry might fix, [`SourceError::Malformed`] for bodies that
/// are not valid JSON.
#[async_trait]
pub trait ResourceSource: Send + Sync + 'static {
    async fn fetch(&self, resource: &Resource) -> Result<serde_json::Value, SourceError>;

    /// Short identifier for logs (e.g. "http", "dir", "static").
    fn source_id(&self) -> &str;
}

#[async_trait]
impl ResourceSource for Box<dyn ResourceSource> {
    async fn fetch(&self, resource: &Resource) -> Result<serde_json::Value, SourceError> {
        (**self).fetch(resource).await
    }

    fn source_id(&self) -> &str {
        (**self).source_id()
    }
}

/// Build the source a config describes.
pub fn from_config(config: &SourceConfig) -> Box<dyn ResourceSource> {
    match config {
        SourceConfig::Http { base_url } => Box::new(HttpSource::new(base_url)),
        SourceConfig::Dir { path } => Box::new(DirSource::new(path)),
    }
}

/// Parse a fetched body, tagging failures with the resource name.
pub(crate) fn parse_body(resource: &Resource, body: &str) -> Result<serde_json::Value, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Malformed {
        resource: resource.path(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_picks_source_kind() {
        let http = from_config(&SourceConfig::Http {
            base_url: "http://localhost".into(),
        });
        assert_eq!(http.source_id(), "http");
        let dir = from_config(&SourceConfig::default());
        assert_eq!(dir.source_id(), "dir");
    }

    #[test]
    fn parse_body_reports_malformed() {
        let err = parse_body(&Resource::Verbs, "{not json").unwrap_err();
        assert!(matches!(err, SourceError::Malformed { ref resource, .. } if resource == "verbs.json"));
    }
}
