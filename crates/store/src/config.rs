//! Store configuration.
//!
//! Every field has a default, so an empty TOML table is a valid config.
//! Environment variables override file values:
//! - `ZMNA_BASE_URL`: switch to an HTTP source rooted at this URL
//! - `ZMNA_DATA_DIR`: switch to a directory source
//! - `ZMNA_MODE`: `bundled` or `per_verb`

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where resources are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Http { base_url: String },
    Dir { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Dir {
            path: PathBuf::from("data"),
        }
    }
}

/// How verb data is laid out on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// Five shared files hold every verb's data.
    #[default]
    Bundled,
    /// One pre-merged file per verb under `verbs/`.
    PerVerb,
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bundled" => Ok(DeploymentMode::Bundled),
            "per_verb" | "per-verb" => Ok(DeploymentMode::PerVerb),
            other => Err(format!(
                "unknown deployment mode '{}' (expected bundled or per_verb)",
                other
            )),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

/// Configuration for a [`VerbDataStore`](crate::VerbDataStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub mode: DeploymentMode,
    /// Fetch attempts per resource, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            source: SourceConfig::default(),
            mode: DeploymentMode::default(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl StoreConfig {
    /// Delay before retry number `attempt` (1-based: the delay after the
    /// first failed attempt is `backoff(1)`).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms).saturating_mul(factor)
    }

    /// Apply `ZMNA_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, String> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `ZMNA_*` overrides from an arbitrary lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ZMNA_DATA_DIR") {
            self.source = SourceConfig::Dir {
                path: PathBuf::from(path),
            };
        }
        if let Some(base_url) = lookup("ZMNA_BASE_URL") {
            self.source = SourceConfig::Http { base_url };
        }
        if let Some(mode) = lookup("ZMNA_MODE") {
            self.mode = mode.parse()?;
        }
        Ok(self)
    }
}
