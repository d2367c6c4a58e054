//! Settings for one CLI run.
//!
//! Precedence, lowest first: built-in defaults, the `--config` TOML file,
//! `ZMNA_*` environment variables, then command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zmna_search::IndexConfig;
use zmna_store::{DeploymentMode, LazyLoadConfig, SourceConfig, StoreConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Settings {
    #[serde(default)]
    pub(crate) store: StoreConfig,
    #[serde(default)]
    pub(crate) lazy: LazyLoadConfig,
    #[serde(default)]
    pub(crate) index: IndexConfig,
}

/// Source and mode given on the command line.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub(crate) data: Option<PathBuf>,
    pub(crate) url: Option<String>,
    pub(crate) mode: Option<DeploymentMode>,
}

pub(crate) fn read_settings(path: &Path) -> Result<Settings, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

pub(crate) fn resolve<F>(
    config_path: Option<&Path>,
    overrides: &Overrides,
    env: F,
) -> Result<Settings, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match config_path {
        Some(path) => read_settings(path)?,
        None => Settings::default(),
    };
    settings.store = settings.store.with_overrides_from(env)?;

    if let Some(path) = &overrides.data {
        settings.store.source = SourceConfig::Dir { path: path.clone() };
    }
    if let Some(base_url) = &overrides.url {
        settings.store.source = SourceConfig::Http {
            base_url: base_url.clone(),
        };
    }
    if let Some(mode) = overrides.mode {
        settings.store.mode = mode;
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("zmna.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_without_file() {
        let settings = resolve(None, &Overrides::default(), no_env).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.store.max_attempts, 3);
        assert_eq!(settings.index.batch_size, 20);
    }

    #[test]
    fn reads_all_tables() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[store]
mode = "per_verb"
max_attempts = 5

[store.source]
kind = "http"
base_url = "https://verbs.example.org"

[lazy]
observer_supported = false

[index]
query_cache_size = 10
"#,
        );
        let settings = resolve(Some(&path), &Overrides::default(), no_env).unwrap();
        assert_eq!(settings.store.mode, DeploymentMode::PerVerb);
        assert_eq!(settings.store.max_attempts, 5);
        assert_eq!(
            settings.store.source,
            SourceConfig::Http {
                base_url: "https://verbs.example.org".into()
            }
        );
        assert!(!settings.lazy.observer_supported);
        assert_eq!(settings.lazy.root_margin_px, 200);
        assert_eq!(settings.index.query_cache_size, 10);
        assert_eq!(settings.index.batch_size, 20);
    }

    #[test]
    fn env_beats_file_and_flags_beat_env() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[store]\nmode = \"bundled\"\n");
        let env = |key: &str| match key {
            "ZMNA_MODE" => Some("per_verb".to_string()),
            "ZMNA_BASE_URL" => Some("http://localhost:8000".to_string()),
            _ => None,
        };

        let settings = resolve(Some(&path), &Overrides::default(), env).unwrap();
        assert_eq!(settings.store.mode, DeploymentMode::PerVerb);
        assert!(matches!(settings.store.source, SourceConfig::Http { .. }));

        let flags = Overrides {
            data: Some(PathBuf::from("/srv/verbs")),
            url: None,
            mode: Some(DeploymentMode::Bundled),
        };
        let settings = resolve(Some(&path), &flags, env).unwrap();
        assert_eq!(settings.store.mode, DeploymentMode::Bundled);
        assert_eq!(
            settings.store.source,
            SourceConfig::Dir {
                path: PathBuf::from("/srv/verbs")
            }
        );
    }

    #[test]
    fn unreadable_or_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(resolve(Some(&missing), &Overrides::default(), no_env)
            .unwrap_err()
            .contains("could not read"));

        let bad = write_config(&dir, "[store\n");
        assert!(resolve(Some(&bad), &Overrides::default(), no_env)
            .unwrap_err()
            .contains("could not parse"));
    }
}
