//! Configuration loading for the indexer binary.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use indexer_core::AppConfig;
use std::path::Path;

const ENV_PREFIX: &str = "INDEXER_";

/// Load configuration from, in increasing precedence: the TOML file at
/// `path` (optional), the legacy JSON index descriptor (mapped under
/// `index`), and `INDEXER_` environment variables split on `__`.
pub fn load(path: &Path, legacy_json: Option<&str>) -> Result<AppConfig> {
    let mut figment = Figment::new();
    let has_config_file = path.exists();

    if has_config_file {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path.display());
    }

    let legacy_json = legacy_json.filter(|raw| !raw.trim().is_empty());
    if let Some(raw) = legacy_json {
        let descriptor: serde_json::Value = serde_json::from_str(raw)
            .context("environment variable CONFIG_FILE is not valid JSON")?;
        tracing::info!("Loading index service descriptor from CONFIG_FILE");
        figment = figment.merge(Serialized::default("index", descriptor));
    }

    // INDEXER_CONFIG only names the file
    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with(ENV_PREFIX) && key != "INDEXER_CONFIG");

    if !has_config_file && legacy_json.is_none() && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: indexer --config /path/to/indexer.toml <URL>...\n  \
             2. Index descriptor: CONFIG_FILE='{{\"url\": \"https://...\"}}' indexer <URL>...\n  \
             3. Environment variables: INDEXER_INDEX__URL=https://... indexer <URL>...\n\n\
             Set INDEXER_CONFIG to change the default config file path."
        );
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("failed to load configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_core::StorageConfig;
    use tempfile::tempdir;

    const TOML: &str = r#"
[index]
url = "https://data.example.org/index"
username = "indexer"
password = "secret"
extramural_bucket = true
extramural_uploader_manifest = "manifest.csv"

[index.retry]
max_attempts = 3
delay_ms = 250

[storage]
type = "filesystem"
path = "/srv/buckets"
"#;

    #[test]
    fn load_from_toml_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("indexer.toml");
        std::fs::write(&path, TOML).unwrap();

        let config = load(&path, None).unwrap();
        assert_eq!(config.index.url, "https://data.example.org/index");
        assert_eq!(config.index.credentials(), Some(("indexer", "secret")));
        assert!(config.index.extramural_bucket);
        assert_eq!(
            config.index.extramural_uploader_manifest.as_deref(),
            Some("manifest.csv")
        );
        assert_eq!(config.index.retry.max_attempts, 3);
        assert_eq!(config.index.retry.delay_ms, 250);
        assert!(matches!(config.storage, StorageConfig::Filesystem { .. }));
        config.validate().unwrap();
    }

    #[test]
    fn legacy_descriptor_overrides_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("indexer.toml");
        std::fs::write(&path, TOML).unwrap();

        let legacy = r#"{
            "url": "https://legacy.example.org/index",
            "username": "legacy",
            "password": "pw",
            "extramural_bucket": false,
            "extramural_uploader": null,
            "extramural_fast_mode": true
        }"#;
        let config = load(&path, Some(legacy)).unwrap();
        assert_eq!(config.index.url, "https://legacy.example.org/index");
        assert_eq!(config.index.credentials(), Some(("legacy", "pw")));
        assert!(!config.index.extramural_bucket);
        assert!(config.index.extramural_fast_mode);
        assert!(config.index.extramural_uploader.is_none());
        assert_eq!(config.index.retry.max_attempts, 3);
        assert!(matches!(config.storage, StorageConfig::Filesystem { .. }));
    }

    #[test]
    fn legacy_descriptor_alone_uses_default_storage() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing.toml");

        let config = load(&path, Some(r#"{"url": "https://example.org/index"}"#)).unwrap();
        assert!(matches!(config.storage, StorageConfig::S3 { .. }));
        assert_eq!(config.index.retry.max_attempts, indexer_core::MAX_RETRIES);
    }

    #[test]
    fn invalid_legacy_descriptor_is_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing.toml");

        let err = load(&path, Some("{not json")).unwrap_err();
        assert!(err.to_string().contains("CONFIG_FILE"));
    }

    #[test]
    fn missing_configuration_is_reported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing.toml");

        let err = load(&path, Some("  ")).unwrap_err();
        assert!(err.to_string().contains("No configuration provided"));
    }
}
