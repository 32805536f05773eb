//! Configuration for [`Memory`](crate::Memory).
//!
//! Values come from an optional JSON file named by `SONO_CONFIG`, then
//! individual environment variables override them:
//!
//! | variable                     | field                              |
//! |------------------------------|------------------------------------|
//! | `SONO_STORE_PATH`            | `store_path`                       |
//! | `SONO_INDEX_PATH`            | `index_path`                       |
//! | `SONO_SEMANTIC_THRESHOLD`    | `thresholds.semantic`              |
//! | `OPENAI_API_KEY`             | enables both providers             |
//! | `SONO_PROVIDER_URL`          | provider `base_url`                |
//! | `SONO_EMBED_MODEL`           | `embedding.model`                  |
//! | `SONO_REWRITE_MODEL`         | `rewrite.model`                    |
//! | `SONO_PROVIDER_TIMEOUT_SECS` | provider `timeout_secs`            |

use serde::{Deserialize, Serialize};
use sono::Thresholds;
use std::path::PathBuf;
use tracing::warn;

use crate::Result;

pub const DEFAULT_STORE_PATH: &str = "sono_facts.json";
pub const DEFAULT_PROVIDER_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_REWRITE_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// The fact document.
    pub store_path: PathBuf,
    /// The embedding index; kept in memory when unset.
    pub index_path: Option<PathBuf>,
    pub thresholds: Thresholds,
    pub embedding: Option<ProviderConfig>,
    pub rewrite: Option<ProviderConfig>,
    /// Extra `(alias, canonical subject)` pairs on top of the built-in ones.
    pub subject_aliases: Vec<(String, String)>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            index_path: None,
            thresholds: Thresholds::default(),
            embedding: None,
            rewrite: None,
            subject_aliases: Vec::new(),
        }
    }
}

/// An OpenAI-compatible HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ProviderConfig {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl MemoryConfig {
    /// Configuration for a store at `path`, everything else default.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: path.into(),
            ..Self::default()
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    ///
    /// Only an unreadable or malformed `SONO_CONFIG` file is an error;
    /// unparsable numeric overrides are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = match var("SONO_CONFIG") {
            Some(file) => serde_json::from_str(&std::fs::read_to_string(file)?)?,
            None => Self::default(),
        };

        if let Some(path) = var("SONO_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(path) = var("SONO_INDEX_PATH") {
            config.index_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = var("SONO_SEMANTIC_THRESHOLD") {
            match raw.parse::<f32>() {
                Ok(t) if (0.0..=1.0).contains(&t) => config.thresholds.semantic = t,
                _ => warn!(value = %raw, "ignoring SONO_SEMANTIC_THRESHOLD"),
            }
        }

        if let Some(key) = var("OPENAI_API_KEY") {
            config
                .embedding
                .get_or_insert_with(|| ProviderConfig::new(&key, DEFAULT_EMBED_MODEL))
                .api_key = key.clone();
            config
                .rewrite
                .get_or_insert_with(|| ProviderConfig::new(&key, DEFAULT_REWRITE_MODEL))
                .api_key = key.clone();
        }
        let timeout = var("SONO_PROVIDER_TIMEOUT_SECS").and_then(|raw| match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Some(secs),
            _ => {
                warn!(value = %raw, "ignoring SONO_PROVIDER_TIMEOUT_SECS");
                None
            }
        });
        let base_url = var("SONO_PROVIDER_URL");
        let models = [var("SONO_EMBED_MODEL"), var("SONO_REWRITE_MODEL")];
        for (provider, model) in [&mut config.embedding, &mut config.rewrite]
            .into_iter()
            .zip(models)
        {
            let Some(provider) = provider.as_mut() else {
                continue;
            };
            if let Some(url) = &base_url {
                provider.base_url = url.trim_end_matches('/').to_string();
            }
            if let Some(model) = model {
                provider.model = model;
            }
            if let Some(secs) = timeout {
                provider.timeout_secs = secs;
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = MemoryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, MemoryConfig::default());
        assert!(config.embedding.is_none());
        assert!(config.rewrite.is_none());
    }

    #[test]
    fn api_key_enables_both_providers() {
        let config = MemoryConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("SONO_EMBED_MODEL", "tiny-embed"),
            ("SONO_PROVIDER_URL", "http://localhost:8080/v1/"),
            ("SONO_PROVIDER_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        let embedding = config.embedding.unwrap();
        assert_eq!(embedding.api_key, "sk-test");
        assert_eq!(embedding.model, "tiny-embed");
        assert_eq!(embedding.base_url, "http://localhost:8080/v1");
        assert_eq!(embedding.timeout_secs, 3);
        let rewrite = config.rewrite.unwrap();
        assert_eq!(rewrite.model, DEFAULT_REWRITE_MODEL);
        assert_eq!(rewrite.timeout_secs, 3);
    }

    #[test]
    fn path_and_threshold_overrides() {
        let config = MemoryConfig::from_lookup(lookup(&[
            ("SONO_STORE_PATH", "/data/pam.json"),
            ("SONO_INDEX_PATH", "/data/pam.redb"),
            ("SONO_SEMANTIC_THRESHOLD", "0.8"),
        ]))
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/data/pam.json"));
        assert_eq!(config.index_path, Some(PathBuf::from("/data/pam.redb")));
        assert!((config.thresholds.semantic - 0.8).abs() < 1e-6);
    }

    #[test]
    fn bad_numbers_are_ignored() {
        let config = MemoryConfig::from_lookup(lookup(&[
            ("SONO_SEMANTIC_THRESHOLD", "high"),
            ("SONO_PROVIDER_TIMEOUT_SECS", "-1"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.embedding.unwrap().timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn config_file_is_read_then_overridden() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "store_path": "/srv/facts.json",
                "thresholds": {{"fuzzy_relation": 0.75}},
                "subject_aliases": [["grandma", "Pam"]]
            }}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let config = MemoryConfig::from_lookup(lookup(&[
            ("SONO_CONFIG", path.as_str()),
            ("SONO_INDEX_PATH", "/srv/index.redb"),
        ]))
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/srv/facts.json"));
        assert_eq!(config.index_path, Some(PathBuf::from("/srv/index.redb")));
        assert!((config.thresholds.fuzzy_relation - 0.75).abs() < 1e-9);
        assert_eq!(config.thresholds.semantic, sono::similarity::SEMANTIC_THRESHOLD);
        assert_eq!(
            config.subject_aliases,
            vec![("grandma".to_string(), "Pam".to_string())]
        );
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert!(MemoryConfig::from_lookup(lookup(&[("SONO_CONFIG", path.as_str())])).is_err());
        assert!(MemoryConfig::from_lookup(lookup(&[("SONO_CONFIG", "/no/such/file.json")])).is_err());
    }
}
