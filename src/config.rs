use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::analyzer::languages::plugin_for_language;
use crate::analyzer::registry::AnalyzerRegistry;

pub const CONFIG_FILENAME: &str = ".codeshape.json";
pub const GLOBAL_CONFIG_DIR: &str = "codeshape";
pub const GLOBAL_CONFIG_FILENAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid JSON in {}: {source}", path.display())]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub output: OutputConfig,
    pub walk: WalkConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Extra file extensions mapped to a built-in language, e.g. `"vue": "typescript"`
    pub extensions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Include each element's source text in the output
    pub include_source: bool,
    /// Max characters of source text per element when included
    pub truncate_source: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkConfig {
    /// Glob patterns of paths to skip when analyzing directories
    pub ignore: Vec<String>,
    /// Max file size in bytes (files larger are skipped)
    pub max_file_size: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            include_source: false,
            truncate_source: 200,
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            ignore: vec![],
            max_file_size: 1_048_576, // 1 MiB
        }
    }
}

/// Returns the path to the global config file, if the platform config dir exists.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILENAME))
}

/// Reads a JSON file as a `serde_json::Value`. Returns empty `{}` if the file doesn't exist.
fn load_json_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Recursively merges two JSON values. Objects merge key-by-key; arrays and scalars
/// in `overlay` replace whatever is in `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Loads global + local config files and merges them, local winning.
/// Global config errors are logged and skipped; local config errors propagate.
pub fn load_and_merge(
    global_path: Option<&Path>,
    local_path: &Path,
) -> Result<Config, ConfigError> {
    let global_value = match global_path {
        Some(path) => load_json_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load global config, skipping");
            Value::Object(serde_json::Map::new())
        }),
        None => Value::Object(serde_json::Map::new()),
    };

    let local_value = load_json_file(local_path)?;
    let merged = deep_merge(global_value, local_value);

    serde_json::from_value(merged).map_err(|e| ConfigError::InvalidJson {
        path: local_path.to_path_buf(),
        source: e,
    })
}

impl Config {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        load_and_merge(global_config_path().as_deref(), &root.join(CONFIG_FILENAME))
    }

    pub fn validate_file(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(root: &Path) -> Result<Config, ConfigError> {
        Self::validate_file(&root.join(CONFIG_FILENAME))
    }

    pub fn validate_global() -> Result<Config, ConfigError> {
        let path = global_config_path().ok_or_else(|| ConfigError::NotFound {
            path: PathBuf::from("<no config dir>"),
        })?;
        Self::validate_file(&path)
    }

    /// Extension aliases whose target language has no built-in analyzer.
    pub fn unknown_aliases(&self) -> Vec<(&str, &str)> {
        self.analyzer
            .extensions
            .iter()
            .filter(|(_, language)| plugin_for_language(language).is_none())
            .map(|(ext, language)| (ext.as_str(), language.as_str()))
            .collect()
    }

    /// Registers the configured extension aliases. Must run before discovery so
    /// the aliases count as explicit registrations.
    pub fn register_aliases(&self, registry: &mut AnalyzerRegistry) {
        for (ext, language) in &self.analyzer.extensions {
            match plugin_for_language(language) {
                Some(analyzer) => registry.register(&[ext], analyzer),
                None => {
                    tracing::warn!(extension = %ext, language = %language, "Unknown language in extension alias, skipping");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.output.truncate_source, 200);
        assert_eq!(config.walk.max_file_size, 1_048_576);
        assert!(config.analyzer.extensions.is_empty());
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let local_path = dir.path().join(CONFIG_FILENAME);
        let config = load_and_merge(None, &local_path).unwrap();
        assert!(!config.output.include_source);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_content = r#"{
  "analyzer": {
    "extensions": { "vue": "typescript", "pyx": "python" }
  },
  "output": {
    "format": "json",
    "include_source": true,
    "truncate_source": 80
  },
  "walk": {
    "ignore": ["generated/", "*.min.js"],
    "max_file_size": 524288
  }
}"#;
        fs::write(dir.path().join(CONFIG_FILENAME), config_content).unwrap();

        let config = load_and_merge(None, &dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.analyzer.extensions["vue"], "typescript");
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.include_source);
        assert_eq!(config.output.truncate_source, 80);
        assert_eq!(config.walk.ignore, vec!["generated/", "*.min.js"]);
        assert_eq!(config.walk.max_file_size, 524288);
    }

    #[test]
    fn test_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"{ "output": { "format": "json" } }"#,
        )
        .unwrap();

        let config = load_and_merge(None, &dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.truncate_source, 200);
        assert_eq!(config.walk.max_file_size, 1_048_576);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "{bad json").unwrap();

        let result = load_and_merge(None, &dir.path().join(CONFIG_FILENAME));
        assert!(matches!(result, Err(ConfigError::InvalidJson { .. })));
    }

    #[test]
    fn test_load_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config_content = r#"{ "walk": { "max_file_size": 10, "typo_field": true } }"#;
        fs::write(dir.path().join(CONFIG_FILENAME), config_content).unwrap();

        let err = load_and_merge(None, &dir.path().join(CONFIG_FILENAME)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
        assert!(err.to_string().contains("typo_field"));
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::validate(dir.path());
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_validate_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"{ "walk": { "ignore": ["dist/"] } }"#,
        )
        .unwrap();

        let config = Config::validate(dir.path()).unwrap();
        assert_eq!(config.walk.ignore, vec!["dist/"]);
    }

    #[test]
    fn test_deep_merge_nested_override() {
        let base: Value = serde_json::json!({"output": {"format": "json", "truncate_source": 80}});
        let overlay: Value = serde_json::json!({"output": {"format": "text"}});
        let merged = deep_merge(base, overlay);
        assert_eq!(
            merged,
            serde_json::json!({"output": {"format": "text", "truncate_source": 80}})
        );
    }

    #[test]
    fn test_deep_merge_array_replacement() {
        let base: Value = serde_json::json!({"walk": {"ignore": ["node_modules/"]}});
        let overlay: Value = serde_json::json!({"walk": {"ignore": ["dist/", "build/"]}});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged, serde_json::json!({"walk": {"ignore": ["dist/", "build/"]}}));
    }

    #[test]
    fn test_deep_merge_disjoint_and_empty() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged, serde_json::json!({"a": 1, "b": 2}));
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({}));
        assert_eq!(merged, serde_json::json!({"a": 1}));
    }

    #[test]
    fn test_load_and_merge_local_overrides_global() {
        let dir = tempfile::tempdir().unwrap();
        let global_path = dir.path().join("global.json");
        let local_path = dir.path().join("local.json");

        fs::write(
            &global_path,
            r#"{"output": {"format": "json"}, "analyzer": {"extensions": {"vue": "typescript"}}}"#,
        )
        .unwrap();
        fs::write(&local_path, r#"{"output": {"format": "text"}}"#).unwrap();

        let config = load_and_merge(Some(&global_path), &local_path).unwrap();
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.analyzer.extensions["vue"], "typescript");
    }

    #[test]
    fn test_load_and_merge_invalid_global_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let global_path = dir.path().join("global.json");
        let local_path = dir.path().join("local.json");

        fs::write(&global_path, "{bad json").unwrap();
        fs::write(&local_path, r#"{"walk": {"max_file_size": 10}}"#).unwrap();

        let config = load_and_merge(Some(&global_path), &local_path).unwrap();
        assert_eq!(config.walk.max_file_size, 10);
    }

    #[test]
    fn test_load_and_merge_invalid_local_errors() {
        let dir = tempfile::tempdir().unwrap();
        let global_path = dir.path().join("global.json");
        let local_path = dir.path().join("local.json");

        fs::write(&global_path, r#"{"walk": {"max_file_size": 10}}"#).unwrap();
        fs::write(&local_path, "{bad json").unwrap();

        let result = load_and_merge(Some(&global_path), &local_path);
        assert!(matches!(result, Err(ConfigError::InvalidJson { .. })));
    }

    #[test]
    fn test_register_aliases() {
        let mut config = Config::default();
        config
            .analyzer
            .extensions
            .insert("vue".into(), "typescript".into());
        config
            .analyzer
            .extensions
            .insert("foo".into(), "no-such-language".into());

        let mut registry = AnalyzerRegistry::new();
        config.register_aliases(&mut registry);
        registry.discover();

        assert_eq!(
            registry.lookup("App.vue").unwrap().language_name(),
            "typescript"
        );
        assert!(registry.lookup("x.foo").is_none());
        assert!(registry.conflicts().is_empty());
    }

    #[test]
    fn test_unknown_aliases() {
        let mut config = Config::default();
        assert!(config.unknown_aliases().is_empty());

        let extensions = &mut config.analyzer.extensions;
        extensions.insert("vue".into(), "typescript".into());
        extensions.insert("pyx".into(), "python".into());
        extensions.insert("foo".into(), "no-such-language".into());
        extensions.insert("bar".into(), "Python".into());

        assert_eq!(
            config.unknown_aliases(),
            vec![("bar", "Python"), ("foo", "no-such-language")]
        );
    }

    #[test]
    fn test_error_display_includes_path() {
        let path = PathBuf::from("/some/config.json");
        let err = ConfigError::NotFound { path: path.clone() };
        assert!(err.to_string().contains("/some/config.json"));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::IoError {
            path,
            source: io_err,
        };
        assert!(err.to_string().contains("/some/config.json"));
        assert!(err.to_string().contains("denied"));
    }
}
