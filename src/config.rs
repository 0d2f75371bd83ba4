//! Engine configuration
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (fabric-schema.toml)
//! - Environment variables (FABRIC_SCHEMA__*)
//!
//! ## Example config file (fabric-schema.toml):
//! ```toml
//! [store]
//! paths = ["./schemas"]
//!
//! [conversion]
//! mode = "debug"
//!
//! [validation]
//! mode = "error"
//!
//! [merge]
//! list_strategy = "append"
//!
//! [limits]
//! max_depth = 128
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::loader::{Schema, SchemaLoader, DEFAULT_MAX_DEPTH};
use crate::merge::{ListMergeStrategy, MergeOptions};
use crate::store::SchemaStore;
use crate::tools::{Mode, SchemaTools};

/// Main configuration for the schema engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Schema store settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directories of schema documents referenced by `$ref`
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default = "default_conversion_mode")]
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_validation_mode")]
    pub mode: Mode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Strategy for lists without a primary key
    #[serde(default)]
    pub list_strategy: ListMergeStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Recursion bound for resolution, conversion, validation and merge
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_conversion_mode() -> Mode {
    Mode::Debug
}

fn default_validation_mode() -> Mode {
    Mode::Warning
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: default_conversion_mode(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: default_validation_mode(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "fabric-schema.toml",
            ".fabric-schema.toml",
            "config/fabric-schema.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(xdg_config) = Self::user_config_path() {
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // FABRIC_SCHEMA__VALIDATION__MODE=error
        builder = builder.add_source(
            Environment::with_prefix("FABRIC_SCHEMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Per-user config file in the XDG config directory
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "fabric", "fabric-schema")
            .map(|dirs| dirs.config_dir().join("fabric-schema.toml"))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Store filled from every configured directory, in order
    pub fn load_store(&self) -> Result<SchemaStore> {
        let mut store = SchemaStore::new().with_max_depth(self.limits.max_depth);
        for path in &self.store.paths {
            store.add_dir(path)?;
        }
        Ok(store)
    }

    pub fn schema_loader(&self) -> Result<SchemaLoader> {
        Ok(SchemaLoader::new()
            .with_store(self.load_store()?)
            .with_max_depth(self.limits.max_depth))
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            list_strategy: self.merge.list_strategy,
            max_depth: self.limits.max_depth,
        }
    }

    /// [`SchemaTools`] for `host` with the configured modes
    pub fn tools(&self, schema: Arc<Schema>, host: impl Into<String>) -> SchemaTools {
        SchemaTools::new(schema, host)
            .with_conversion_mode(self.conversion.mode)
            .with_validation_mode(self.validation.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.conversion.mode, Mode::Debug);
        assert_eq!(config.validation.mode, Mode::Warning);
        assert_eq!(config.merge.list_strategy, ListMergeStrategy::Append);
        assert_eq!(config.limits.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.store.paths.is_empty());
    }

    #[test]
    fn test_serialize_config() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("mode = \"warning\""));
        assert!(toml_str.contains("list_strategy = \"append\""));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(
            &path,
            "[validation]\nmode = \"error\"\n\n[merge]\nlist_strategy = \"replace\"\n\n[limits]\nmax_depth = 32\n",
        )
        .unwrap();

        let config = EngineConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.validation.mode, Mode::Error);
        assert_eq!(config.conversion.mode, Mode::Debug);
        assert_eq!(config.merge_options().list_strategy, ListMergeStrategy::Replace);
        assert_eq!(config.merge_options().max_depth, 32);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = EngineConfig::default();
        config.store.paths.push(PathBuf::from("schemas"));
        config.conversion.mode = Mode::Info;
        config.save(&path).unwrap();

        let loaded: EngineConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_schema_loader_uses_store_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("common.schema.json"),
            r#"{"type": "dict", "keys": {"mtu": {"type": "int", "min": 68}}}"#,
        )
        .unwrap();

        let mut config = EngineConfig::default();
        config.store.paths.push(dir.path().to_path_buf());
        let loader = config.schema_loader().unwrap();
        assert!(loader.store().contains("common"));

        let schema = loader
            .load(&json!({"type": "dict", "keys": {"mtu": {"type": "int", "$ref": "common#/keys/mtu"}}}))
            .unwrap();
        assert!(!schema.validate(&json!({"mtu": 10})).is_valid());
    }
}
