//! Configuration management for `wit-migrate`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`WITM_*`)
//! 3. Migration file (`migration.yaml`, or `--config`)
//! 4. Defaults
//!
//! Every source is flattened into dotted keys (`work-items.update-created-by`)
//! before merging. Scalar lookups ignore case and treat `-`, `_` and `.` as
//! the same separator, so `WITM_WORK_ITEMS_UPDATE_CREATED_BY` matches the key
//! above. The type mapping (`work-item-types.<Source>: <Target>`) keeps its
//! case and is only read from the file and CLI layers.

use crate::error::{MigrateError, Result};
use crate::identity::DEFAULT_IDENTITY_FIELD;
use crate::replicate::ReplicationOptions;
use crate::sync::path::PathPolicy;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Migration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "migration.yaml";

const ENV_PREFIX: &str = "WITM_";
const TYPE_MAP_PREFIX: &str = "work-item-types.";

pub const KEY_SOURCE_DB: &str = "source.db";
pub const KEY_TARGET_DB: &str = "target.db";
pub const KEY_IDENTITY_FIELD: &str = "reflected-id-field";
pub const KEY_PREFIX_PROJECT: &str = "prefix-project-to-nodes";
pub const KEY_UPDATE_CREATED_DATE: &str = "work-items.update-created-date";
pub const KEY_UPDATE_CREATED_BY: &str = "work-items.update-created-by";
pub const KEY_UPDATE_SOURCE_ID: &str = "work-items.update-source-reflected-id";
pub const KEY_WORK_ITEM_TYPES: &str = "work-items.types";

/// One flattened configuration source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            if let Some(existing) = self
                .values
                .keys()
                .find(|k| canonical_key(k) == canonical_key(key) && !is_type_mapping(k))
                .cloned()
            {
                self.values.remove(&existing);
            }
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Build a layer from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        let mut values = HashMap::new();
        flatten_yaml(&value, "", &mut values);
        Ok(Self { values })
    }

    /// Build a layer from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_vars(env::vars())
    }

    /// Build a layer from `WITM_*` pairs.
    #[must_use]
    pub fn from_env_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let values = vars
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|stripped| (stripped.to_lowercase(), value))
            })
            .collect();
        Self { values }
    }

    /// Scalar lookup with separator- and case-insensitive key matching.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }
        let wanted = canonical_key(key);
        self.values
            .iter()
            .find(|(k, _)| canonical_key(k) == wanted)
            .map(|(_, v)| v.as_str())
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)
            .map(|value| {
                parse_bool(value).ok_or_else(|| {
                    MigrateError::Config(format!("{key}: expected a boolean, got '{value}'"))
                })
            })
            .transpose()
    }

    fn type_mappings(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(TYPE_MAP_PREFIX)
                    .filter(|source| !source.is_empty() && !value.trim().is_empty())
                    .map(|source| (source.to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

/// CLI overrides for config loading.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub source_db: Option<PathBuf>,
    pub target_db: Option<PathBuf>,
    pub prefix_project_to_nodes: Option<bool>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();
        if let Some(path) = &self.source_db {
            layer
                .values
                .insert(KEY_SOURCE_DB.to_string(), path.to_string_lossy().to_string());
        }
        if let Some(path) = &self.target_db {
            layer
                .values
                .insert(KEY_TARGET_DB.to_string(), path.to_string_lossy().to_string());
        }
        if let Some(prefix) = self.prefix_project_to_nodes {
            layer
                .values
                .insert(KEY_PREFIX_PROJECT.to_string(), prefix.to_string());
        }
        layer
    }
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    for (key, value) in [
        (KEY_IDENTITY_FIELD, DEFAULT_IDENTITY_FIELD),
        (KEY_PREFIX_PROJECT, "false"),
        (KEY_UPDATE_CREATED_DATE, "false"),
        (KEY_UPDATE_CREATED_BY, "false"),
        (KEY_UPDATE_SOURCE_ID, "false"),
    ] {
        layer.values.insert(key.to_string(), value.to_string());
    }
    layer
}

/// Load configuration with the standard precedence order.
///
/// An explicitly named file must exist; the default file is optional.
///
/// # Errors
///
/// Returns an error if the migration file cannot be read or parsed.
pub fn load_config(config_path: Option<&Path>, cli: &CliOverrides) -> Result<ConfigLayer> {
    let file_layer = match config_path {
        Some(path) if !path.exists() => {
            return Err(MigrateError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => ConfigLayer::from_yaml(path)?,
        None => ConfigLayer::from_yaml(Path::new(DEFAULT_CONFIG_FILE))?,
    };

    Ok(ConfigLayer::merge_layers(&[
        default_config_layer(),
        file_layer,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]))
}

/// Typed run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub source_db: Option<PathBuf>,
    pub target_db: Option<PathBuf>,
    pub identity_field: String,
    pub prefix_project_to_nodes: bool,
    pub update_created_date: bool,
    pub update_created_by: bool,
    pub update_source_identity: bool,
    /// Source types to migrate; empty means every type.
    pub work_item_types: Vec<String>,
    /// Source type name to target type name.
    pub type_map: BTreeMap<String, String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_db: None,
            target_db: None,
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            prefix_project_to_nodes: false,
            update_created_date: false,
            update_created_by: false,
            update_source_identity: false,
            work_item_types: Vec::new(),
            type_map: BTreeMap::new(),
        }
    }
}

impl MigrationConfig {
    /// Resolve the typed configuration from a merged layer.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Config`] for malformed values.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let defaults = Self::default();
        let identity_field = layer
            .get(KEY_IDENTITY_FIELD)
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map_or(defaults.identity_field, str::to_string);

        let work_item_types = layer
            .get(KEY_WORK_ITEM_TYPES)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            source_db: layer.get(KEY_SOURCE_DB).map(PathBuf::from),
            target_db: layer.get(KEY_TARGET_DB).map(PathBuf::from),
            identity_field,
            prefix_project_to_nodes: layer.get_bool(KEY_PREFIX_PROJECT)?.unwrap_or(false),
            update_created_date: layer.get_bool(KEY_UPDATE_CREATED_DATE)?.unwrap_or(false),
            update_created_by: layer.get_bool(KEY_UPDATE_CREATED_BY)?.unwrap_or(false),
            update_source_identity: layer.get_bool(KEY_UPDATE_SOURCE_ID)?.unwrap_or(false),
            work_item_types,
            type_map: layer.type_mappings(),
        })
    }

    #[must_use]
    pub const fn path_policy(&self) -> PathPolicy {
        PathPolicy::from_prefix_flag(self.prefix_project_to_nodes)
    }

    #[must_use]
    pub fn replication_options(&self) -> ReplicationOptions {
        ReplicationOptions {
            identity_field: self.identity_field.clone(),
            path_policy: self.path_policy(),
            update_created_date: self.update_created_date,
            update_created_by: self.update_created_by,
            update_source_identity: self.update_source_identity,
        }
    }

    /// Target type for a source type, if mapped.
    #[must_use]
    pub fn map_type(&self, source_type: &str) -> Option<&str> {
        self.type_map.get(source_type).map(String::as_str)
    }

    /// Both store paths, or a configuration error naming the missing one.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Config`] if either path is unset.
    pub fn store_paths(&self) -> Result<(&Path, &Path)> {
        let source = self
            .source_db
            .as_deref()
            .ok_or_else(|| MigrateError::Config(format!("{KEY_SOURCE_DB} is not set")))?;
        let target = self
            .target_db
            .as_deref()
            .ok_or_else(|| MigrateError::Config(format!("{KEY_TARGET_DB} is not set")))?;
        Ok((source, target))
    }
}

fn canonical_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '-' | '.') { '_' } else { c })
        .collect()
}

fn is_type_mapping(key: &str) -> bool {
    key.starts_with(TYPE_MAP_PREFIX)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r"
source:
  db: /data/source.db
target:
  db: /data/target.db
prefix-project-to-nodes: true
work-items:
  update-created-by: yes
  types: [Bug, User Story]
work-item-types:
  Bug: Bug
  User Story: Product Backlog Item
";

    #[test]
    fn yaml_is_flattened_into_typed_config() {
        let layer = ConfigLayer::merge_layers(&[
            default_config_layer(),
            ConfigLayer::from_yaml_str(SAMPLE).unwrap(),
        ]);
        let config = MigrationConfig::from_layer(&layer).unwrap();

        assert_eq!(config.source_db, Some(PathBuf::from("/data/source.db")));
        assert!(config.prefix_project_to_nodes);
        assert!(config.update_created_by);
        assert!(!config.update_created_date);
        assert_eq!(config.work_item_types, vec!["Bug", "User Story"]);
        assert_eq!(config.map_type("User Story"), Some("Product Backlog Item"));
        assert_eq!(config.map_type("Epic"), None);
        assert_eq!(config.identity_field, DEFAULT_IDENTITY_FIELD);
    }

    #[test]
    fn merge_precedence_order() {
        let yaml = ConfigLayer::from_yaml_str("prefix-project-to-nodes: true").unwrap();
        let env_layer = ConfigLayer::from_env_vars([(
            "WITM_PREFIX_PROJECT_TO_NODES".to_string(),
            "false".to_string(),
        )]);
        let cli = CliOverrides {
            prefix_project_to_nodes: Some(true),
            ..CliOverrides::default()
        };

        let without_cli =
            ConfigLayer::merge_layers(&[default_config_layer(), yaml.clone(), env_layer.clone()]);
        assert!(!MigrationConfig::from_layer(&without_cli).unwrap().prefix_project_to_nodes);

        let with_cli =
            ConfigLayer::merge_layers(&[default_config_layer(), yaml, env_layer, cli.as_layer()]);
        assert!(MigrationConfig::from_layer(&with_cli).unwrap().prefix_project_to_nodes);
    }

    #[test]
    fn env_keys_match_dotted_keys() {
        let layer = ConfigLayer::from_env_vars([
            (
                "WITM_WORK_ITEMS_UPDATE_SOURCE_REFLECTED_ID".to_string(),
                "1".to_string(),
            ),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);
        assert_eq!(layer.values.len(), 1);
        assert_eq!(layer.get(KEY_UPDATE_SOURCE_ID), Some("1"));
    }

    #[test]
    fn invalid_boolean_is_a_config_error() {
        let layer = ConfigLayer::from_yaml_str("prefix-project-to-nodes: maybe").unwrap();
        let err = MigrationConfig::from_layer(&layer).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn missing_store_paths_are_reported() {
        let config = MigrationConfig::default();
        let err = config.store_paths().unwrap_err();
        assert!(err.to_string().contains(KEY_SOURCE_DB));
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let temp = TempDir::new().expect("tempdir");
        let missing = temp.path().join("nope.yaml");
        assert!(load_config(Some(&missing), &CliOverrides::default()).is_err());

        let present = temp.path().join("migration.yaml");
        fs::write(&present, SAMPLE).expect("write config");
        let layer = load_config(Some(&present), &CliOverrides::default()).expect("load");
        assert_eq!(layer.get(KEY_TARGET_DB), Some("/data/target.db"));
    }
}
