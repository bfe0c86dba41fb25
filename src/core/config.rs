use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the per-project filter override, looked up in the scanned root.
pub const LOCAL_FILTER_FILE_NAME: &str = ".wlignore.json";

/// Content based exclusion: files matching `apply_to_files` are dropped when
/// any of their lines contains one of `exclude_by_content` (case-insensitive).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", default)]
pub struct FileContentFilterConfig {
    pub apply_to_files: Vec<String>,
    pub exclude_by_content: Vec<String>,
}

/// Declarative include/exclude rules deciding which files enter the scan.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FileFilterConfig {
    pub include_dirs: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub include_files: Vec<String>,
    pub exclude_files: Vec<String>,
    pub exclude_file_content_filters: Vec<FileContentFilterConfig>,
}

/// One authored rename rule. The tokenized fields are comma separated word
/// lists from which the case variants are derived.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    pub origin: String,
    pub replacement: String,
    pub origin_tokenized: String,
    pub replacement_tokenized: String,
}

/// The "forbidden patterns" document: copyright triggers and regular
/// expressions, whitelabel exceptions and the restricted token.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ForbiddenPatternsConfig {
    pub contains: Vec<String>,
    pub patterns: Vec<String>,
    pub exceptions: Vec<String>,
    pub restricted: String,
}

/// Tuning knobs of the bounded copyright validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyrightSettings {
    /// Time a single line may spend in regex validation.
    pub timeout: Duration,
    /// Size of the worker pool (and of the timer pool).
    pub threads: usize,
    /// Backtracking steps a single pattern may take on one line.
    pub backtrack_limit: usize,
}

impl Default for CopyrightSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            threads: 20,
            backtrack_limit: 1_000_000,
        }
    }
}

/// Serialization formats accepted for configuration documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Picks the format from the file extension; anything unknown is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            _ => anyhow::bail!("Unsupported format: {}", name),
        }
    }

    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        let parsed = match self {
            ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON")?,
            ConfigFormat::Yaml => serde_yaml::from_str(content).context("Failed to parse YAML")?,
            ConfigFormat::Toml => toml::from_str(content).context("Failed to parse TOML")?,
        };
        Ok(parsed)
    }

    pub fn render<T: Serialize>(self, value: &T) -> Result<String> {
        let content = match self {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?
            }
            ConfigFormat::Yaml => serde_yaml::to_string(value).context("Failed to serialize to YAML")?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(value).context("Failed to serialize to TOML")?
            }
        };
        Ok(content)
    }
}

/// Reads and deserializes a configuration document, choosing the format from
/// its extension.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    ConfigFormat::from_path(path)
        .parse(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Local entries first, then global ones, duplicates dropped.
fn union_distinct<T: Clone + Eq + Hash>(local: &[T], global: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    local
        .iter()
        .chain(global.iter())
        .filter(|item| seen.insert((*item).clone()))
        .cloned()
        .collect()
}

/// Merges a per-project override into the global filter. The override may only
/// add exclusions; its include lists are ignored.
pub fn merge_filter_configs(
    global: &FileFilterConfig,
    local: Option<&FileFilterConfig>,
) -> FileFilterConfig {
    let Some(local) = local else {
        return global.clone();
    };
    log::info!("Merge global={:?} with local={:?}", global, local);
    if !local.include_dirs.is_empty() || !local.include_files.is_empty() {
        log::warn!("Local includeDirs, includeFiles will be ignored");
    }
    FileFilterConfig {
        include_dirs: global.include_dirs.clone(),
        exclude_dirs: union_distinct(&local.exclude_dirs, &global.exclude_dirs),
        include_files: global.include_files.clone(),
        exclude_files: union_distinct(&local.exclude_files, &global.exclude_files),
        exclude_file_content_filters: union_distinct(
            &local.exclude_file_content_filters,
            &global.exclude_file_content_filters,
        ),
    }
}

/// Loads the global filter and merges the override found in `source_root`, if
/// one exists and is not empty.
pub fn load_filter_config(global_path: &Path, source_root: &Path) -> Result<FileFilterConfig> {
    let global: FileFilterConfig = load_document(global_path)?;
    let local_path = source_root.join(LOCAL_FILTER_FILE_NAME);
    let has_local = fs::metadata(&local_path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false);
    if !has_local {
        return Ok(global);
    }
    let local: FileFilterConfig = load_document(&local_path)?;
    Ok(merge_filter_configs(&global, Some(&local)))
}

/// Source of the three configuration inputs of a validation run.
pub trait ConfigProvider {
    fn load_mappings(&self) -> Result<Vec<MappingConfig>>;
    fn load_filter_config(&self, source_root: &Path) -> Result<FileFilterConfig>;
    fn load_forbidden_patterns(&self) -> Result<ForbiddenPatternsConfig>;
}

/// File backed configuration. Construction fails when any document is missing.
pub struct ConfigManager {
    mapping_path: PathBuf,
    filter_path: PathBuf,
    forbidden_patterns_path: PathBuf,
}

impl ConfigManager {
    pub fn new(
        mapping_path: impl Into<PathBuf>,
        filter_path: impl Into<PathBuf>,
        forbidden_patterns_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let manager = Self {
            mapping_path: mapping_path.into(),
            filter_path: filter_path.into(),
            forbidden_patterns_path: forbidden_patterns_path.into(),
        };
        ensure_exists(&[
            &manager.mapping_path,
            &manager.filter_path,
            &manager.forbidden_patterns_path,
        ])?;
        Ok(manager)
    }

    pub fn mapping_path(&self) -> &Path {
        &self.mapping_path
    }

    pub fn filter_path(&self) -> &Path {
        &self.filter_path
    }

    pub fn forbidden_patterns_path(&self) -> &Path {
        &self.forbidden_patterns_path
    }
}

impl ConfigProvider for ConfigManager {
    fn load_mappings(&self) -> Result<Vec<MappingConfig>> {
        load_document(&self.mapping_path)
    }

    fn load_filter_config(&self, source_root: &Path) -> Result<FileFilterConfig> {
        load_filter_config(&self.filter_path, source_root)
    }

    fn load_forbidden_patterns(&self) -> Result<ForbiddenPatternsConfig> {
        load_document(&self.forbidden_patterns_path)
    }
}

/// Configuration held in memory, used when the caller already has the
/// documents deserialized.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    pub mappings: Vec<MappingConfig>,
    pub filter: FileFilterConfig,
    pub forbidden_patterns: ForbiddenPatternsConfig,
}

impl ConfigProvider for StaticConfig {
    fn load_mappings(&self) -> Result<Vec<MappingConfig>> {
        Ok(self.mappings.clone())
    }

    fn load_filter_config(&self, _source_root: &Path) -> Result<FileFilterConfig> {
        Ok(self.filter.clone())
    }

    fn load_forbidden_patterns(&self) -> Result<ForbiddenPatternsConfig> {
        Ok(self.forbidden_patterns.clone())
    }
}

/// Fails on the first path that does not exist.
pub fn ensure_exists(paths: &[&Path]) -> Result<()> {
    for path in paths {
        if !path.exists() {
            anyhow::bail!("Config={} does not exist", path.display());
        }
    }
    Ok(())
}
