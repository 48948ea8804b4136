//! Format-agnostic configuration loading and the filesystem config sections

use std::fs;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::{Error, ExclusionSet, NormalizedPath, OrderedMap, PermissionRule, Result};

/// Format-agnostic configuration store.
///
/// Detects the format from the file extension and handles deserialization
/// transparently.
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file.
    ///
    /// Format is detected from file extension:
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unknown extension
    /// or does not parse.
    pub fn load<T: DeserializeOwned>(&self, path: &NormalizedPath) -> Result<T> {
        let extension = path.extension().unwrap_or("").to_lowercase();
        if !matches!(extension.as_str(), "toml" | "json" | "yaml" | "yml") {
            return Err(Error::UnsupportedFormat { extension });
        }

        let native = path.to_native();
        let content = fs::read_to_string(&native).map_err(|e| Error::io(&native, e))?;

        match extension.as_str() {
            "toml" => toml::from_str(&content).map_err(|e| Error::ConfigParse {
                path: native,
                format: "TOML".into(),
                message: e.to_string(),
            }),
            "json" => serde_json::from_str(&content).map_err(|e| Error::ConfigParse {
                path: native,
                format: "JSON".into(),
                message: e.to_string(),
            }),
            _ => serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
                path: native,
                format: "YAML".into(),
                message: e.to_string(),
            }),
        }
    }

    /// Load `path` if it exists, otherwise return the type's default.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigStore::load`] when the file exists.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, path: &NormalizedPath) -> Result<T> {
        if path.exists() {
            self.load(path)
        } else {
            tracing::debug!(path = %path, "No config file, using defaults");
            Ok(T::default())
        }
    }
}

/// `[flush]` section: directories emptied before an environment switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    pub paths: Vec<String>,
    pub exclude: Vec<String>,
    pub skip_hidden: bool,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            paths: vec!["protected/runtime".into(), "assets".into()],
            exclude: Vec::new(),
            skip_hidden: false,
        }
    }
}

impl FlushConfig {
    pub fn exclusions(&self) -> ExclusionSet {
        ExclusionSet::from_names(self.exclude.iter().cloned()).with_hidden_skipped(self.skip_hidden)
    }
}

/// `[environments]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentsConfig {
    /// Directory holding one subdirectory per environment, base-relative.
    pub dir: String,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        Self {
            dir: "environments".into(),
        }
    }
}

/// One entry of the `[permissions]` mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    #[serde(default, deserialize_with = "deserialize_mode")]
    pub mode: Option<u32>,
    #[serde(default, alias = "user")]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

impl PermissionSpec {
    pub fn to_rule(&self, path: &str) -> PermissionRule {
        PermissionRule {
            path: path.to_string(),
            mode: self.mode,
            owner: self.owner.clone(),
            group: self.group.clone(),
        }
    }
}

/// Turn a `[permissions]` mapping into rules, keeping mapping order.
///
/// An empty mapping yields [`PermissionRule::defaults`].
pub fn permission_rules(specs: &OrderedMap<PermissionSpec>) -> Vec<PermissionRule> {
    if specs.is_empty() {
        return PermissionRule::defaults();
    }
    specs.iter().map(|(path, spec)| spec.to_rule(path)).collect()
}

/// Parse an octal mode string: `"0755"`, `"755"` or `"0o755"`.
pub fn parse_octal_mode(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 8).ok().filter(|mode| *mode <= 0o7777)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeValue {
    Int(u32),
    Str(String),
}

/// Integers are taken as the numeric mode (write `0o755` in TOML); strings
/// are always read as octal.
fn deserialize_mode<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u32>, D::Error> {
    let value = Option::<ModeValue>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(ModeValue::Int(mode)) if mode <= 0o7777 => Ok(Some(mode)),
        Some(ModeValue::Int(mode)) => Err(de::Error::custom(format!(
            "mode {mode:o} is out of range"
        ))),
        Some(ModeValue::Str(s)) => parse_octal_mode(&s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid octal mode '{s}'"))),
    }
}
