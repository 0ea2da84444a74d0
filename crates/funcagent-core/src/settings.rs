//! `local.settings.json`, the Functions host's local app settings file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AgentError, Result};
use crate::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSettings {
    #[serde(rename = "IsEncrypted", default)]
    pub is_encrypted: bool,
    #[serde(rename = "Values", default)]
    pub values: BTreeMap<String, String>,
    /// Sections other than `Values` (`Host`, `ConnectionStrings`), kept as-is.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            is_encrypted: false,
            values: BTreeMap::new(),
            other: Map::new(),
        }
    }
}

impl LocalSettings {
    /// Load from `<project>/local.settings.json`; a missing file is empty settings.
    pub fn load(project: &Path) -> Result<Self> {
        let path = paths::local_settings_path(project);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let settings: LocalSettings = serde_json::from_str(&data)?;
        if settings.is_encrypted {
            return Err(AgentError::InvalidSettings(format!(
                "{} is encrypted; decrypt it before editing",
                path.display()
            )));
        }
        Ok(settings)
    }

    pub fn save(&self, project: &Path) -> Result<()> {
        crate::io::write_json(&paths::local_settings_path(project), self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Resolve a host-configuration value.
    ///
    /// `%NAME%` resolves to the `NAME` setting (`None` when unset); any other
    /// value is returned unchanged.
    pub fn resolve<'a>(&'a self, value: &'a str) -> Option<&'a str> {
        match setting_reference(value) {
            Some(name) => self.get(name),
            None => Some(value),
        }
    }
}

/// The `NAME` in `%NAME%`, if `value` is a setting reference.
pub fn setting_reference(value: &str) -> Option<&str> {
    let inner = value.strip_prefix('%')?.strip_suffix('%')?;
    (!inner.is_empty() && !inner.contains('%')).then_some(inner)
}
