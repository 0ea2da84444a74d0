use crate::error::{AgentError, Result};
use crate::followup::MAX_QUESTION_FOLLOW_UPS;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Chat-completions backend used for classification and answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ModelConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// RouterConfig / FollowUpConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_true")]
    pub intent_detection: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            intent_detection: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
}

fn default_max_questions() -> usize {
    2
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_questions: default_max_questions(),
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "default_subscription")]
    pub subscription_id: String,
    #[serde(default = "default_resource_group")]
    pub resource_group: String,
    #[serde(default = "default_location")]
    pub location: String,
    /// YAML inventory backing the in-memory resource provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<PathBuf>,
}

fn default_subscription() -> String {
    "00000000-0000-0000-0000-000000000000".to_string()
}

fn default_resource_group() -> String {
    "funcagent-rg".to_string()
}

fn default_location() -> String {
    "eastus".to_string()
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            subscription_id: default_subscription(),
            resource_group: default_resource_group(),
            location: default_location(),
            inventory: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BenchmarkConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Extra fixtures appended to the built-in list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<PathBuf>,
    #[serde(default = "default_history")]
    pub history: PathBuf,
}

fn default_history() -> PathBuf {
    PathBuf::from(paths::BENCHMARK_HISTORY_FILE)
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            fixtures: None,
            history: default_history(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub follow_ups: FollowUpConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub benchmarks: BenchmarkConfig,
}

impl AgentConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(AgentError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: AgentConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(AgentError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self, root: &Path) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| warnings.push(ConfigWarning { level, message });

        if self.model.model.trim().is_empty() {
            warn(WarnLevel::Error, "model.model is empty".to_string());
        }
        if self.model.timeout_secs == 0 {
            warn(
                WarnLevel::Error,
                "model.timeout_secs is 0; every classifier call would time out".to_string(),
            );
        }
        if self.model.api_key().is_none() {
            warn(
                WarnLevel::Warning,
                format!("environment variable {} is not set", self.model.api_key_env),
            );
        }
        if self.follow_ups.max_questions > MAX_QUESTION_FOLLOW_UPS {
            warn(
                WarnLevel::Warning,
                format!(
                    "follow_ups.max_questions is {}; at most {} questions are generated",
                    self.follow_ups.max_questions, MAX_QUESTION_FOLLOW_UPS
                ),
            );
        }
        if self.resources.subscription_id.trim().is_empty() || self.resources.resource_group.trim().is_empty() {
            warn(
                WarnLevel::Error,
                "resources.subscription_id and resources.resource_group must be set".to_string(),
            );
        }
        if let Some(inv) = &self.resources.inventory {
            if !paths::resolve(root, inv).exists() {
                warn(
                    WarnLevel::Warning,
                    format!("resource inventory {} does not exist", inv.display()),
                );
            }
        }
        if let Some(fixtures) = &self.benchmarks.fixtures {
            if !paths::resolve(root, fixtures).exists() {
                warn(
                    WarnLevel::Warning,
                    format!("benchmark fixtures {} do not exist", fixtures.display()),
                );
            }
        }

        warnings
    }
}
