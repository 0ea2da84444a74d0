//! Connection wizards: attach a Functions project to a Durable Task
//! Scheduler, an Azure SQL database or a storage account.

pub mod connection_string;
pub mod dts;
pub mod provider;
pub mod sql;
pub mod storage;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ResourceConfig;
use crate::error::{AgentError, Result};
use crate::settings::LocalSettings;
use crate::types::ProgressSink;
use crate::wizard::{Elicitor, ExecuteOutcome, ExecuteStep, WizardOutcome, WizardResult};

use provider::{InMemoryResourceProvider, Inventory, ResourceProvider, ResourceScope};

pub const DTS_WIZARD: &str = "durableTaskScheduler";
pub const SQL_WIZARD: &str = "sql";
pub const STORAGE_WIZARD: &str = "storage";

/// Choice id for "create a new one" in lists of existing resources.
/// `<` is rejected by every resource name rule, so it never collides.
pub const CREATE_NEW_CHOICE: &str = "<new>";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WizardInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

pub static WIZARDS: [WizardInfo; 3] = [
    WizardInfo {
        id: DTS_WIZARD,
        label: "Durable Task Scheduler",
        description: "Use the local emulator or an Azure scheduler and task hub for Durable Functions",
    },
    WizardInfo {
        id: SQL_WIZARD,
        label: "Azure SQL database",
        description: "Create or pick an Azure SQL server and database, or enter a connection string",
    },
    WizardInfo {
        id: STORAGE_WIZARD,
        label: "Azure Storage account",
        description: "Use the storage emulator or an Azure storage account for AzureWebJobsStorage",
    },
];

pub fn find_wizard(id: &str) -> Option<&'static WizardInfo> {
    WIZARDS.iter().find(|w| w.id.eq_ignore_ascii_case(id))
}

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

/// Where a connection wizard creates resources and writes settings.
#[derive(Clone)]
pub struct ConnectionTarget {
    pub provider: Arc<dyn ResourceProvider>,
    pub scope: ResourceScope,
    pub location: String,
    /// Functions project whose `local.settings.json` is updated.
    pub project_path: Option<PathBuf>,
}

impl ConnectionTarget {
    /// Target the configured subscription, resource group and location.
    pub fn from_config(
        provider: Arc<dyn ResourceProvider>,
        resources: &ResourceConfig,
        project_path: Option<PathBuf>,
    ) -> Self {
        Self {
            provider,
            scope: ResourceScope::new(&resources.subscription_id, &resources.resource_group),
            location: resources.location.clone(),
            project_path,
        }
    }
}

/// An in-memory provider seeded from `resources.inventory`, resolved against `root`.
pub fn configured_provider(root: &Path, resources: &ResourceConfig) -> Result<InMemoryResourceProvider> {
    let provider = InMemoryResourceProvider::new();
    let Some(path) = &resources.inventory else {
        return Ok(provider);
    };
    let inventory = Inventory::load(&crate::paths::resolve(root, path))?;
    let scope = ResourceScope::new(&resources.subscription_id, &resources.resource_group);
    Ok(provider.with_inventory(scope, inventory))
}

/// Implemented by each wizard's context.
pub trait ConnectionContext {
    fn target(&self) -> &ConnectionTarget;

    /// App settings the wizard has produced so far; empty until complete.
    fn settings(&self) -> BTreeMap<String, String>;
}

/// Writes [`ConnectionContext::settings`] into `local.settings.json`.
///
/// Skipped without a project path or before settings exist.
pub struct WriteSettingsStep;

pub const WRITE_SETTINGS_PRIORITY: u32 = 250;

#[async_trait]
impl<C> ExecuteStep<C> for WriteSettingsStep
where
    C: ConnectionContext + Send + Sync,
{
    fn id(&self) -> &str {
        "writeSettings"
    }

    fn priority(&self) -> u32 {
        WRITE_SETTINGS_PRIORITY
    }

    fn should_execute(&self, ctx: &C) -> bool {
        ctx.target().project_path.is_some() && !ctx.settings().is_empty()
    }

    async fn execute(&self, ctx: &mut C, progress: &dyn ProgressSink) -> WizardResult<ExecuteOutcome<C>> {
        let Some(project) = ctx.target().project_path.clone() else {
            return Ok(ExecuteOutcome::Done);
        };
        let mut local = LocalSettings::load(&project)?;
        let settings = ctx.settings();
        for (k, v) in &settings {
            local.set(k.clone(), v.clone());
        }
        local.save(&project)?;
        let keys: Vec<_> = settings.keys().map(String::as_str).collect();
        progress.markdown(&format!("Updated `local.settings.json`: {}", keys.join(", ")));
        tracing::info!(project = %project.display(), keys = ?keys, "local settings written");
        Ok(ExecuteOutcome::Done)
    }
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

pub(crate) struct NameRule {
    pub kind: &'static str,
    pub min: usize,
    pub max: usize,
    pub allowed: fn(char) -> bool,
    pub hint: &'static str,
}

impl NameRule {
    /// Feedback for an unacceptable `value`, or `None`.
    pub fn check(&self, value: &str, existing: &[String]) -> Option<String> {
        let len = value.chars().count();
        if len < self.min || len > self.max {
            return Some(format!(
                "The {} name must be between {} and {} characters.",
                self.kind, self.min, self.max
            ));
        }
        if !value.chars().all(self.allowed) || value.starts_with('-') || value.ends_with('-') {
            return Some(format!("The {} name {}.", self.kind, self.hint));
        }
        if existing.iter().any(|e| e.eq_ignore_ascii_case(value)) {
            return Some(format!("A {} named \"{value}\" already exists.", self.kind));
        }
        None
    }
}

fn alnum_or_hyphen(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn lower_alnum_or_hyphen(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

fn lower_alnum(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

fn database_char(c: char) -> bool {
    !"<>*%&:\\/?".contains(c) && !c.is_control()
}

pub(crate) const SCHEDULER_NAME: NameRule = NameRule {
    kind: "scheduler",
    min: 3,
    max: 64,
    allowed: alnum_or_hyphen,
    hint: "can only contain letters, numbers and hyphens, and cannot start or end with a hyphen",
};

pub(crate) const TASK_HUB_NAME: NameRule = NameRule {
    kind: "task hub",
    min: 3,
    max: 64,
    allowed: alnum_or_hyphen,
    hint: "can only contain letters, numbers and hyphens, and cannot start or end with a hyphen",
};

pub(crate) const SQL_SERVER_NAME: NameRule = NameRule {
    kind: "SQL server",
    min: 1,
    max: 63,
    allowed: lower_alnum_or_hyphen,
    hint: "can only contain lowercase letters, numbers and hyphens, and cannot start or end with a hyphen",
};

pub(crate) const SQL_DATABASE_NAME: NameRule = NameRule {
    kind: "SQL database",
    min: 1,
    max: 128,
    allowed: database_char,
    hint: "cannot contain <>*%&:\\/? or control characters",
};

pub(crate) const STORAGE_ACCOUNT_NAME: NameRule = NameRule {
    kind: "storage account",
    min: 3,
    max: 24,
    allowed: lower_alnum,
    hint: "can only contain lowercase letters and numbers",
};

// ---------------------------------------------------------------------------
// Running by id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionOutcome {
    pub wizard_id: String,
    #[serde(flatten)]
    pub outcome: WizardOutcome,
    /// App settings produced by the run, whether or not they were written.
    pub settings: BTreeMap<String, String>,
}

/// Run the wizard `id` against `target`.
pub async fn run_wizard(
    id: &str,
    target: ConnectionTarget,
    elicitor: &dyn Elicitor,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<ConnectionOutcome> {
    let info = find_wizard(id).ok_or_else(|| AgentError::WizardNotFound(id.to_string()))?;
    let (outcome, settings) = match info.id {
        DTS_WIZARD => {
            let mut ctx = dts::DtsContext::new(target);
            let outcome = dts::wizard().run(&mut ctx, elicitor, progress, cancel).await;
            (outcome, ctx.settings())
        }
        SQL_WIZARD => {
            let mut ctx = sql::SqlContext::new(target);
            let outcome = sql::wizard().run(&mut ctx, elicitor, progress, cancel).await;
            (outcome, ctx.settings())
        }
        _ => {
            let mut ctx = storage::StorageContext::new(target);
            let outcome = storage::wizard().run(&mut ctx, elicitor, progress, cancel).await;
            (outcome, ctx.settings())
        }
    };
    Ok(ConnectionOutcome {
        wizard_id: info.id.to_string(),
        outcome,
        settings,
    })
}
