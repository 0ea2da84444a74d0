//! Cloud resources the connection wizards list and create.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::error::Result;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{operation} failed: {message}")]
    Failed { operation: String, message: String },
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceScope {
    pub subscription_id: String,
    pub resource_group: String,
}

impl ResourceScope {
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resource descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduler {
    pub name: String,
    pub location: String,
    pub endpoint: String,
    #[serde(default)]
    pub task_hubs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHub {
    pub name: String,
    pub scheduler: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlServer {
    pub name: String,
    pub location: String,
    pub admin_login: String,
    #[serde(default)]
    pub databases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlDatabase {
    pub name: String,
    pub server: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageAccount {
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing)]
    pub key: String,
}

/// Everything in one resource group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub schedulers: Vec<Scheduler>,
    #[serde(default)]
    pub sql_servers: Vec<SqlServer>,
    #[serde(default)]
    pub storage_accounts: Vec<StorageAccount>,
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&data)?)
    }
}

// ---------------------------------------------------------------------------
// ResourceProvider
// ---------------------------------------------------------------------------

/// Control-plane operations, keyed by scope and resource name.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list_schedulers(&self, scope: &ResourceScope) -> ProviderResult<Vec<Scheduler>>;

    async fn create_scheduler(&self, scope: &ResourceScope, name: &str, location: &str)
        -> ProviderResult<Scheduler>;

    async fn list_task_hubs(&self, scope: &ResourceScope, scheduler: &str) -> ProviderResult<Vec<TaskHub>>;

    async fn create_task_hub(&self, scope: &ResourceScope, scheduler: &str, name: &str) -> ProviderResult<TaskHub>;

    async fn list_sql_servers(&self, scope: &ResourceScope) -> ProviderResult<Vec<SqlServer>>;

    async fn create_sql_server(
        &self,
        scope: &ResourceScope,
        name: &str,
        location: &str,
        admin_login: &str,
        admin_password: &str,
    ) -> ProviderResult<SqlServer>;

    async fn list_sql_databases(&self, scope: &ResourceScope, server: &str) -> ProviderResult<Vec<SqlDatabase>>;

    async fn create_sql_database(&self, scope: &ResourceScope, server: &str, name: &str)
        -> ProviderResult<SqlDatabase>;

    async fn list_storage_accounts(&self, scope: &ResourceScope) -> ProviderResult<Vec<StorageAccount>>;

    async fn create_storage_account(&self, scope: &ResourceScope, name: &str, location: &str)
        -> ProviderResult<StorageAccount>;

    async fn storage_connection_string(&self, scope: &ResourceScope, account: &str) -> ProviderResult<String>;
}

// ---------------------------------------------------------------------------
// InMemoryResourceProvider
// ---------------------------------------------------------------------------

/// A provider over in-process inventories, one per scope.
///
/// Operations named with [`fail_on`](Self::fail_on) return `Failed`
/// instead of touching the inventory.
#[derive(Debug, Default)]
pub struct InMemoryResourceProvider {
    scopes: Mutex<HashMap<ResourceScope, Inventory>>,
    failures: HashMap<String, String>,
    latency: Option<Duration>,
}

impl InMemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(self, scope: ResourceScope, inventory: Inventory) -> Self {
        if let Ok(mut scopes) = self.scopes.lock() {
            scopes.insert(scope, inventory);
        }
        self
    }

    pub fn fail_on(mut self, operation: &str, message: &str) -> Self {
        self.failures.insert(operation.to_string(), message.to_string());
        self
    }

    /// Sleep this long before every operation, like a remote control plane.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Snapshot of one scope's inventory.
    pub fn inventory(&self, scope: &ResourceScope) -> Inventory {
        self.scopes
            .lock()
            .ok()
            .and_then(|s| s.get(scope).cloned())
            .unwrap_or_default()
    }

    fn check(&self, operation: &str) -> ProviderResult<()> {
        match self.failures.get(operation) {
            Some(message) => Err(ProviderError::Failed {
                operation: operation.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn with_scope<T>(
        &self,
        operation: &str,
        scope: &ResourceScope,
        f: impl FnOnce(&mut Inventory) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        self.check(operation)?;
        let mut scopes = self.scopes.lock().map_err(|_| ProviderError::Failed {
            operation: operation.to_string(),
            message: "inventory lock poisoned".to_string(),
        })?;
        f(scopes.entry(scope.clone()).or_default())
    }
}

fn scheduler_mut<'a>(inv: &'a mut Inventory, name: &str) -> ProviderResult<&'a mut Scheduler> {
    inv.schedulers
        .iter_mut()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ProviderError::NotFound {
            kind: "scheduler",
            name: name.to_string(),
        })
}

fn sql_server_mut<'a>(inv: &'a mut Inventory, name: &str) -> ProviderResult<&'a mut SqlServer> {
    inv.sql_servers
        .iter_mut()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ProviderError::NotFound {
            kind: "SQL server",
            name: name.to_string(),
        })
}

#[async_trait]
impl ResourceProvider for InMemoryResourceProvider {
    async fn list_schedulers(&self, scope: &ResourceScope) -> ProviderResult<Vec<Scheduler>> {
        self.pause().await;
        self.with_scope("list_schedulers", scope, |inv| Ok(inv.schedulers.clone()))
    }

    async fn create_scheduler(
        &self,
        scope: &ResourceScope,
        name: &str,
        location: &str,
    ) -> ProviderResult<Scheduler> {
        self.pause().await;
        self.with_scope("create_scheduler", scope, |inv| {
            if inv.schedulers.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
                return Err(ProviderError::AlreadyExists {
                    kind: "scheduler",
                    name: name.to_string(),
                });
            }
            let scheduler = Scheduler {
                name: name.to_string(),
                location: location.to_string(),
                endpoint: format!("https://{name}.{location}.durabletask.io"),
                task_hubs: Vec::new(),
            };
            inv.schedulers.push(scheduler.clone());
            Ok(scheduler)
        })
    }

    async fn list_task_hubs(&self, scope: &ResourceScope, scheduler: &str) -> ProviderResult<Vec<TaskHub>> {
        self.pause().await;
        self.with_scope("list_task_hubs", scope, |inv| {
            let s = scheduler_mut(inv, scheduler)?;
            Ok(s.task_hubs
                .iter()
                .map(|h| TaskHub {
                    name: h.clone(),
                    scheduler: s.name.clone(),
                })
                .collect())
        })
    }

    async fn create_task_hub(&self, scope: &ResourceScope, scheduler: &str, name: &str) -> ProviderResult<TaskHub> {
        self.pause().await;
        self.with_scope("create_task_hub", scope, |inv| {
            let s = scheduler_mut(inv, scheduler)?;
            if s.task_hubs.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                return Err(ProviderError::AlreadyExists {
                    kind: "task hub",
                    name: name.to_string(),
                });
            }
            s.task_hubs.push(name.to_string());
            Ok(TaskHub {
                name: name.to_string(),
                scheduler: s.name.clone(),
            })
        })
    }

    async fn list_sql_servers(&self, scope: &ResourceScope) -> ProviderResult<Vec<SqlServer>> {
        self.pause().await;
        self.with_scope("list_sql_servers", scope, |inv| Ok(inv.sql_servers.clone()))
    }

    async fn create_sql_server(
        &self,
        scope: &ResourceScope,
        name: &str,
        location: &str,
        admin_login: &str,
        _admin_password: &str,
    ) -> ProviderResult<SqlServer> {
        self.pause().await;
        self.with_scope("create_sql_server", scope, |inv| {
            if inv.sql_servers.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
                return Err(ProviderError::AlreadyExists {
                    kind: "SQL server",
                    name: name.to_string(),
                });
            }
            let server = SqlServer {
                name: name.to_string(),
                location: location.to_string(),
                admin_login: admin_login.to_string(),
                databases: Vec::new(),
            };
            inv.sql_servers.push(server.clone());
            Ok(server)
        })
    }

    async fn list_sql_databases(&self, scope: &ResourceScope, server: &str) -> ProviderResult<Vec<SqlDatabase>> {
        self.pause().await;
        self.with_scope("list_sql_databases", scope, |inv| {
            let s = sql_server_mut(inv, server)?;
            Ok(s.databases
                .iter()
                .map(|d| SqlDatabase {
                    name: d.clone(),
                    server: s.name.clone(),
                })
                .collect())
        })
    }

    async fn create_sql_database(
        &self,
        scope: &ResourceScope,
        server: &str,
        name: &str,
    ) -> ProviderResult<SqlDatabase> {
        self.pause().await;
        self.with_scope("create_sql_database", scope, |inv| {
            let s = sql_server_mut(inv, server)?;
            if s.databases.iter().any(|d| d.eq_ignore_ascii_case(name)) {
                return Err(ProviderError::AlreadyExists {
                    kind: "SQL database",
                    name: name.to_string(),
                });
            }
            s.databases.push(name.to_string());
            Ok(SqlDatabase {
                name: name.to_string(),
                server: s.name.clone(),
            })
        })
    }

    async fn list_storage_accounts(&self, scope: &ResourceScope) -> ProviderResult<Vec<StorageAccount>> {
        self.pause().await;
        self.with_scope("list_storage_accounts", scope, |inv| Ok(inv.storage_accounts.clone()))
    }

    async fn create_storage_account(
        &self,
        scope: &ResourceScope,
        name: &str,
        location: &str,
    ) -> ProviderResult<StorageAccount> {
        self.pause().await;
        self.with_scope("create_storage_account", scope, |inv| {
            if inv.storage_accounts.iter().any(|a| a.name == name) {
                return Err(ProviderError::AlreadyExists {
                    kind: "storage account",
                    name: name.to_string(),
                });
            }
            let account = StorageAccount {
                name: name.to_string(),
                location: location.to_string(),
                key: uuid::Uuid::new_v4().simple().to_string(),
            };
            inv.storage_accounts.push(account.clone());
            Ok(account)
        })
    }

    async fn storage_connection_string(&self, scope: &ResourceScope, account: &str) -> ProviderResult<String> {
        self.pause().await;
        self.with_scope("storage_connection_string", scope, |inv| {
            let a = inv
                .storage_accounts
                .iter()
                .find(|a| a.name == account)
                .ok_or_else(|| ProviderError::NotFound {
                    kind: "storage account",
                    name: account.to_string(),
                })?;
            Ok(format!(
                "DefaultEndpointsProtocol=https;AccountName={};AccountKey={};EndpointSuffix=core.windows.net",
                a.name, a.key
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ResourceScope {
        ResourceScope::new("sub", "rg")
    }

    #[tokio::test]
    async fn create_then_list() {
        let p = InMemoryResourceProvider::new();
        let s = p.create_scheduler(&scope(), "sched", "westus2").await.unwrap();
        assert_eq!(s.endpoint, "https://sched.westus2.durabletask.io");
        p.create_task_hub(&scope(), "sched", "hub").await.unwrap();
        let hubs = p.list_task_hubs(&scope(), "sched").await.unwrap();
        assert_eq!(hubs, vec![TaskHub { name: "hub".into(), scheduler: "sched".into() }]);
        assert!(p.list_schedulers(&ResourceScope::new("sub", "other")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let p = InMemoryResourceProvider::new();
        p.create_sql_server(&scope(), "srv", "eastus", "admin", "pw").await.unwrap();
        let err = p
            .create_sql_server(&scope(), "SRV", "eastus", "admin", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn injected_failure() {
        let p = InMemoryResourceProvider::new().fail_on("list_storage_accounts", "throttled");
        let err = p.list_storage_accounts(&scope()).await.unwrap_err();
        assert_eq!(err.to_string(), "list_storage_accounts failed: throttled");
    }

    #[test]
    fn inventory_from_yaml() {
        let inv: Inventory = serde_yaml::from_str(
            "schedulers:\n  - name: s1\n    location: eastus\n    endpoint: https://s1.eastus.durabletask.io\n    task_hubs: [orders]\nstorage_accounts:\n  - name: acct\n    location: eastus\n    key: abc\n",
        )
        .unwrap();
        assert_eq!(inv.schedulers[0].task_hubs, vec!["orders"]);
        assert_eq!(inv.storage_accounts[0].key, "abc");
        assert!(inv.sql_servers.is_empty());
    }
}
