//! `AzureWebJobsStorage` connection wizard.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::connection_string::STORAGE_EMULATOR_CONNECTION;
use super::provider::StorageAccount;
use super::{ConnectionContext, ConnectionTarget, WriteSettingsStep, STORAGE_ACCOUNT_NAME};
use crate::types::ProgressSink;
use crate::wizard::{
    input_validated, Choice, Elicitor, ExecuteOutcome, ExecuteStep, PromptOutcome, PromptStep, SubWizard, Wizard,
    WizardResult,
};

pub const CONNECTION_SETTING: &str = "AzureWebJobsStorage";

pub const CREATE_ACCOUNT_PRIORITY: u32 = 130;
pub const RESOLVE_CONNECTION_PRIORITY: u32 = 200;

pub struct StorageContext {
    pub target: ConnectionTarget,
    pub account: Option<StorageAccount>,
    pub new_account_name: Option<String>,
    pub connection: Option<String>,
}

impl StorageContext {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            account: None,
            new_account_name: None,
            connection: None,
        }
    }
}

impl ConnectionContext for StorageContext {
    fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    fn settings(&self) -> BTreeMap<String, String> {
        self.connection
            .as_ref()
            .map(|c| BTreeMap::from([(CONNECTION_SETTING.to_string(), c.clone())]))
            .unwrap_or_default()
    }
}

pub fn wizard() -> Wizard<StorageContext> {
    Wizard::new("Connect a storage account")
        .prompt(StorageSourceStep)
        .execute(WriteSettingsStep)
}

struct StorageSourceStep;

#[async_trait]
impl PromptStep<StorageContext> for StorageSourceStep {
    fn id(&self) -> &str {
        "storage"
    }

    async fn prompt(
        &self,
        ctx: &mut StorageContext,
        elicitor: &dyn Elicitor,
    ) -> WizardResult<PromptOutcome<StorageContext>> {
        let accounts = ctx
            .target
            .provider
            .list_storage_accounts(&ctx.target.scope)
            .await?;
        let mut choices = vec![Choice::new("emulator", "Use the local storage emulator").described("Azurite")];
        if !accounts.is_empty() {
            choices.push(Choice::new("existing", "Use an existing storage account"));
        }
        choices.push(Choice::new("new", "Create a new storage account"));

        let picked = elicitor
            .pick(self.id(), "Which storage should AzureWebJobsStorage use?", &choices)
            .await?;
        match picked.as_str() {
            "emulator" => {
                ctx.connection = Some(STORAGE_EMULATOR_CONNECTION.to_string());
                Ok(PromptOutcome::Done)
            }
            "existing" => Ok(PromptOutcome::DoneWith(
                SubWizard::prompts(vec![Box::new(PickAccountStep { accounts })])
                    .with_execute(vec![Box::new(ResolveConnectionStep)]),
            )),
            _ => {
                let existing = accounts.into_iter().map(|a| a.name).collect();
                Ok(PromptOutcome::DoneWith(
                    SubWizard::prompts(vec![Box::new(AccountNameStep { existing })])
                        .with_execute(vec![Box::new(CreateAccountStep), Box::new(ResolveConnectionStep)]),
                ))
            }
        }
    }
}

struct PickAccountStep {
    accounts: Vec<StorageAccount>,
}

#[async_trait]
impl PromptStep<StorageContext> for PickAccountStep {
    fn id(&self) -> &str {
        "storageAccount"
    }

    async fn prompt(
        &self,
        ctx: &mut StorageContext,
        elicitor: &dyn Elicitor,
    ) -> WizardResult<PromptOutcome<StorageContext>> {
        let choices: Vec<_> = self
            .accounts
            .iter()
            .map(|a| Choice::new(&a.name, &a.name).described(&a.location))
            .collect();
        let picked = elicitor.pick(self.id(), "Select a storage account", &choices).await?;
        ctx.account = self.accounts.iter().find(|a| a.name == picked).cloned();
        Ok(PromptOutcome::Done)
    }
}

struct AccountNameStep {
    existing: Vec<String>,
}

#[async_trait]
impl PromptStep<StorageContext> for AccountNameStep {
    fn id(&self) -> &str {
        "storageAccountName"
    }

    async fn prompt(
        &self,
        ctx: &mut StorageContext,
        elicitor: &dyn Elicitor,
    ) -> WizardResult<PromptOutcome<StorageContext>> {
        let name = input_validated(elicitor, self.id(), "Enter a name for the new storage account", None, |v| {
            STORAGE_ACCOUNT_NAME.check(v, &self.existing)
        })
        .await?;
        ctx.new_account_name = Some(name);
        Ok(PromptOutcome::Done)
    }
}

struct CreateAccountStep;

#[async_trait]
impl ExecuteStep<StorageContext> for CreateAccountStep {
    fn id(&self) -> &str {
        "createStorageAccount"
    }

    fn priority(&self) -> u32 {
        CREATE_ACCOUNT_PRIORITY
    }

    fn should_execute(&self, ctx: &StorageContext) -> bool {
        ctx.account.is_none() && ctx.new_account_name.is_some()
    }

    async fn execute(
        &self,
        ctx: &mut StorageContext,
        progress: &dyn ProgressSink,
    ) -> WizardResult<ExecuteOutcome<StorageContext>> {
        let Some(name) = &ctx.new_account_name else {
            return Ok(ExecuteOutcome::Done);
        };
        progress.progress(&format!("Creating storage account \"{name}\"..."));
        let account = ctx
            .target
            .provider
            .create_storage_account(&ctx.target.scope, name, &ctx.target.location)
            .await?;
        progress.markdown(&format!("Created storage account `{}`", account.name));
        ctx.account = Some(account);
        Ok(ExecuteOutcome::Done)
    }
}

/// Fetch the account's connection string.
struct ResolveConnectionStep;

#[async_trait]
impl ExecuteStep<StorageContext> for ResolveConnectionStep {
    fn id(&self) -> &str {
        "resolveStorageConnection"
    }

    fn priority(&self) -> u32 {
        RESOLVE_CONNECTION_PRIORITY
    }

    fn should_execute(&self, ctx: &StorageContext) -> bool {
        ctx.account.is_some() && ctx.connection.is_none()
    }

    async fn execute(
        &self,
        ctx: &mut StorageContext,
        _progress: &dyn ProgressSink,
    ) -> WizardResult<ExecuteOutcome<StorageContext>> {
        let Some(account) = &ctx.account else {
            return Ok(ExecuteOutcome::Done);
        };
        let connection = ctx
            .target
            .provider
            .storage_connection_string(&ctx.target.scope, &account.name)
            .await?;
        ctx.connection = Some(connection);
        Ok(ExecuteOutcome::Done)
    }
}
