use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::catalog::{DEPLOY_COMMAND, RUN_WIZARD_COMMAND};
use crate::classifier::IntentClassifier;
use crate::command::{CommandHandler, HandlerContext};
use crate::connections::{find_wizard, WizardInfo, WIZARDS};
use crate::error::Result;
use crate::json_extract::{find_field, value_as_string};
use crate::types::{CommandResult, FollowUp};

pub struct DeployHandler;

#[async_trait]
impl CommandHandler for DeployHandler {
    async fn handle(&self, _prompt: &str, ctx: &HandlerContext<'_>) -> Result<CommandResult> {
        ctx.check_cancelled()?;
        let text = "Deploy your local project to a function app in Azure. \
                    You'll pick the subscription and function app, then the project is built and zip-deployed.";
        ctx.progress.markdown(text);
        Ok(CommandResult::message(text).with_follow_ups(vec![FollowUp::command(DEPLOY_COMMAND)]))
    }
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

const CONNECT_SYSTEM_PROMPT: &str = "You decide which resource connection a developer wants to configure for an Azure Functions project.\n\
The options are:\n\
- durableTaskScheduler: a Durable Task Scheduler and task hub for Durable Functions\n\
- sql: an Azure SQL server and database\n\
- storage: an Azure Storage account (AzureWebJobsStorage)\n\
Respond with a JSON object {\"connection\": \"<option>\"} using one option exactly as written, or {\"connection\": \"none\"}.";

/// Works out which connection wizard the user wants and suggests running it.
pub struct ConnectHandler {
    classifier: IntentClassifier,
}

impl ConnectHandler {
    pub fn new(classifier: IntentClassifier) -> Self {
        Self { classifier }
    }

    async fn choose(&self, prompt: &str, ctx: &HandlerContext<'_>) -> Result<Option<&'static WizardInfo>> {
        if prompt.trim().is_empty() {
            return Ok(None);
        }
        let obj = self
            .classifier
            .extract(CONNECT_SYSTEM_PROMPT, prompt, ctx.cancel)
            .await?;
        let chosen = obj
            .as_ref()
            .and_then(|o| find_field(o, "connection", &[]))
            .and_then(value_as_string);
        Ok(chosen.and_then(|c| find_wizard(c.trim())))
    }
}

#[async_trait]
impl CommandHandler for ConnectHandler {
    async fn handle(&self, prompt: &str, ctx: &HandlerContext<'_>) -> Result<CommandResult> {
        ctx.check_cancelled()?;
        let Some(wizard) = self.choose(prompt, ctx).await? else {
            let text = "Which connection would you like to set up? I can configure a Durable Task Scheduler, an Azure SQL database, or an Azure Storage account.";
            ctx.progress.markdown(text);
            let follow_ups = WIZARDS
                .iter()
                .map(|w| FollowUp::reply(format!("Set up a {} connection", w.label)))
                .collect();
            return Ok(CommandResult::message(text).with_follow_ups(follow_ups));
        };

        let mut args = Map::new();
        args.insert("wizardId".into(), Value::String(wizard.id.into()));
        let text = format!("Let's set up a {} connection. {}.", wizard.label, wizard.description);
        ctx.progress.markdown(&text);
        Ok(CommandResult::message(text)
            .with_payload(json!({ "wizardId": wizard.id }))
            .with_follow_ups(vec![FollowUp::command_with(RUN_WIZARD_COMMAND, args)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatSession;
    use crate::testing::ScriptedModel;
    use crate::types::NullProgress;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    async fn run(handler: &dyn CommandHandler, prompt: &str) -> CommandResult {
        let session = ChatSession::new();
        let cancel = CancellationToken::new();
        let ctx = HandlerContext {
            session: &session,
            progress: &NullProgress,
            cancel: &cancel,
        };
        handler.handle(prompt, &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn deploy_suggests_deploy_command() {
        let result = run(&DeployHandler, "").await;
        assert_eq!(result.follow_ups, vec![FollowUp::command(DEPLOY_COMMAND)]);
    }

    #[tokio::test]
    async fn connect_maps_to_wizard() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"connection": "SQL"}"#));
        let result = run(&ConnectHandler::new(IntentClassifier::new(model)), "hook up a database").await;
        assert_eq!(result.payload.unwrap()["wizardId"], crate::connections::SQL_WIZARD);
        assert!(matches!(
            &result.follow_ups[0],
            FollowUp::Command { command_id, .. } if command_id == RUN_WIZARD_COMMAND
        ));
    }

    #[tokio::test]
    async fn connect_without_match_offers_choices() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"connection": "none"}"#));
        let result = run(&ConnectHandler::new(IntentClassifier::new(model)), "connect stuff").await;
        assert_eq!(result.follow_ups.len(), 3);
        assert!(result.payload.is_none());
    }
}
