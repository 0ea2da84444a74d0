use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::catalog::{
    self, ProjectSlots, CREATE_FUNCTION_COMMAND, CREATE_PROJECT_COMMAND, LANGUAGES, TEMPLATES,
};
use crate::classifier::IntentClassifier;
use crate::command::{CommandHandler, HandlerContext};
use crate::error::Result;
use crate::types::{CommandResult, FollowUp};

fn slots_payload(slots: &ProjectSlots) -> Value {
    json!({
        "language": slots.language.map(|l| l.id),
        "template": slots.template.map(|t| t.id),
    })
}

// ---------------------------------------------------------------------------
// createFunctionProject
// ---------------------------------------------------------------------------

pub struct CreateProjectHandler {
    classifier: IntentClassifier,
}

impl CreateProjectHandler {
    pub fn new(classifier: IntentClassifier) -> Self {
        Self { classifier }
    }

    fn ask_for_language() -> CommandResult {
        let text = format!(
            "Which language should the new Azure Functions project use? Supported languages: {}.",
            catalog::language_list()
        );
        let follow_ups = LANGUAGES
            .iter()
            .take(3)
            .map(|l| FollowUp::reply(format!("Create a {} function project", l.display)))
            .collect();
        CommandResult::message(text).with_follow_ups(follow_ups)
    }
}

#[async_trait]
impl CommandHandler for CreateProjectHandler {
    async fn handle(&self, prompt: &str, ctx: &HandlerContext<'_>) -> Result<CommandResult> {
        ctx.check_cancelled()?;
        let slots = catalog::extract_project_slots(&self.classifier, prompt, ctx.cancel).await?;
        let Some(language) = slots.language else {
            let result = Self::ask_for_language();
            ctx.progress.markdown(&result.response);
            return Ok(result.with_payload(slots_payload(&slots)));
        };

        let mut args = Map::new();
        args.insert("language".into(), Value::String(language.id.into()));
        let text = match slots.template {
            Some(template) => {
                args.insert("template".into(), Value::String(template.id.into()));
                format!(
                    "I can create a new {} Azure Functions project with a {} function.",
                    language.display, template.display
                )
            }
            None => format!(
                "I can create a new {} Azure Functions project.",
                language.display
            ),
        };
        ctx.progress.markdown(&text);
        Ok(CommandResult::message(text)
            .with_payload(slots_payload(&slots))
            .with_follow_ups(vec![FollowUp::command_with(CREATE_PROJECT_COMMAND, args)]))
    }
}

// ---------------------------------------------------------------------------
// createFunction
// ---------------------------------------------------------------------------

pub struct CreateFunctionHandler {
    classifier: IntentClassifier,
}

impl CreateFunctionHandler {
    pub fn new(classifier: IntentClassifier) -> Self {
        Self { classifier }
    }

    fn ask_for_template() -> CommandResult {
        let text = format!(
            "Which kind of function would you like to add? Available templates: {}.",
            catalog::template_list()
        );
        let follow_ups = TEMPLATES
            .iter()
            .take(3)
            .map(|t| FollowUp::reply(format!("Create a {} function", t.display)))
            .collect();
        CommandResult::message(text).with_follow_ups(follow_ups)
    }
}

#[async_trait]
impl CommandHandler for CreateFunctionHandler {
    async fn handle(&self, prompt: &str, ctx: &HandlerContext<'_>) -> Result<CommandResult> {
        ctx.check_cancelled()?;
        let slots = catalog::extract_project_slots(&self.classifier, prompt, ctx.cancel).await?;
        let Some(template) = slots.template else {
            let result = Self::ask_for_template();
            ctx.progress.markdown(&result.response);
            return Ok(result.with_payload(slots_payload(&slots)));
        };

        let mut args = Map::new();
        args.insert("template".into(), Value::String(template.id.into()));
        if let Some(language) = slots.language {
            args.insert("language".into(), Value::String(language.id.into()));
        }
        let text = format!("I can add a {} function to your project.", template.display);
        ctx.progress.markdown(&text);
        Ok(CommandResult::message(text)
            .with_payload(slots_payload(&slots))
            .with_follow_ups(vec![FollowUp::command_with(CREATE_FUNCTION_COMMAND, args)]))
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
    async fn project_with_known_language_suggests_command() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"language":"TS","template":""}"#));
        let handler = CreateProjectHandler::new(IntentClassifier::new(model));
        let result = run(&handler, "a typescript project please").await;
        assert_eq!(result.payload.as_ref().unwrap()["language"], "TypeScript");
        match &result.follow_ups[0] {
            FollowUp::Command { command_id, args } => {
                assert_eq!(command_id, CREATE_PROJECT_COMMAND);
                assert_eq!(args["language"], "TypeScript");
                assert!(!args.contains_key("template"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_prompt_asks_for_language() {
        let model = Arc::new(ScriptedModel::new());
        let handler = CreateProjectHandler::new(IntentClassifier::new(model.clone()));
        let result = run(&handler, "").await;
        assert!(result.response.contains("Which language"));
        assert_eq!(result.follow_ups.len(), 3);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn function_needs_known_template() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"language":"","template":"telepathy"}"#));
        let handler = CreateFunctionHandler::new(IntentClassifier::new(model));
        let result = run(&handler, "a telepathy function").await;
        assert!(result.response.contains("Which kind of function"));
    }

    #[tokio::test]
    async fn function_with_template_and_language() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"language":"c#","template":"timer"}"#));
        let handler = CreateFunctionHandler::new(IntentClassifier::new(model));
        let result = run(&handler, "timer function in c#").await;
        assert_eq!(
            result.follow_ups,
            vec![FollowUp::command_with(
                CREATE_FUNCTION_COMMAND,
                serde_json::from_value(json!({"template": "TimerTrigger", "language": "CSharp"})).unwrap()
            )]
        );
    }
}
