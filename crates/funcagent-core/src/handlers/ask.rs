use async_trait::async_trait;

use crate::classifier::IntentClassifier;
use crate::command::{CommandHandler, HandlerContext};
use crate::error::{AgentError, Result};
use crate::followup::FollowUpGenerator;
use crate::model::ModelRequest;
use crate::types::{CommandResult, FollowUp};

pub const LEARN_SYSTEM_PROMPT: &str = "You are an expert on Azure Functions. Answer the user's question accurately and concisely. \
Prefer concrete guidance: which trigger or binding to use, how to configure it, and how to run it locally. \
Format the answer as Markdown.";

pub const BRAINSTORM_SYSTEM_PROMPT: &str = "You help developers brainstorm how Azure Functions could solve their problem. \
Propose two or three distinct approaches, naming the triggers, bindings and Azure services each one uses, \
and note the trade-offs. Format the answer as Markdown.";

/// Sends the prompt to the model with a fixed system prompt and streams the
/// answer. Used by `learn` and `brainstorm`.
pub struct AskHandler {
    classifier: IntentClassifier,
    follow_ups: Option<FollowUpGenerator>,
    system_prompt: &'static str,
    empty_prompt_message: &'static str,
    suggestions: &'static [&'static str],
}

impl AskHandler {
    pub fn learn(classifier: IntentClassifier, follow_ups: Option<FollowUpGenerator>) -> Self {
        Self {
            classifier,
            follow_ups,
            system_prompt: LEARN_SYSTEM_PROMPT,
            empty_prompt_message: "Ask me anything about Azure Functions: triggers, bindings, hosting plans, or local development.",
            suggestions: &[
                "What triggers does Azure Functions support?",
                "How do I run my functions locally?",
            ],
        }
    }

    pub fn brainstorm(classifier: IntentClassifier, follow_ups: Option<FollowUpGenerator>) -> Self {
        Self {
            classifier,
            follow_ups,
            system_prompt: BRAINSTORM_SYSTEM_PROMPT,
            empty_prompt_message: "Describe what you want to build and I'll suggest ways Azure Functions could do it.",
            suggestions: &[
                "How could I process uploaded images automatically?",
                "How could I run a nightly cleanup job?",
            ],
        }
    }

    fn user_content(prompt: &str, ctx: &HandlerContext<'_>) -> String {
        match ctx.session.last_turn() {
            Some(turn) if !turn.response.is_empty() => format!(
                "Previous question: {}\nPrevious answer: {}\n\nQuestion: {}",
                turn.prompt, turn.response, prompt
            ),
            _ => prompt.to_string(),
        }
    }
}

#[async_trait]
impl CommandHandler for AskHandler {
    async fn handle(&self, prompt: &str, ctx: &HandlerContext<'_>) -> Result<CommandResult> {
        ctx.check_cancelled()?;
        if prompt.trim().is_empty() {
            ctx.progress.markdown(self.empty_prompt_message);
            return Ok(CommandResult::message(self.empty_prompt_message)
                .with_follow_ups(self.suggestions.iter().map(|s| FollowUp::reply(*s)).collect()));
        }

        ctx.progress.progress("Thinking...");
        let request = ModelRequest::new(self.system_prompt, Self::user_content(prompt, ctx));
        let Some(answer) = self.classifier.ask(&request, ctx.cancel).await? else {
            return Err(AgentError::Model("no answer from model".into()));
        };
        ctx.progress.markdown(&answer);

        let follow_ups = match &self.follow_ups {
            Some(generator) => generator.generate(prompt, &answer, ctx.cancel).await?,
            None => Vec::new(),
        };
        Ok(CommandResult::message(answer).with_follow_ups(follow_ups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatSession;
    use crate::testing::ScriptedModel;
    use crate::types::{ProgressEvent, RecordingProgress};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    async fn run(handler: &AskHandler, session: &ChatSession, prompt: &str) -> Result<CommandResult> {
        let progress = RecordingProgress::new();
        let cancel = CancellationToken::new();
        let ctx = HandlerContext {
            session,
            progress: &progress,
            cancel: &cancel,
        };
        handler.handle(prompt, &ctx).await
    }

    #[tokio::test]
    async fn empty_prompt_returns_fallback_without_model_call() {
        let model = Arc::new(ScriptedModel::new());
        let handler = AskHandler::learn(IntentClassifier::new(model.clone()), None);
        let result = run(&handler, &ChatSession::new(), "  ").await.unwrap();
        assert!(result.response.contains("Ask me anything"));
        assert_eq!(result.follow_ups.len(), 2);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn answer_is_streamed_and_returned() {
        let model = Arc::new(ScriptedModel::new().reply_always("Use a **blob trigger**."));
        let handler = AskHandler::learn(IntentClassifier::new(model.clone()), None);
        let progress = RecordingProgress::new();
        let cancel = CancellationToken::new();
        let session = ChatSession::new();
        let ctx = HandlerContext {
            session: &session,
            progress: &progress,
            cancel: &cancel,
        };
        let result = handler.handle("blob changes?", &ctx).await.unwrap();
        assert_eq!(result.response, "Use a **blob trigger**.");
        assert!(progress
            .events()
            .contains(&ProgressEvent::Markdown("Use a **blob trigger**.".into())));
        assert_eq!(model.requests()[0].system_prompt, LEARN_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn previous_turn_is_included() {
        let model = Arc::new(ScriptedModel::new().reply_always("ok"));
        let handler = AskHandler::brainstorm(IntentClassifier::new(model.clone()), None);
        let mut session = ChatSession::new();
        session.record("first question", Some(&CommandResult::message("first answer")));
        run(&handler, &session, "second").await.unwrap();
        let content = &model.requests()[0].user_content;
        assert!(content.contains("Previous question: first question"));
        assert!(content.ends_with("Question: second"));
    }

    #[tokio::test]
    async fn model_failure_is_an_error() {
        let model = Arc::new(ScriptedModel::new().fail_always("down"));
        let handler = AskHandler::learn(IntentClassifier::new(model), None);
        let err = run(&handler, &ChatSession::new(), "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Model(_)));
    }
}
