//! Free-text to command routing.
//!
//! Resolution order for one input:
//!
//! ```text
//! "/name rest"  ──► registry hit? ──yes──► Explicit(name)
//!      │                 │no
//!      ▼                 ▼
//! empty prompt? ──► noInput fallback
//!      │
//!      ▼
//! classifier (unless suppressed) ──hit──► Classified(name)
//!      │miss
//!      ▼
//! default fallback ──none──► no result
//! ```
//!
//! An unknown `/name` is not an error: the whole input is classified as
//! plain text.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use crate::classifier::IntentClassifier;
use crate::command::{Command, CommandHandler, CommandRegistry, HandlerContext};
use crate::error::{AgentError, Result};
use crate::types::CommandResult;

pub const HANDLER_FAILURE_MESSAGE: &str =
    "Sorry, I can't help with that right now. Please try again in a moment.";

static COMMAND_RE: OnceLock<Regex> = OnceLock::new();

fn command_pattern() -> &'static Regex {
    COMMAND_RE.get_or_init(|| Regex::new(r"(?s)^/(\w+)\s*(.*)$").unwrap())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInput {
    /// Trimmed input as typed.
    pub full: String,
    pub explicit: Option<String>,
    /// Text after the explicit command, or the whole input without one.
    pub prompt: String,
}

pub fn parse_input(input: &str) -> ParsedInput {
    let full = input.trim();
    match command_pattern().captures(full) {
        Some(caps) => ParsedInput {
            explicit: Some(caps[1].to_string()),
            prompt: caps[2].trim().to_string(),
            full: full.to_string(),
        },
        None => ParsedInput {
            explicit: None,
            prompt: full.to_string(),
            full: full.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Explicit,
    NoInput,
    Classified,
    Default,
}

#[derive(Debug)]
pub struct Resolution<'a> {
    pub command: &'a Command,
    pub kind: RouteKind,
    /// The prompt handed to the command's handler.
    pub prompt: String,
}

// ---------------------------------------------------------------------------
// IntentRouter
// ---------------------------------------------------------------------------

pub struct IntentRouter {
    registry: CommandRegistry,
    classifier: IntentClassifier,
    no_input: Option<Command>,
    default: Option<Command>,
    intent_detection: bool,
}

impl IntentRouter {
    pub fn new(registry: CommandRegistry, classifier: IntentClassifier) -> Self {
        Self {
            registry,
            classifier,
            no_input: None,
            default: None,
            intent_detection: true,
        }
    }

    pub fn with_no_input(mut self, command: Command) -> Self {
        self.no_input = Some(command);
        self
    }

    pub fn with_default(mut self, command: Command) -> Self {
        self.default = Some(command);
        self
    }

    pub fn with_intent_detection(mut self, enabled: bool) -> Self {
        self.intent_detection = enabled;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Decide which command handles `input` without running it.
    pub async fn resolve(
        &self,
        input: &str,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<Option<Resolution<'_>>> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let parsed = parse_input(input);

        if let Some(name) = &parsed.explicit {
            if let Some(command) = self.registry.get(name) {
                tracing::debug!(command = %name, "explicit command");
                return Ok(Some(Resolution {
                    command,
                    kind: RouteKind::Explicit,
                    prompt: parsed.prompt,
                }));
            }
            tracing::debug!(command = %name, "unknown explicit command, classifying as text");
        }

        // Unknown explicit commands keep their text; known ones returned above.
        let prompt = if parsed.explicit.is_some() {
            parsed.full
        } else {
            parsed.prompt
        };

        if prompt.is_empty() {
            if let Some(command) = &self.no_input {
                return Ok(Some(Resolution {
                    command,
                    kind: RouteKind::NoInput,
                    prompt,
                }));
            }
        } else if self.intent_detection && !self.registry.is_empty() {
            let candidates = self.registry.candidates();
            let detected = self
                .classifier
                .detect_intent(&prompt, &candidates, cancel)
                .await?;
            if let Some(command) = detected.as_deref().and_then(|n| self.registry.get(n)) {
                return Ok(Some(Resolution {
                    command,
                    kind: RouteKind::Classified,
                    prompt,
                }));
            }
        }

        Ok(self.default.as_ref().map(|command| Resolution {
            command,
            kind: RouteKind::Default,
            prompt,
        }))
    }

    /// Resolve `input` and run the chosen handler.
    ///
    /// `Ok(None)` means nothing matched and no default is configured.
    /// Handler failures other than cancellation become an apology message.
    pub async fn route(&self, input: &str, ctx: &HandlerContext<'_>) -> Result<Option<CommandResult>> {
        let Some(resolution) = self.resolve(input, ctx.cancel).await? else {
            tracing::debug!("no route for input");
            return Ok(None);
        };
        let name = resolution.command.name.clone();
        tracing::info!(command = %name, route = ?resolution.kind, "routing");

        let mut result = match resolution
            .command
            .handler
            .handle(&resolution.prompt, ctx)
            .await
        {
            Ok(r) => r,
            Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
            Err(e) => {
                tracing::warn!(command = %name, error = %e, "handler failed");
                CommandResult::message(HANDLER_FAILURE_MESSAGE)
            }
        };
        result.prepend_handler(&name);
        Ok(Some(result))
    }
}

/// A router is itself a handler, which is how nested command sets work.
#[async_trait]
impl CommandHandler for IntentRouter {
    async fn handle(&self, prompt: &str, ctx: &HandlerContext<'_>) -> Result<CommandResult> {
        Ok(self.route(prompt, ctx).await?.unwrap_or_default())
    }

    fn nested(&self) -> Option<&CommandRegistry> {
        Some(&self.registry)
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

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(&self, prompt: &str, _ctx: &HandlerContext<'_>) -> Result<CommandResult> {
            Ok(CommandResult::message(prompt))
        }
    }

    struct Broken;

    #[async_trait]
    impl CommandHandler for Broken {
        async fn handle(&self, _prompt: &str, _ctx: &HandlerContext<'_>) -> Result<CommandResult> {
            Err(AgentError::Model("boom".into()))
        }
    }

    fn cmd(name: &str, description: &str) -> Command {
        Command::new(name, description, description, Arc::new(Echo))
    }

    fn registry() -> CommandRegistry {
        let mut reg = CommandRegistry::new();
        reg.register(cmd("learn", "Learn about Azure Functions")).unwrap();
        reg.register(cmd("deploy", "Deploy a function app")).unwrap();
        reg.register(cmd("createFunctionProject", "Create a new project"))
            .unwrap();
        reg
    }

    fn router(model: Arc<ScriptedModel>) -> IntentRouter {
        IntentRouter::new(registry(), IntentClassifier::new(model))
            .with_no_input(cmd("help", "help"))
            .with_default(cmd("fallback", "fallback"))
    }

    async fn run(router: &IntentRouter, input: &str) -> Option<CommandResult> {
        let session = ChatSession::new();
        let cancel = CancellationToken::new();
        let ctx = HandlerContext {
            session: &session,
            progress: &NullProgress,
            cancel: &cancel,
        };
        router.route(input, &ctx).await.unwrap()
    }

    #[test]
    fn router_exposes_its_registry_as_nested_commands() {
        let inner = router(Arc::new(ScriptedModel::new()));
        let nested: Vec<_> = inner
            .nested()
            .map(|r| r.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        assert_eq!(nested, vec!["learn", "deploy", "createFunctionProject"]);
        assert!(Echo.nested().is_none());
    }

    #[test]
    fn parse_input_splits_command_and_rest() {
        let p = parse_input("  /learn   what is a trigger?  ");
        assert_eq!(p.explicit.as_deref(), Some("learn"));
        assert_eq!(p.prompt, "what is a trigger?");

        let p = parse_input("what is /learn");
        assert_eq!(p.explicit, None);
        assert_eq!(p.prompt, "what is /learn");

        let p = parse_input("/deploy");
        assert_eq!(p.explicit.as_deref(), Some("deploy"));
        assert_eq!(p.prompt, "");
    }

    #[tokio::test]
    async fn explicit_command_skips_classifier_for_any_rest() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"intent":"deploy"}"#));
        let router = router(model.clone());
        for rest in ["", "x", "how do I deploy?", "multi\nline"] {
            for name in ["learn", "deploy", "createFunctionProject"] {
                let input = format!("/{name} {rest}");
                let result = run(&router, &input).await.unwrap();
                assert_eq!(result.handler_chain, vec![name.to_string()]);
                assert_eq!(result.response, rest.trim());
            }
        }
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn bare_command_routes_directly() {
        let model = Arc::new(ScriptedModel::new());
        let router = router(model.clone());
        let result = run(&router, "/createFunctionProject").await.unwrap();
        assert_eq!(result.handler_chain, vec!["createFunctionProject"]);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn free_text_uses_classifier() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"intent":"deploy"}"#));
        let router = router(model.clone());
        let result = run(&router, "push my app to azure").await.unwrap();
        assert_eq!(result.handler_chain, vec!["deploy"]);
        assert_eq!(result.response, "push my app to azure");
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_explicit_command_is_classified_as_text() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"intent":"learn"}"#));
        let router = router(model.clone());
        let result = run(&router, "/madeupname rest of text").await.unwrap();
        assert_eq!(result.handler_chain, vec!["learn"]);
        assert_eq!(result.response, "/madeupname rest of text");
        assert_eq!(
            model.requests()[0].user_content,
            "/madeupname rest of text"
        );
    }

    #[tokio::test]
    async fn empty_input_goes_to_no_input_fallback() {
        let model = Arc::new(ScriptedModel::new());
        let router = router(model.clone());
        let result = run(&router, "   ").await.unwrap();
        assert_eq!(result.handler_chain, vec!["help"]);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn classifier_miss_goes_to_default() {
        let model = Arc::new(ScriptedModel::new().fail_always("offline"));
        let router = router(model);
        let result = run(&router, "tell me a joke").await.unwrap();
        assert_eq!(result.handler_chain, vec!["fallback"]);
    }

    #[tokio::test]
    async fn suppressed_intent_detection_never_calls_model() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"intent":"deploy"}"#));
        let router = router(model.clone()).with_intent_detection(false);
        let result = run(&router, "push my app").await.unwrap();
        assert_eq!(result.handler_chain, vec!["fallback"]);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn no_fallback_and_no_match_yields_nothing() {
        let model = Arc::new(ScriptedModel::new().reply_always(r#"{"intent":"none"}"#));
        let router = IntentRouter::new(registry(), IntentClassifier::new(model));
        assert!(run(&router, "tell me a joke").await.is_none());
        assert!(run(&router, "").await.is_none());
    }

    #[tokio::test]
    async fn nested_router_prepends_outer_name() {
        let model = Arc::new(
            ScriptedModel::new()
                .when_system_contains("- functions:", r#"{"intent":"functions"}"#)
                .reply_always(r#"{"intent":"learn"}"#),
        );
        let inner = router(model.clone());
        let mut outer_reg = CommandRegistry::new();
        outer_reg
            .register(Command::new(
                "functions",
                "Azure Functions",
                "Anything about Azure Functions",
                Arc::new(inner),
            ))
            .unwrap();
        let outer = IntentRouter::new(outer_reg, IntentClassifier::new(model));
        let result = run(&outer, "what is a blob trigger?").await.unwrap();
        assert_eq!(result.handler_chain, vec!["functions", "learn"]);
    }

    #[tokio::test]
    async fn handler_failure_becomes_apology() {
        let mut reg = CommandRegistry::new();
        reg.register(Command::new("broken", "b", "b", Arc::new(Broken)))
            .unwrap();
        let router = IntentRouter::new(reg, IntentClassifier::new(Arc::new(ScriptedModel::new())));
        let result = run(&router, "/broken").await.unwrap();
        assert_eq!(result.response, HANDLER_FAILURE_MESSAGE);
        assert_eq!(result.handler_chain, vec!["broken"]);
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let router = router(Arc::new(ScriptedModel::new()));
        let session = ChatSession::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = HandlerContext {
            session: &session,
            progress: &NullProgress,
            cancel: &cancel,
        };
        let err = router.route("/learn hi", &ctx).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
