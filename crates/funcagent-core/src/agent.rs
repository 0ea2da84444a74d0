use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::classifier::IntentClassifier;
use crate::command::HandlerContext;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::handlers::{self, RouterOptions};
use crate::model::LanguageModel;
use crate::router::IntentRouter;
use crate::session::ChatSession;
use crate::types::{CommandResult, ProgressSink};

/// One line of the command listing, e.g. `/functions /learn`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandInfo {
    pub invocation: String,
    pub description: String,
}

/// The chat participant: the top-level router plus the model it classifies with.
pub struct Agent {
    router: IntentRouter,
    commands: Vec<CommandInfo>,
}

impl Agent {
    pub fn new(model: Arc<dyn LanguageModel>, options: RouterOptions) -> Result<Self> {
        let classifier = IntentClassifier::new(model).with_timeout(options.classifier_timeout);
        let router = handlers::agent_router(&classifier, &options)?;

        let mut commands = Vec::new();
        for c in router.registry().iter() {
            commands.push(CommandInfo {
                invocation: format!("/{}", c.name),
                description: c.short_description.clone(),
            });
            if let Some(nested) = c.handler.nested() {
                commands.extend(nested.iter().map(|n| CommandInfo {
                    invocation: format!("/{} /{}", c.name, n.name),
                    description: n.short_description.clone(),
                }));
            }
        }
        Ok(Self { router, commands })
    }

    /// Build from the `router`, `follow_ups` and `model.timeout_secs` sections.
    pub fn from_config(model: Arc<dyn LanguageModel>, config: &AgentConfig) -> Result<Self> {
        Self::new(model, router_options(config))
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    /// Every command reachable from the top-level router, nested ones included.
    pub fn commands(&self) -> &[CommandInfo] {
        &self.commands
    }

    /// Route one user turn and record it in `session`.
    ///
    /// Cancellation leaves the session untouched.
    pub async fn respond(
        &self,
        session: &mut ChatSession,
        prompt: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Option<CommandResult>> {
        let result = {
            let ctx = HandlerContext {
                session: &*session,
                progress,
                cancel,
            };
            self.router.route(prompt, &ctx).await?
        };
        session.record(prompt, result.as_ref());
        Ok(result)
    }
}

pub fn router_options(config: &AgentConfig) -> RouterOptions {
    RouterOptions {
        intent_detection: config.router.intent_detection,
        follow_ups: config.follow_ups.enabled,
        max_questions: config.follow_ups.max_questions,
        classifier_timeout: Duration::from_secs(config.model.timeout_secs),
    }
}
