//! The built-in command set.
//!
//! ```text
//! agent router
//! ├── functions ── nested router
//! │   ├── learn
//! │   ├── brainstorm
//! │   ├── createFunctionProject
//! │   ├── createFunction
//! │   ├── deploy
//! │   ├── connect
//! │   └── help
//! └── help
//! ```

pub mod ask;
pub mod deploy;
pub mod help;
pub mod project;

use std::sync::Arc;
use std::time::Duration;

use crate::classifier::{IntentClassifier, DEFAULT_CLASSIFIER_TIMEOUT};
use crate::command::{Command, CommandRegistry};
use crate::error::Result;
use crate::followup::FollowUpGenerator;
use crate::router::IntentRouter;

pub const FUNCTIONS: &str = "functions";
pub const HELP: &str = "help";
pub const LEARN: &str = "learn";
pub const BRAINSTORM: &str = "brainstorm";
pub const CREATE_FUNCTION_PROJECT: &str = "createFunctionProject";
pub const CREATE_FUNCTION: &str = "createFunction";
pub const DEPLOY: &str = "deploy";
pub const CONNECT: &str = "connect";

/// Knobs shared by every router in the command tree.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub intent_detection: bool,
    pub follow_ups: bool,
    pub max_questions: usize,
    pub classifier_timeout: Duration,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            intent_detection: true,
            follow_ups: true,
            max_questions: 2,
            classifier_timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }
}

fn help_command(registry: &CommandRegistry, intro: &str) -> Command {
    let mut markdown = registry.help_markdown();
    markdown.push_str(&format!("- `/{HELP}`: Show this list of commands\n"));
    Command::new(
        HELP,
        "Show this list of commands",
        "Explain what the assistant can do and list the available commands.",
        Arc::new(help::HelpHandler::new(intro, markdown)),
    )
}

pub fn functions_router(classifier: &IntentClassifier, options: &RouterOptions) -> Result<IntentRouter> {
    let follow_ups = options.follow_ups.then(|| {
        FollowUpGenerator::new(classifier.clone()).with_max_questions(options.max_questions)
    });

    let learn = Command::new(
        LEARN,
        "Learn about Azure Functions",
        "Answer questions about Azure Functions concepts, triggers, bindings, hosting and local development.",
        Arc::new(ask::AskHandler::learn(classifier.clone(), follow_ups.clone())),
    )
    .with_hint(
        "The user asks how Azure Functions works or how to do something with it, such as running code when a blob, queue message, timer or HTTP request arrives.",
    );

    let mut registry = CommandRegistry::new();
    registry.register(learn.clone())?;
    registry.register(
        Command::new(
            BRAINSTORM,
            "Brainstorm solutions with Azure Functions",
            "Suggest ways Azure Functions could be used to solve the user's problem or build their idea.",
            Arc::new(ask::AskHandler::brainstorm(classifier.clone(), follow_ups)),
        )
        .with_hint(
            "The user describes a scenario or problem, such as reacting to blob changes or processing events, and wants ideas for how to build it with Azure Functions.",
        ),
    )?;
    registry.register(Command::new(
        CREATE_FUNCTION_PROJECT,
        "Create a new Azure Functions project",
        "Create a new Azure Functions project in a chosen language, optionally with a first function.",
        Arc::new(project::CreateProjectHandler::new(classifier.clone())),
    ))?;
    registry.register(Command::new(
        CREATE_FUNCTION,
        "Add a function to a project",
        "Add a new function to an existing Azure Functions project from a trigger template.",
        Arc::new(project::CreateFunctionHandler::new(classifier.clone())),
    ))?;
    registry.register(Command::new(
        DEPLOY,
        "Deploy a project to Azure",
        "Deploy the local Azure Functions project to a function app in Azure.",
        Arc::new(deploy::DeployHandler),
    ))?;
    registry.register(Command::new(
        CONNECT,
        "Connect a project to Azure resources",
        "Configure a connection from the project to a Durable Task Scheduler, an Azure SQL database or an Azure Storage account.",
        Arc::new(deploy::ConnectHandler::new(classifier.clone())),
    ))?;
    let help = help_command(&registry, "I can help you build Azure Functions apps. Try one of these commands:");
    registry.register(help.clone())?;

    Ok(IntentRouter::new(registry, classifier.clone())
        .with_no_input(help)
        .with_default(learn)
        .with_intent_detection(options.intent_detection))
}

/// The top-level router every conversation starts at.
pub fn agent_router(classifier: &IntentClassifier, options: &RouterOptions) -> Result<IntentRouter> {
    let functions = Command::new(
        FUNCTIONS,
        "Azure Functions",
        "Anything about Azure Functions: learning, brainstorming, creating projects and functions, deploying, and connecting resources.",
        Arc::new(functions_router(classifier, options)?),
    );

    let mut registry = CommandRegistry::new();
    registry.register(functions.clone())?;
    let help = help_command(&registry, "I'm an assistant for Azure Functions. Available commands:");
    registry.register(help.clone())?;

    Ok(IntentRouter::new(registry, classifier.clone())
        .with_no_input(help)
        .with_default(functions)
        .with_intent_detection(options.intent_detection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::HandlerContext;
    use crate::session::ChatSession;
    use crate::testing::ScriptedModel;
    use crate::types::{FollowUp, NullProgress};
    use tokio_util::sync::CancellationToken;

    fn options() -> RouterOptions {
        RouterOptions {
            follow_ups: false,
            ..Default::default()
        }
    }

    #[test]
    fn command_tree_is_complete() {
        let classifier = IntentClassifier::new(Arc::new(ScriptedModel::new()));
        let router = functions_router(&classifier, &options()).unwrap();
        let names: Vec<_> = router.registry().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![LEARN, BRAINSTORM, CREATE_FUNCTION_PROJECT, CREATE_FUNCTION, DEPLOY, CONNECT, HELP]
        );
        let top = agent_router(&classifier, &options()).unwrap();
        assert!(top.registry().get(FUNCTIONS).is_some());
    }

    #[tokio::test]
    async fn create_function_project_routes_directly() {
        let model = Arc::new(ScriptedModel::new());
        let classifier = IntentClassifier::new(model.clone());
        let router = functions_router(&classifier, &options()).unwrap();
        let session = ChatSession::new();
        let cancel = CancellationToken::new();
        let ctx = HandlerContext {
            session: &session,
            progress: &NullProgress,
            cancel: &cancel,
        };
        let result = router.route("/createFunctionProject", &ctx).await.unwrap().unwrap();
        assert_eq!(result.handler_chain, vec![CREATE_FUNCTION_PROJECT]);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_input_shows_help_at_top_level() {
        let classifier = IntentClassifier::new(Arc::new(ScriptedModel::new()));
        let router = agent_router(&classifier, &options()).unwrap();
        let session = ChatSession::new();
        let cancel = CancellationToken::new();
        let ctx = HandlerContext {
            session: &session,
            progress: &NullProgress,
            cancel: &cancel,
        };
        let result = router.route("", &ctx).await.unwrap().unwrap();
        assert_eq!(result.handler_chain, vec![HELP]);
        assert!(result.response.contains("`/functions`"));
        assert!(result
            .follow_ups
            .iter()
            .all(|f| matches!(f, FollowUp::Reply { .. })));
    }
}
