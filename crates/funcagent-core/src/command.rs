use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::classifier::IntentCandidate;
use crate::error::{AgentError, Result};
use crate::session::ChatSession;
use crate::types::{CommandResult, ProgressSink};

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Everything a handler may observe besides its prompt.
pub struct HandlerContext<'a> {
    pub session: &'a ChatSession,
    pub progress: &'a dyn ProgressSink,
    pub cancel: &'a CancellationToken,
}

impl HandlerContext<'_> {
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(AgentError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The work behind a command.
///
/// `prompt` is whatever remains after routing and may be empty; handlers
/// answer an empty prompt with a fallback message rather than an error.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, prompt: &str, ctx: &HandlerContext<'_>) -> Result<CommandResult>;

    /// Sub-commands, for handlers that route further.
    fn nested(&self) -> Option<&CommandRegistry> {
        None
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    /// Replaces `long_description` in classifier prompts when set.
    pub classifier_hint: Option<String>,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        short_description: impl Into<String>,
        long_description: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            short_description: short_description.into(),
            long_description: long_description.into(),
            classifier_hint: None,
            handler,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.classifier_hint = Some(hint.into());
        self
    }

    pub fn intent_description(&self) -> &str {
        self.classifier_hint
            .as_deref()
            .unwrap_or(&self.long_description)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("short_description", &self.short_description)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// CommandRegistry
// ---------------------------------------------------------------------------

/// Ordered set of commands, unique by name. Read-only once built.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) -> Result<()> {
        let valid = !command.name.is_empty()
            && command
                .name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(AgentError::InvalidCommandName(command.name));
        }
        if self.get(&command.name).is_some() {
            return Err(AgentError::DuplicateCommand(command.name));
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn candidates(&self) -> Vec<IntentCandidate> {
        self.commands
            .iter()
            .map(|c| IntentCandidate {
                name: c.name.clone(),
                description: c.intent_description().to_string(),
            })
            .collect()
    }

    /// Markdown help listing every command with its short description.
    pub fn help_markdown(&self) -> String {
        let mut s = String::new();
        for c in &self.commands {
            s.push_str(&format!("- `/{}`: {}\n", c.name, c.short_description));
        }
        s
    }
}
