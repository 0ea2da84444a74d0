use async_trait::async_trait;

use crate::command::{CommandHandler, HandlerContext};
use crate::error::Result;
use crate::types::{CommandResult, FollowUp};

/// Shows a fixed help text, built from a registry when the router is assembled.
pub struct HelpHandler {
    intro: String,
    commands_markdown: String,
}

impl HelpHandler {
    pub fn new(intro: impl Into<String>, commands_markdown: impl Into<String>) -> Self {
        Self {
            intro: intro.into(),
            commands_markdown: commands_markdown.into(),
        }
    }
}

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn handle(&self, _prompt: &str, ctx: &HandlerContext<'_>) -> Result<CommandResult> {
        ctx.check_cancelled()?;
        let text = format!("{}\n\n{}", self.intro, self.commands_markdown);
        ctx.progress.markdown(&text);
        Ok(CommandResult::message(text).with_follow_ups(vec![
            FollowUp::reply("How can I use Azure Functions to react to blob changes?"),
            FollowUp::reply("Create a new function project"),
        ]))
    }
}
