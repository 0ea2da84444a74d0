use crate::output::{print_json, print_result};
use funcagent_core::session::ChatSession;
use funcagent_core::Agent;
use std::path::Path;
use tokio::io::AsyncBufReadExt;

use super::StderrProgress;

pub fn run(root: &Path, prompt: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let agent = super::build_agent(&config)?;
    let rt = super::runtime()?;

    rt.block_on(async {
        let cancel = super::ctrl_c_token();
        let mut session = ChatSession::new();
        let result = agent.respond(&mut session, prompt, &StderrProgress, &cancel).await?;
        show(result.as_ref(), json)
    })
}

/// Read prompts line by line, keeping one session for the whole conversation.
pub fn chat(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let agent = super::build_agent(&config)?;
    let rt = super::runtime()?;

    rt.block_on(async {
        let mut session = ChatSession::new();
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            turn(&agent, &mut session, &line, json).await?;
        }
        tracing::debug!(turns = session.history.len(), "chat ended");
        Ok::<_, anyhow::Error>(())
    })
}

async fn turn(agent: &Agent, session: &mut ChatSession, line: &str, json: bool) -> anyhow::Result<()> {
    let cancel = super::ctrl_c_token();
    match agent.respond(session, line, &StderrProgress, &cancel).await {
        Ok(result) => show(result.as_ref(), json),
        // Ctrl-C abandons the turn, not the conversation.
        Err(e) if e.is_cancelled() => {
            eprintln!("(cancelled)");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn show(result: Option<&funcagent_core::types::CommandResult>, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&result);
    }
    match result {
        Some(r) => print_result(r),
        None => println!("No command could handle that prompt."),
    }
    Ok(())
}
