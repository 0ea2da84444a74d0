pub mod ask;
pub mod bench;
pub mod commands;
pub mod config;
pub mod serve;
pub mod settings;
pub mod wizard;

use anyhow::Context;
use funcagent_core::config::AgentConfig;
use funcagent_core::types::{ProgressEvent, ProgressSink};
use funcagent_core::Agent;
use funcagent_server::HttpModel;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start tokio runtime")
}

/// The project config, or the defaults when `funcagent config init` was never run.
pub(crate) fn load_config(root: &Path) -> anyhow::Result<AgentConfig> {
    AgentConfig::load_or_default(root).context("failed to load config")
}

pub(crate) fn build_agent(config: &AgentConfig) -> anyhow::Result<Agent> {
    let model = HttpModel::from_config(&config.model).context("failed to build model client")?;
    Ok(Agent::from_config(Arc::new(model), config)?)
}

/// A token cancelled on Ctrl-C. Must be called inside a runtime.
pub(crate) fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

/// Shows step progress on stderr; markdown is left to the final output.
pub(crate) struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        if let ProgressEvent::Progress(text) = event {
            eprintln!("... {text}");
        }
    }
}
