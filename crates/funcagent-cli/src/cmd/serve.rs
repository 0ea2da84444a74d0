use anyhow::Context;
use funcagent_server::{AppState, HttpModel};
use std::path::Path;
use std::sync::Arc;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let model = HttpModel::from_config(&config.model).context("failed to build model client")?;

    let rt = super::runtime()?;
    rt.block_on(async {
        let state = AppState::new(root.to_path_buf(), config, Arc::new(model))?;
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        funcagent_server::serve_on(state, listener).await
    })
}
