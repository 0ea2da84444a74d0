use async_trait::async_trait;
use chat_client::{ChatClient, ChatClientConfig};
use funcagent_core::config::ModelConfig;
use funcagent_core::model::{LanguageModel, ModelRequest};
use funcagent_core::AgentError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// [`LanguageModel`] backed by a chat-completions endpoint.
pub struct HttpModel {
    client: ChatClient,
}

impl HttpModel {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ModelConfig) -> anyhow::Result<Self> {
        let client = ChatClient::new(ChatClientConfig {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            ..Default::default()
        })?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl LanguageModel for HttpModel {
    async fn complete(&self, request: &ModelRequest, cancel: &CancellationToken) -> funcagent_core::Result<String> {
        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            reply = self.client.complete(&request.system_prompt, &request.user_content) => {
                reply.map_err(|e| AgentError::Model(e.to_string()))
            }
        }
    }
}
