use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// One classifier round trip: a system prompt plus the user's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_content: String,
}

impl ModelRequest {
    pub fn new(system_prompt: impl Into<String>, user_content: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_content: user_content.into(),
        }
    }
}

/// A chat model that answers a single request with plain text.
///
/// Implementations must return [`AgentError::Cancelled`](crate::AgentError::Cancelled)
/// when `cancel` fires before the reply arrives.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest, cancel: &CancellationToken) -> Result<String>;
}
