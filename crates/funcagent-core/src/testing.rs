//! Deterministic stand-ins for the language model, for tests and offline
//! benchmark replay.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::model::{LanguageModel, ModelRequest};

type Matcher = Box<dyn Fn(&ModelRequest) -> bool + Send + Sync>;

enum Reply {
    Text(String),
    Fail(String),
}

struct Rule {
    matcher: Matcher,
    reply: Reply,
}

/// A model whose replies are chosen by the first matching rule.
///
/// Every request is recorded, including ones that end up failing.
#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<Rule>,
    fallback: Option<Reply>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `text` to any request no rule matched.
    pub fn reply_always(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(Reply::Text(text.into()));
        self
    }

    /// Fail any request no rule matched.
    pub fn fail_always(mut self, message: impl Into<String>) -> Self {
        self.fallback = Some(Reply::Fail(message.into()));
        self
    }

    pub fn when<F>(mut self, matcher: F, text: impl Into<String>) -> Self
    where
        F: Fn(&ModelRequest) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            reply: Reply::Text(text.into()),
        });
        self
    }

    pub fn when_system_contains(self, needle: &str, text: impl Into<String>) -> Self {
        let needle = needle.to_string();
        self.when(move |r| r.system_prompt.contains(&needle), text)
    }

    /// Match when the system prompt contains `system` and the user content
    /// contains `user` (case-insensitive).
    pub fn when_both_contain(self, system: &str, user: &str, text: impl Into<String>) -> Self {
        let system = system.to_string();
        let user = user.to_lowercase();
        self.when(
            move |r| r.system_prompt.contains(&system) && r.user_content.to_lowercase().contains(&user),
            text,
        )
    }

    pub fn fail_when_system_contains(mut self, needle: &str, message: impl Into<String>) -> Self {
        let needle = needle.to_string();
        self.rules.push(Rule {
            matcher: Box::new(move |r| r.system_prompt.contains(&needle)),
            reply: Reply::Fail(message.into()),
        });
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest, cancel: &CancellationToken) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        let reply = self
            .rules
            .iter()
            .find(|rule| (rule.matcher)(request))
            .map(|rule| &rule.reply)
            .or(self.fallback.as_ref());
        match reply {
            Some(Reply::Text(t)) => Ok(t.clone()),
            Some(Reply::Fail(m)) => Err(AgentError::Model(m.clone())),
            None => Err(AgentError::Model("no scripted reply".into())),
        }
    }
}
