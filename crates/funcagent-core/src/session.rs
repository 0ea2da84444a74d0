use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CommandResult;

/// Turns kept per session; older ones are dropped first.
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub prompt: String,
    pub response: String,
    pub handler_chain: Vec<String>,
    pub at: DateTime<Utc>,
}

/// Per-conversation state owned by the caller.
///
/// Handlers read it; only [`Agent::respond`](crate::agent::Agent::respond)
/// writes it, after a routed invocation has finished.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_result: Option<CommandResult>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, prompt: &str, result: Option<&CommandResult>) {
        self.history.push(Turn {
            prompt: prompt.to_string(),
            response: result.map(|r| r.response.clone()).unwrap_or_default(),
            handler_chain: result.map(|r| r.handler_chain.clone()).unwrap_or_default(),
            at: Utc::now(),
        });
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.previous_result = result.cloned();
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.history.last()
    }
}
