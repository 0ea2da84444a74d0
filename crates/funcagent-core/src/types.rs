use serde::{Deserialize, Serialize};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// FollowUp
// ---------------------------------------------------------------------------

/// A suggested next action offered after a command completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FollowUp {
    /// Invoke a host command with arguments.
    Command {
        command_id: String,
        #[serde(default)]
        args: serde_json::Map<String, serde_json::Value>,
    },
    /// Send `message` back to the assistant as the next user turn.
    Reply { message: String },
}

impl FollowUp {
    pub fn command(command_id: impl Into<String>) -> Self {
        FollowUp::Command {
            command_id: command_id.into(),
            args: serde_json::Map::new(),
        }
    }

    pub fn command_with(
        command_id: impl Into<String>,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        FollowUp::Command {
            command_id: command_id.into(),
            args,
        }
    }

    pub fn reply(message: impl Into<String>) -> Self {
        FollowUp::Reply {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandResult
// ---------------------------------------------------------------------------

/// The outcome of one routed command invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Markdown the handler produced (also streamed through the progress sink).
    pub response: String,
    /// Structured handler output (extracted slots, resolved catalog entries).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub follow_ups: Vec<FollowUp>,
    /// Outer-to-inner names of the commands that produced this result.
    #[serde(default)]
    pub handler_chain: Vec<String>,
}

impl CommandResult {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            response: text.into(),
            ..Default::default()
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_follow_ups(mut self, follow_ups: Vec<FollowUp>) -> Self {
        self.follow_ups = follow_ups;
        self
    }

    /// Record that `name` handled this result on the way out of a router.
    pub fn prepend_handler(&mut self, name: &str) {
        self.handler_chain.insert(0, name.to_string());
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum ProgressEvent {
    Markdown(String),
    Progress(String),
}

/// Receives partial output while a handler or wizard step is running.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);

    fn markdown(&self, text: &str) {
        self.report(ProgressEvent::Markdown(text.to_string()));
    }

    fn progress(&self, text: &str) {
        self.report(ProgressEvent::Progress(text.to_string()));
    }
}

/// Discards everything.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Keeps every event in memory, in arrival order.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn into_events(self) -> Vec<ProgressEvent> {
        self.events.into_inner().unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
