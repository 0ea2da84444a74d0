//! `chat-client`: a small OpenAI-compatible chat-completions client.
//!
//! Used as the model behind the assistant's intent classifier. One request
//! carries a system prompt and a user message and yields the first choice's
//! text. Transient failures (connection errors and HTTP 429/5xx) are retried
//! with exponential backoff.

pub mod client;
pub mod error;
pub(crate) mod retry;
pub mod types;

pub use client::ChatClient;
pub use error::{ChatClientError, Result};
pub use types::{ChatClientConfig, ChatMessage, ChatRequest, ChatResponse, Role};
