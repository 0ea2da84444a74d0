use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat completions returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse chat completions response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("chat completions response had no message content")]
    EmptyResponse,
}

impl ChatClientError {
    /// HTTP status of the failed response, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatClientError>;
