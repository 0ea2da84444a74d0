use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("not initialized: run 'funcagent config init'")]
    NotInitialized,

    #[error("operation cancelled")]
    Cancelled,

    #[error("command already registered: {0}")]
    DuplicateCommand(String),

    #[error("invalid command name '{0}': must be a single word")]
    InvalidCommandName(String),

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("wizard not found: {0}")]
    WizardNotFound(String),

    #[error("benchmark not found: {0}")]
    BenchmarkNotFound(String),

    #[error("duplicate benchmark: {0}")]
    DuplicateBenchmark(String),

    #[error("language model error: {0}")]
    Model(String),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid local settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
