use thiserror::Error;

use crate::connections::provider::ProviderError;
use crate::error::AgentError;

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("wizard cancelled")]
    Cancelled,

    #[error("no answer for prompt '{0}'")]
    MissingAnswer(String),

    #[error("answer '{answer}' is not one of the choices for '{key}'")]
    InvalidChoice { key: String, answer: String },

    #[error("step '{step}' failed: {message}")]
    Step { step: String, message: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl WizardError {
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        WizardError::Step {
            step: step.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WizardError::Cancelled | WizardError::Agent(AgentError::Cancelled))
    }
}

pub type WizardResult<T> = std::result::Result<T, WizardError>;
