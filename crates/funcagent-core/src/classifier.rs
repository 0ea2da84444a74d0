use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::json_extract;
use crate::model::{LanguageModel, ModelRequest};

pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);

/// A named option the classifier may choose.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentCandidate {
    pub name: String,
    pub description: String,
}

/// LLM-backed selection and slot extraction.
///
/// Every failure except cancellation degrades to "no answer": transport
/// errors, timeouts and unparseable replies all come back as `Ok(None)`.
#[derive(Clone)]
pub struct IntentClassifier {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `request` and return the raw reply text.
    pub async fn ask(&self, request: &ModelRequest, cancel: &CancellationToken) -> Result<Option<String>> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            reply = tokio::time::timeout(self.timeout, self.model.complete(request, cancel)) => {
                match reply {
                    Err(_) => {
                        tracing::warn!(timeout_secs = self.timeout.as_secs(), "classifier call timed out");
                        Ok(None)
                    }
                    Ok(Err(AgentError::Cancelled)) => Err(AgentError::Cancelled),
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "classifier call failed");
                        Ok(None)
                    }
                    Ok(Ok(text)) => Ok(Some(text)),
                }
            }
        }
    }

    /// Ask for a JSON object and return it if one can be recovered.
    pub async fn extract(
        &self,
        system_prompt: &str,
        user_content: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Map<String, Value>>> {
        let request = ModelRequest::new(system_prompt, user_content);
        let reply = self.ask(&request, cancel).await?;
        let obj = reply.as_deref().and_then(json_extract::extract_object);
        if reply.is_some() && obj.is_none() {
            tracing::debug!("classifier reply contained no JSON object");
        }
        Ok(obj)
    }

    /// Pick the candidate that best matches `prompt`, or `None`.
    ///
    /// The returned name is always one of `candidates` (canonical casing).
    pub async fn detect_intent(
        &self,
        prompt: &str,
        candidates: &[IntentCandidate],
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let system = intent_system_prompt(candidates);
        let Some(obj) = self.extract(&system, prompt, cancel).await? else {
            return Ok(None);
        };
        let chosen = json_extract::find_field(&obj, "intent", &["reason", "explanation"])
            .and_then(json_extract::value_as_string);
        let matched = chosen.and_then(|raw| match_candidate(&raw, candidates));
        tracing::debug!(intent = ?matched, "intent detection finished");
        Ok(matched)
    }
}

fn intent_system_prompt(candidates: &[IntentCandidate]) -> String {
    let mut s = String::from(
        "You are an assistant that determines which intent best matches a user's request.\n\
         The possible intents are:\n",
    );
    for c in candidates {
        s.push_str(&format!("- {}: {}\n", c.name, c.description));
    }
    s.push_str(
        "\nRespond with a single JSON object of the form {\"intent\": \"<name>\"}. \
         Use one of the intent names above exactly as written. \
         If no intent fits, respond with {\"intent\": \"none\"}.",
    );
    s
}

fn match_candidate(raw: &str, candidates: &[IntentCandidate]) -> Option<String> {
    let wanted = raw.trim().trim_start_matches('/');
    candidates
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(wanted))
        .map(|c| c.name.clone())
}
