use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use super::error::{WizardError, WizardResult};

/// One option offered by [`Elicitor::pick`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Choice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Interactive input for prompt steps.
///
/// `key` identifies the prompt independently of its wording, so scripted
/// answers and logs stay stable when titles change.
#[async_trait]
pub trait Elicitor: Send + Sync {
    /// Return the `id` of the chosen option.
    async fn pick(&self, key: &str, title: &str, choices: &[Choice]) -> WizardResult<String>;

    async fn input(&self, key: &str, title: &str, default: Option<&str>) -> WizardResult<String>;

    /// Report a validation problem with the last answer for `key`.
    async fn feedback(&self, key: &str, message: &str);
}

/// Ask for free text until `validate` accepts it.
///
/// `validate` returns the feedback message for a rejected value. Each
/// rejection yields to the runtime so a surrounding cancellation can fire.
pub async fn input_validated<F>(
    elicitor: &dyn Elicitor,
    key: &str,
    title: &str,
    default: Option<&str>,
    validate: F,
) -> WizardResult<String>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    loop {
        let value = elicitor.input(key, title, default).await?;
        let value = value.trim().to_string();
        match validate(&value) {
            None => return Ok(value),
            Some(message) => {
                tracing::debug!(key, %message, "input rejected");
                elicitor.feedback(key, &message).await;
                tokio::task::yield_now().await;
            }
        }
    }
}

/// Match an answer against choices by id, then by label, ignoring case.
pub fn match_choice<'a>(choices: &'a [Choice], answer: &str) -> Option<&'a Choice> {
    let answer = answer.trim();
    choices
        .iter()
        .find(|c| c.id.eq_ignore_ascii_case(answer))
        .or_else(|| choices.iter().find(|c| c.label.eq_ignore_ascii_case(answer)))
}

// ---------------------------------------------------------------------------
// ScriptedElicitor
// ---------------------------------------------------------------------------

/// One or more answers for a prompt key, consumed in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answers {
    One(String),
    Many(Vec<String>),
}

impl Answers {
    fn into_queue(self) -> VecDeque<String> {
        match self {
            Answers::One(a) => VecDeque::from([a]),
            Answers::Many(v) => v.into(),
        }
    }
}

/// Answers prompts from a prepared map instead of a person.
///
/// Each key holds a queue, so a prompt that is re-asked after validation
/// feedback takes the next answer. An empty answer takes the prompt's
/// default; running out is `MissingAnswer` whether or not there is one.
#[derive(Debug, Default)]
pub struct ScriptedElicitor {
    answers: Mutex<HashMap<String, VecDeque<String>>>,
    feedback: Mutex<Vec<(String, String)>>,
}

impl ScriptedElicitor {
    pub fn new(answers: BTreeMap<String, Answers>) -> Self {
        Self {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|(k, v)| (k, v.into_queue()))
                    .collect(),
            ),
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map: BTreeMap<String, Answers> = BTreeMap::new();
        for (k, v) in pairs {
            let entry = map.remove(k);
            let next = match entry {
                None => Answers::One(v.to_string()),
                Some(Answers::One(first)) => Answers::Many(vec![first, v.to_string()]),
                Some(Answers::Many(mut all)) => {
                    all.push(v.to_string());
                    Answers::Many(all)
                }
            };
            map.insert(k.to_string(), next);
        }
        Self::new(map)
    }

    /// Validation messages reported so far, as `(key, message)`.
    pub fn reported_feedback(&self) -> Vec<(String, String)> {
        self.feedback.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn next(&self, key: &str) -> WizardResult<String> {
        let mut answers = self
            .answers
            .lock()
            .map_err(|_| WizardError::MissingAnswer(key.to_string()))?;
        answers
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| WizardError::MissingAnswer(key.to_string()))
    }
}

#[async_trait]
impl Elicitor for ScriptedElicitor {
    async fn pick(&self, key: &str, _title: &str, choices: &[Choice]) -> WizardResult<String> {
        let answer = self.next(key)?;
        match_choice(choices, &answer)
            .map(|c| c.id.clone())
            .ok_or(WizardError::InvalidChoice {
                key: key.to_string(),
                answer,
            })
    }

    async fn input(&self, key: &str, _title: &str, default: Option<&str>) -> WizardResult<String> {
        let answer = self.next(key)?;
        match default {
            Some(d) if answer.is_empty() => Ok(d.to_string()),
            _ => Ok(answer),
        }
    }

    async fn feedback(&self, key: &str, message: &str) {
        if let Ok(mut f) = self.feedback.lock() {
            f.push((key.to_string(), message.to_string()));
        }
    }
}
