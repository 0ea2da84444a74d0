use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::catalog::{self, CREATE_FUNCTION_COMMAND, CREATE_PROJECT_COMMAND};
use crate::classifier::IntentClassifier;
use crate::error::{AgentError, Result};
use crate::json_extract::{find_field, value_as_bool, value_as_string};
use crate::types::FollowUp;

pub const MAX_QUESTION_FOLLOW_UPS: usize = 3;
const QUESTION_FIELDS: [&str; MAX_QUESTION_FOLLOW_UPS] = ["followUpOne", "followUpTwo", "followUpThree"];

const ARTIFACT_SYSTEM_PROMPT: &str = "You review a conversation between a user and an assistant about Azure Functions.\n\
Decide whether the assistant's response suggests that the user create a new Azure Functions project, \
a new function inside an existing project, or neither.\n\
Respond with a JSON object {\"suggestsNewProject\": true|false, \"suggestsNewFunction\": true|false}.";

const QUESTION_SYSTEM_PROMPT: &str = "You suggest follow-up questions a user might ask next in a conversation about Azure Functions.\n\
Suggest up to three short questions written from the user's point of view.\n\
Respond with a JSON object {\"followUpOne\": \"...\", \"followUpTwo\": \"...\", \"followUpThree\": \"...\"}.";

/// Proposes next actions after an assistant response.
///
/// Two sub-pipelines run concurrently: artifact detection (new project or
/// function, mapped to a command when the parameters are in the catalog)
/// and clarifying questions. Artifact suggestions come first, followed by at
/// most `max_questions` questions. Failures produce an empty list;
/// cancellation is returned as an error.
#[derive(Clone)]
pub struct FollowUpGenerator {
    classifier: IntentClassifier,
    max_questions: usize,
}

impl FollowUpGenerator {
    pub fn new(classifier: IntentClassifier) -> Self {
        Self {
            classifier,
            max_questions: 2,
        }
    }

    pub fn with_max_questions(mut self, max: usize) -> Self {
        self.max_questions = max.min(MAX_QUESTION_FOLLOW_UPS);
        self
    }

    pub async fn generate(
        &self,
        user_text: &str,
        response_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<FollowUp>> {
        let transcript = format!("User: {user_text}\n\nAssistant: {response_text}");
        let (artifacts, questions) = futures::join!(
            self.artifact_follow_ups(&transcript, cancel),
            self.question_follow_ups(&transcript, cancel),
        );

        let mut out = match artifacts {
            Ok(v) => v,
            Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "artifact follow-ups failed");
                Vec::new()
            }
        };
        match questions {
            Ok(v) => out.extend(v.into_iter().take(self.max_questions)),
            Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
            Err(e) => tracing::warn!(error = %e, "question follow-ups failed"),
        }
        Ok(out)
    }

    async fn artifact_follow_ups(
        &self,
        transcript: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<FollowUp>> {
        let Some(obj) = self
            .classifier
            .extract(ARTIFACT_SYSTEM_PROMPT, transcript, cancel)
            .await?
        else {
            return Ok(Vec::new());
        };
        let flag = |name: &str| {
            find_field(&obj, name, &[])
                .and_then(value_as_bool)
                .unwrap_or(false)
        };
        let wants_project = flag("suggestsNewProject");
        let wants_function = flag("suggestsNewFunction");
        if !wants_project && !wants_function {
            return Ok(Vec::new());
        }

        let slots = catalog::extract_project_slots(&self.classifier, transcript, cancel).await?;
        let mut out = Vec::new();
        if wants_project {
            if let Some(language) = slots.language {
                let mut args = Map::new();
                args.insert("language".into(), Value::String(language.id.into()));
                out.push(FollowUp::command_with(CREATE_PROJECT_COMMAND, args));
            }
        }
        if wants_function {
            if let Some(template) = slots.template {
                let mut args = Map::new();
                args.insert("template".into(), Value::String(template.id.into()));
                if let Some(language) = slots.language {
                    args.insert("language".into(), Value::String(language.id.into()));
                }
                out.push(FollowUp::command_with(CREATE_FUNCTION_COMMAND, args));
            }
        }
        Ok(out)
    }

    async fn question_follow_ups(
        &self,
        transcript: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<FollowUp>> {
        let Some(obj) = self
            .classifier
            .extract(QUESTION_SYSTEM_PROMPT, transcript, cancel)
            .await?
        else {
            return Ok(Vec::new());
        };
        Ok(QUESTION_FIELDS
            .iter()
            .filter_map(|f| find_field(&obj, f, &[]).and_then(value_as_string))
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .map(FollowUp::reply)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const QUESTIONS: &str = r#"{"followUpOne": "How do I test locally?", "followUpTwo": "How do I deploy?", "followUpThree": "What does it cost?"}"#;

    fn generator(model: ScriptedModel) -> FollowUpGenerator {
        FollowUpGenerator::new(IntentClassifier::new(Arc::new(model)))
    }

    #[tokio::test]
    async fn artifact_suggestions_precede_first_two_questions() {
        let model = ScriptedModel::new()
            .when_system_contains("suggestsNewProject", r#"{"suggestsNewProject": true, "suggestsNewFunction": true}"#)
            .when_system_contains("Known languages", r#"{"language": "python", "template": "Blob trigger"}"#)
            .when_system_contains("followUpOne", QUESTIONS);
        let out = generator(model)
            .generate("blob processing?", "Create a Python project with a blob trigger.", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out.len(), 4);
        match &out[0] {
            FollowUp::Command { command_id, args } => {
                assert_eq!(command_id, CREATE_PROJECT_COMMAND);
                assert_eq!(args["language"], "Python");
            }
            other => panic!("unexpected {other:?}"),
        }
        match &out[1] {
            FollowUp::Command { command_id, args } => {
                assert_eq!(command_id, CREATE_FUNCTION_COMMAND);
                assert_eq!(args["template"], "BlobTrigger");
                assert_eq!(args["language"], "Python");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(out[2], FollowUp::reply("How do I test locally?"));
        assert_eq!(out[3], FollowUp::reply("How do I deploy?"));
    }

    #[tokio::test]
    async fn unknown_language_yields_no_command() {
        let model = ScriptedModel::new()
            .when_system_contains("suggestsNewProject", r#"{"suggestsNewProject": true, "suggestsNewFunction": false}"#)
            .when_system_contains("Known languages", r#"{"language": "Fortran"}"#)
            .when_system_contains("followUpOne", r#"{"followUpOne": "Which language?"}"#);
        let out = generator(model)
            .generate("q", "a", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, vec![FollowUp::reply("Which language?")]);
    }

    #[tokio::test]
    async fn model_failure_yields_empty_list() {
        let out = generator(ScriptedModel::new().fail_always("down"))
            .generate("q", "a", &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn max_questions_is_capped() {
        let model = ScriptedModel::new()
            .when_system_contains("suggestsNewProject", r#"{"suggestsNewProject": false}"#)
            .when_system_contains("followUpOne", QUESTIONS);
        let out = generator(model)
            .with_max_questions(10)
            .generate("q", "a", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn sub_pipelines_overlap() {
        let model = ScriptedModel::new()
            .when_system_contains("suggestsNewProject", r#"{"suggestsNewProject": false}"#)
            .when_system_contains("followUpOne", QUESTIONS)
            .with_delay(Duration::from_millis(150));
        let started = Instant::now();
        let out = generator(model)
            .generate("q", "a", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(started.elapsed() < Duration::from_millis(290));
    }

    #[tokio::test]
    async fn cancellation_is_not_swallowed() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = generator(ScriptedModel::new().reply_always(QUESTIONS))
            .generate("q", "a", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
