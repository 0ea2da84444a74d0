//! Known project languages and function templates, plus the classifier
//! sub-calls that pull them out of free text.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::classifier::IntentClassifier;
use crate::error::Result;
use crate::json_extract::{find_field, value_as_string};

pub const CREATE_PROJECT_COMMAND: &str = "azureFunctions.createNewProject";
pub const CREATE_FUNCTION_COMMAND: &str = "azureFunctions.createFunction";
pub const DEPLOY_COMMAND: &str = "azureFunctions.deploy";
pub const RUN_WIZARD_COMMAND: &str = "azureFunctions.runConnectionWizard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub id: &'static str,
    pub display: &'static str,
    #[serde(skip)]
    aliases: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub display: &'static str,
    #[serde(skip)]
    aliases: &'static [&'static str],
}

pub const LANGUAGES: &[Language] = &[
    Language { id: "CSharp", display: "C#", aliases: &["c#", "csharp", "dotnet", ".net", "cs"] },
    Language { id: "JavaScript", display: "JavaScript", aliases: &["js", "node", "nodejs", "javascript"] },
    Language { id: "TypeScript", display: "TypeScript", aliases: &["ts", "typescript"] },
    Language { id: "Python", display: "Python", aliases: &["py", "python", "python3"] },
    Language { id: "Java", display: "Java", aliases: &["java"] },
    Language { id: "PowerShell", display: "PowerShell", aliases: &["powershell", "pwsh", "ps1"] },
];

pub const TEMPLATES: &[Template] = &[
    Template { id: "HttpTrigger", display: "HTTP trigger", aliases: &["http", "httptrigger", "webhook", "api"] },
    Template { id: "TimerTrigger", display: "Timer trigger", aliases: &["timer", "timertrigger", "schedule", "cron"] },
    Template { id: "BlobTrigger", display: "Blob trigger", aliases: &["blob", "blobtrigger", "blobstorage"] },
    Template { id: "QueueTrigger", display: "Queue trigger", aliases: &["queue", "queuetrigger", "storagequeue"] },
    Template { id: "EventHubTrigger", display: "Event Hub trigger", aliases: &["eventhub", "eventhubtrigger", "eventhubs"] },
    Template { id: "ServiceBusQueueTrigger", display: "Service Bus Queue trigger", aliases: &["servicebus", "servicebusqueue", "servicebusqueuetrigger"] },
    Template { id: "CosmosDBTrigger", display: "Cosmos DB trigger", aliases: &["cosmos", "cosmosdb", "cosmosdbtrigger"] },
    Template { id: "DurableFunctionsOrchestration", display: "Durable Functions orchestration", aliases: &["durable", "durablefunctions", "orchestration", "durablefunctionsorchestration"] },
    Template { id: "DurableTaskSchedulerOrchestration", display: "Durable Task Scheduler orchestration", aliases: &["durabletaskscheduler", "dts", "durabletaskschedulerorchestration"] },
    Template { id: "SqlTrigger", display: "SQL trigger", aliases: &["sql", "sqltrigger", "azuresql"] },
];

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn find_language(raw: &str) -> Option<&'static Language> {
    let n = normalize(raw);
    if n.is_empty() {
        return None;
    }
    LANGUAGES.iter().find(|l| {
        normalize(l.id) == n || normalize(l.display) == n || l.aliases.iter().any(|a| normalize(a) == n)
    })
}

pub fn find_template(raw: &str) -> Option<&'static Template> {
    let n = normalize(raw);
    if n.is_empty() {
        return None;
    }
    let stripped = n.strip_suffix("trigger").unwrap_or(&n);
    TEMPLATES.iter().find(|t| {
        normalize(t.id) == n
            || normalize(t.display) == n
            || t.aliases.iter().any(|a| normalize(a) == n || normalize(a) == stripped)
    })
}

pub fn language_list() -> String {
    LANGUAGES
        .iter()
        .map(|l| l.display)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn template_list() -> String {
    TEMPLATES
        .iter()
        .map(|t| t.display)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Slot extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectSlots {
    pub language: Option<&'static Language>,
    pub template: Option<&'static Template>,
}

fn slot_system_prompt() -> String {
    format!(
        "You extract parameters for creating Azure Functions projects and functions from text.\n\
         Known languages: {}.\n\
         Known function templates: {}.\n\
         Respond with a JSON object {{\"language\": \"<language or empty>\", \"template\": \"<template or empty>\"}}. \
         Leave a field empty when the text does not clearly mention it.",
        language_list(),
        template_list()
    )
}

/// Ask the classifier which language and template `text` refers to. Values
/// outside the catalogs are dropped.
pub async fn extract_project_slots(
    classifier: &IntentClassifier,
    text: &str,
    cancel: &CancellationToken,
) -> Result<ProjectSlots> {
    if text.trim().is_empty() {
        return Ok(ProjectSlots::default());
    }
    let Some(obj) = classifier.extract(&slot_system_prompt(), text, cancel).await? else {
        return Ok(ProjectSlots::default());
    };
    let language = find_field(&obj, "language", &[])
        .and_then(value_as_string)
        .and_then(|s| find_language(&s));
    let template = find_field(&obj, "template", &[])
        .and_then(value_as_string)
        .and_then(|s| find_template(&s));
    Ok(ProjectSlots { language, template })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use std::sync::Arc;

    #[test]
    fn languages_match_aliases() {
        assert_eq!(find_language("c#").unwrap().id, "CSharp");
        assert_eq!(find_language("Node.js"), None);
        assert_eq!(find_language("node").unwrap().id, "JavaScript");
        assert_eq!(find_language("PYTHON").unwrap().id, "Python");
        assert!(find_language("cobol").is_none());
        assert!(find_language("  ").is_none());
    }

    #[test]
    fn templates_match_loosely() {
        assert_eq!(find_template("Blob trigger").unwrap().id, "BlobTrigger");
        assert_eq!(find_template("blob").unwrap().id, "BlobTrigger");
        assert_eq!(find_template("HTTP-Trigger").unwrap().id, "HttpTrigger");
        assert_eq!(find_template("eventhub trigger").unwrap().id, "EventHubTrigger");
        assert!(find_template("carrier pigeon").is_none());
    }

    #[tokio::test]
    async fn slots_outside_catalog_are_dropped() {
        let model = Arc::new(
            ScriptedModel::new().reply_always(r#"{"language": "Rust", "template": "blob"}"#),
        );
        let classifier = IntentClassifier::new(model);
        let slots = extract_project_slots(&classifier, "a rust blob function", &CancellationToken::new())
            .await
            .unwrap();
        assert!(slots.language.is_none());
        assert_eq!(slots.template.unwrap().id, "BlobTrigger");
    }

    #[tokio::test]
    async fn empty_text_skips_classifier() {
        let model = Arc::new(ScriptedModel::new());
        let classifier = IntentClassifier::new(model.clone());
        let slots = extract_project_slots(&classifier, "", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(slots, ProjectSlots::default());
        assert_eq!(model.call_count(), 0);
    }
}
