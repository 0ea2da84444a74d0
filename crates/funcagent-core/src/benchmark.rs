//! Replay canned prompts through the agent and check where they land.
//!
//! A run is judged on two things: whether the handler chain prefix-matches
//! one of the benchmark's acceptable chains, and whether the follow-ups meet
//! the benchmark's expectations. Every run is appended to a
//! [`BenchmarkHistory`]; summaries are derived from that list on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::catalog::{CREATE_PROJECT_COMMAND, DEPLOY_COMMAND, RUN_WIZARD_COMMAND};
use crate::error::{AgentError, Result};
use crate::handlers::{BRAINSTORM, CONNECT, CREATE_FUNCTION_PROJECT, DEPLOY, FUNCTIONS, HELP, LEARN};
use crate::session::ChatSession;
use crate::types::{FollowUp, NullProgress};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowUpExpectations {
    /// Each of these must be offered.
    #[serde(default)]
    pub required: Vec<FollowUp>,
    /// Command follow-ups outside `required` must appear here.
    #[serde(default)]
    pub acceptable: Vec<FollowUp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub name: String,
    pub prompt: String,
    pub acceptable_handler_chains: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_ups: Option<FollowUpExpectations>,
}

impl Benchmark {
    pub fn new(name: &str, prompt: &str, chains: &[&[&str]]) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            acceptable_handler_chains: chains
                .iter()
                .map(|c| c.iter().map(|s| s.to_string()).collect())
                .collect(),
            follow_ups: None,
        }
    }

    pub fn requiring(mut self, follow_up: FollowUp) -> Self {
        self.follow_ups.get_or_insert_with(Default::default).required.push(follow_up);
        self
    }
}

fn args(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}

/// Fixtures shipped with the agent.
pub fn builtin_benchmarks() -> Vec<Benchmark> {
    vec![
        Benchmark::new(
            "blob-trigger-question",
            "How can I use azure functions to run code whenever a blob is changed?",
            &[&[FUNCTIONS, LEARN], &[FUNCTIONS, BRAINSTORM]],
        ),
        Benchmark::new("empty-prompt-shows-help", "", &[&[HELP]]),
        Benchmark::new("explicit-functions-help", "/functions /help", &[&[FUNCTIONS, HELP]]),
        Benchmark::new(
            "explicit-create-project",
            "/functions /createFunctionProject",
            &[&[FUNCTIONS, CREATE_FUNCTION_PROJECT]],
        ),
        Benchmark::new(
            "create-python-project",
            "Create a new Python function project",
            &[&[FUNCTIONS, CREATE_FUNCTION_PROJECT]],
        )
        .requiring(FollowUp::command_with(
            CREATE_PROJECT_COMMAND,
            args(&[("language", "Python")]),
        )),
        Benchmark::new(
            "deploy-to-azure",
            "Deploy my function app to Azure",
            &[&[FUNCTIONS, DEPLOY]],
        )
        .requiring(FollowUp::command(DEPLOY_COMMAND)),
        Benchmark::new(
            "connect-sql-database",
            "Connect my functions project to an Azure SQL database",
            &[&[FUNCTIONS, CONNECT]],
        )
        .requiring(FollowUp::command_with(
            RUN_WIZARD_COMMAND,
            args(&[("wizardId", "sql")]),
        )),
    ]
}

/// Read a YAML list of benchmarks.
pub fn load_fixtures(path: &Path) -> Result<Vec<Benchmark>> {
    let data = std::fs::read_to_string(path)?;
    let fixtures: Vec<Benchmark> = serde_yaml::from_str(&data)?;
    Ok(fixtures)
}

/// The built-in fixtures followed by those in `extra`, if any.
pub fn all_benchmarks(extra: Option<&Path>) -> Result<Vec<Benchmark>> {
    let mut list = builtin_benchmarks();
    if let Some(path) = extra {
        list.extend(load_fixtures(path)?);
    }
    Ok(list)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// True when some acceptable chain is an elementwise prefix of `chain`.
pub fn chain_is_acceptable(chain: &[String], acceptable: &[Vec<String>]) -> bool {
    acceptable
        .iter()
        .any(|expected| expected.len() <= chain.len() && expected.iter().zip(chain).all(|(e, a)| e == a))
}

/// Whether `actual` satisfies the `expected` follow-up.
pub fn follow_up_matches(expected: &FollowUp, actual: &FollowUp) -> bool {
    match (expected, actual) {
        (
            FollowUp::Command { command_id: ec, args: ea },
            FollowUp::Command { command_id: ac, args: aa },
        ) => ec == ac && ea.iter().all(|(k, v)| aa.get(k) == Some(v)),
        (FollowUp::Reply { message: em }, FollowUp::Reply { message: am }) => em == am,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpValidity {
    /// The benchmark has no follow-up expectations.
    NotChecked,
    Valid,
    MissingRequired,
    /// A command follow-up was neither required nor acceptable.
    Unexpected,
}

impl FollowUpValidity {
    pub fn is_checked(self) -> bool {
        self != FollowUpValidity::NotChecked
    }
}

/// Check `actual` follow-ups against `expected`.
///
/// Reply follow-ups are free text written by the model, so only command
/// follow-ups are held to the required/acceptable lists.
pub fn validate_follow_ups(actual: &[FollowUp], expected: Option<&FollowUpExpectations>) -> FollowUpValidity {
    let Some(expected) = expected else {
        return FollowUpValidity::NotChecked;
    };
    if !expected
        .required
        .iter()
        .all(|req| actual.iter().any(|a| follow_up_matches(req, a)))
    {
        return FollowUpValidity::MissingRequired;
    }
    let allowed = |a: &FollowUp| {
        expected
            .required
            .iter()
            .chain(&expected.acceptable)
            .any(|e| follow_up_matches(e, a))
    };
    if actual
        .iter()
        .filter(|a| matches!(a, FollowUp::Command { .. }))
        .all(allowed)
    {
        FollowUpValidity::Valid
    } else {
        FollowUpValidity::Unexpected
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRunStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub handler_chain_valid: bool,
    pub follow_up_validity: FollowUpValidity,
    #[serde(default)]
    pub handler_chain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchmarkRunStats {
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }

    pub fn passed(&self) -> bool {
        self.handler_chain_valid
            && matches!(
                self.follow_up_validity,
                FollowUpValidity::Valid | FollowUpValidity::NotChecked
            )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub name: String,
    pub runs: usize,
    pub handler_chain_valid_pct: f64,
    /// `None` when no run had follow-up expectations.
    pub follow_ups_valid_pct: Option<f64>,
    pub mean_duration_ms: f64,
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Append-only run log, keyed by benchmark name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkHistory {
    runs: BTreeMap<String, Vec<BenchmarkRunStats>>,
}

impl BenchmarkHistory {
    /// Load from `path`; a missing file is an empty history.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::io::write_json(path, self)
    }

    pub fn append(&mut self, name: &str, stats: BenchmarkRunStats) {
        self.runs.entry(name.to_string()).or_default().push(stats);
    }

    pub fn runs(&self, name: &str) -> &[BenchmarkRunStats] {
        self.runs.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.runs.keys().map(String::as_str)
    }

    pub fn summary(&self, name: &str) -> BenchmarkSummary {
        let runs = self.runs(name);
        let chain_valid = runs.iter().filter(|r| r.handler_chain_valid).count();
        let checked: Vec<_> = runs.iter().filter(|r| r.follow_up_validity.is_checked()).collect();
        let follow_ups_valid = checked
            .iter()
            .filter(|r| r.follow_up_validity == FollowUpValidity::Valid)
            .count();
        let total_ms: i64 = runs.iter().map(BenchmarkRunStats::duration_ms).sum();
        BenchmarkSummary {
            name: name.to_string(),
            runs: runs.len(),
            handler_chain_valid_pct: pct(chain_valid, runs.len()),
            follow_ups_valid_pct: (!checked.is_empty()).then(|| pct(follow_ups_valid, checked.len())),
            mean_duration_ms: if runs.is_empty() {
                0.0
            } else {
                total_ms as f64 / runs.len() as f64
            },
        }
    }

    pub fn summaries(&self) -> Vec<BenchmarkSummary> {
        self.names().map(|n| self.summary(n)).collect()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct BenchmarkHarness {
    agent: Arc<Agent>,
    benchmarks: Vec<Benchmark>,
}

impl BenchmarkHarness {
    pub fn new(agent: Arc<Agent>, benchmarks: Vec<Benchmark>) -> Result<Self> {
        let mut seen = HashSet::new();
        for b in &benchmarks {
            if !seen.insert(b.name.as_str()) {
                return Err(AgentError::DuplicateBenchmark(b.name.clone()));
            }
        }
        Ok(Self { agent, benchmarks })
    }

    pub fn benchmarks(&self) -> &[Benchmark] {
        &self.benchmarks
    }

    pub fn get(&self, name: &str) -> Option<&Benchmark> {
        self.benchmarks.iter().find(|b| b.name == name)
    }

    /// Replay one benchmark once in a fresh session.
    pub async fn run_once(&self, benchmark: &Benchmark, cancel: &CancellationToken) -> Result<BenchmarkRunStats> {
        let mut session = ChatSession::new();
        let start_time = Utc::now();
        let outcome = self
            .agent
            .respond(&mut session, &benchmark.prompt, &NullProgress, cancel)
            .await;
        let end_time = Utc::now();

        let (result, error) = match outcome {
            Ok(result) => (result, None),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => (None, Some(e.to_string())),
        };
        let (chain, follow_ups) = result
            .map(|r| (r.handler_chain, r.follow_ups))
            .unwrap_or_default();

        let stats = BenchmarkRunStats {
            start_time,
            end_time,
            handler_chain_valid: chain_is_acceptable(&chain, &benchmark.acceptable_handler_chains),
            follow_up_validity: validate_follow_ups(&follow_ups, benchmark.follow_ups.as_ref()),
            handler_chain: chain,
            error,
        };
        tracing::debug!(
            benchmark = %benchmark.name,
            chain = ?stats.handler_chain,
            passed = stats.passed(),
            "benchmark run"
        );
        Ok(stats)
    }

    /// Run `name` `times` times, appending each run to `history`.
    pub async fn run(
        &self,
        name: &str,
        times: usize,
        history: &mut BenchmarkHistory,
        cancel: &CancellationToken,
    ) -> Result<Vec<BenchmarkRunStats>> {
        let benchmark = self
            .get(name)
            .ok_or_else(|| AgentError::BenchmarkNotFound(name.to_string()))?;
        let mut out = Vec::with_capacity(times);
        for _ in 0..times {
            let stats = self.run_once(benchmark, cancel).await?;
            history.append(name, stats.clone());
            out.push(stats);
        }
        tracing::info!(benchmark = %name, runs = times, "benchmark finished");
        Ok(out)
    }

    /// Run every benchmark `times` times, in fixture order.
    pub async fn run_all(
        &self,
        times: usize,
        history: &mut BenchmarkHistory,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, Vec<BenchmarkRunStats>)>> {
        let mut out = Vec::with_capacity(self.benchmarks.len());
        for benchmark in &self.benchmarks {
            let stats = self.run(&benchmark.name, times, history, cancel).await?;
            out.push((benchmark.name.clone(), stats));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::RouterOptions;
    use crate::testing::ScriptedModel;
    use tempfile::TempDir;

    fn chain(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn blob_expectations() -> Vec<Vec<String>> {
        vec![chain(&["functions", "learn"]), chain(&["functions", "brainstorm"])]
    }

    #[test]
    fn chain_prefix_matching() {
        let expected = blob_expectations();
        assert!(chain_is_acceptable(&chain(&["functions", "learn"]), &expected));
        assert!(chain_is_acceptable(&chain(&["functions", "learn", "extra"]), &expected));
        assert!(!chain_is_acceptable(&chain(&["functions", "deploy"]), &expected));
        assert!(!chain_is_acceptable(&chain(&["functions"]), &expected));
        assert!(!chain_is_acceptable(&[], &expected));
    }

    #[test]
    fn follow_up_args_are_subset_matched() {
        let expected = FollowUp::command_with(RUN_WIZARD_COMMAND, args(&[("wizardId", "sql")]));
        let actual = FollowUp::command_with(
            RUN_WIZARD_COMMAND,
            args(&[("wizardId", "sql"), ("projectPath", "/src/app")]),
        );
        assert!(follow_up_matches(&expected, &actual));
        assert!(!follow_up_matches(&actual, &expected));
        assert!(!follow_up_matches(&FollowUp::reply("a"), &FollowUp::reply("b")));
    }

    #[test]
    fn follow_up_validity() {
        let expectations = FollowUpExpectations {
            required: vec![FollowUp::command(DEPLOY_COMMAND)],
            acceptable: vec![],
        };
        let deploy = FollowUp::command(DEPLOY_COMMAND);
        let other = FollowUp::command(CREATE_PROJECT_COMMAND);
        assert_eq!(validate_follow_ups(&[], None), FollowUpValidity::NotChecked);
        assert_eq!(
            validate_follow_ups(&[deploy.clone(), FollowUp::reply("any")], Some(&expectations)),
            FollowUpValidity::Valid
        );
        assert_eq!(
            validate_follow_ups(&[FollowUp::reply("any")], Some(&expectations)),
            FollowUpValidity::MissingRequired
        );
        assert_eq!(
            validate_follow_ups(&[deploy, other], Some(&expectations)),
            FollowUpValidity::Unexpected
        );
    }

    #[test]
    fn history_summary_is_derived() {
        let t0 = Utc::now();
        let run = |valid: bool, validity: FollowUpValidity, ms: i64| BenchmarkRunStats {
            start_time: t0,
            end_time: t0 + chrono::Duration::milliseconds(ms),
            handler_chain_valid: valid,
            follow_up_validity: validity,
            handler_chain: vec![],
            error: None,
        };
        let mut history = BenchmarkHistory::default();
        history.append("a", run(true, FollowUpValidity::Valid, 10));
        history.append("a", run(false, FollowUpValidity::MissingRequired, 30));
        history.append("a", run(true, FollowUpValidity::NotChecked, 20));
        history.append("a", run(true, FollowUpValidity::Valid, 40));

        let summary = history.summary("a");
        assert_eq!(summary.runs, 4);
        assert_eq!(summary.handler_chain_valid_pct, 75.0);
        let follow_ups = summary.follow_ups_valid_pct.unwrap();
        assert!((follow_ups - 66.666).abs() < 0.01);
        assert_eq!(summary.mean_duration_ms, 25.0);

        let empty = history.summary("missing");
        assert_eq!(empty.runs, 0);
        assert_eq!(empty.follow_ups_valid_pct, None);
    }

    #[test]
    fn history_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("benchmarks/history.json");
        assert_eq!(BenchmarkHistory::load(&path).unwrap(), BenchmarkHistory::default());

        let now = Utc::now();
        let mut history = BenchmarkHistory::default();
        history.append(
            "blob",
            BenchmarkRunStats {
                start_time: now,
                end_time: now,
                handler_chain_valid: true,
                follow_up_validity: FollowUpValidity::NotChecked,
                handler_chain: chain(&["functions", "learn"]),
                error: None,
            },
        );
        history.save(&path).unwrap();
        let loaded = BenchmarkHistory::load(&path).unwrap();
        assert_eq!(loaded.runs("blob").len(), 1);
        assert_eq!(loaded.runs("blob")[0].handler_chain, chain(&["functions", "learn"]));
    }

    #[test]
    fn builtin_names_are_unique() {
        let agent = Arc::new(Agent::new(Arc::new(ScriptedModel::new()), RouterOptions::default()).unwrap());
        assert!(BenchmarkHarness::new(agent.clone(), builtin_benchmarks()).is_ok());

        let mut dupes = builtin_benchmarks();
        dupes.push(dupes[0].clone());
        assert!(matches!(
            BenchmarkHarness::new(agent, dupes),
            Err(AgentError::DuplicateBenchmark(name)) if name == "blob-trigger-question"
        ));
    }

    #[test]
    fn fixtures_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures.yaml");
        std::fs::write(
            &path,
            r#"
- name: timer-question
  prompt: What is a timer trigger?
  acceptable_handler_chains:
    - [functions, learn]
  follow_ups:
    required:
      - type: reply
        message: Show me an example
"#,
        )
        .unwrap();
        let all = all_benchmarks(Some(&path)).unwrap();
        let timer = all.last().unwrap();
        assert_eq!(timer.name, "timer-question");
        assert_eq!(
            timer.follow_ups.as_ref().unwrap().required,
            vec![FollowUp::reply("Show me an example")]
        );
        assert_eq!(all.len(), builtin_benchmarks().len() + 1);
    }

    #[tokio::test]
    async fn blob_benchmark_passes_end_to_end() {
        let model = Arc::new(
            ScriptedModel::new()
                .when_both_contain("- functions:", "blob", r#"{"intent": "functions"}"#)
                .when_both_contain("- brainstorm:", "blob", r#"{"intent": "brainstorm"}"#)
                .reply_always("Use a blob trigger."),
        );
        let options = RouterOptions {
            follow_ups: false,
            ..Default::default()
        };
        let agent = Arc::new(Agent::new(model, options).unwrap());
        let harness = BenchmarkHarness::new(agent, builtin_benchmarks()).unwrap();
        let mut history = BenchmarkHistory::default();

        let runs = harness
            .run("blob-trigger-question", 2, &mut history, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.handler_chain_valid));
        assert_eq!(runs[0].handler_chain, chain(&["functions", "brainstorm"]));
        assert_eq!(history.summary("blob-trigger-question").handler_chain_valid_pct, 100.0);
    }

    #[tokio::test]
    async fn explicit_benchmarks_need_no_classifier() {
        let model = Arc::new(ScriptedModel::new());
        let agent = Arc::new(Agent::new(model.clone(), RouterOptions::default()).unwrap());
        let harness = BenchmarkHarness::new(agent, builtin_benchmarks()).unwrap();
        let mut history = BenchmarkHistory::default();
        let cancel = CancellationToken::new();
        for name in ["empty-prompt-shows-help", "explicit-functions-help"] {
            let runs = harness.run(name, 1, &mut history, &cancel).await.unwrap();
            assert!(runs[0].passed(), "{name}: {:?}", runs[0]);
        }
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_benchmark() {
        let agent = Arc::new(Agent::new(Arc::new(ScriptedModel::new()), RouterOptions::default()).unwrap());
        let harness = BenchmarkHarness::new(agent, vec![]).unwrap();
        let err = harness
            .run("nope", 1, &mut BenchmarkHistory::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::BenchmarkNotFound(_)));
    }

    #[tokio::test]
    async fn cancellation_stops_the_run_without_recording() {
        let agent = Arc::new(Agent::new(Arc::new(ScriptedModel::new()), RouterOptions::default()).unwrap());
        let harness = BenchmarkHarness::new(agent, builtin_benchmarks()).unwrap();
        let mut history = BenchmarkHistory::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = harness.run_all(1, &mut history, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(history.names().count(), 0);
    }
}
