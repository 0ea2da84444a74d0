use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use funcagent_core::benchmark::{all_benchmarks, BenchmarkHarness, BenchmarkHistory, BenchmarkSummary};
use funcagent_core::config::AgentConfig;
use funcagent_core::paths;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Subcommand)]
pub enum BenchSubcommand {
    /// List benchmark fixtures
    List,

    /// Replay benchmarks and append the results to history
    Run {
        /// Benchmark name (default: all)
        name: Option<String>,

        /// Runs per benchmark
        #[arg(long, default_value = "1")]
        times: usize,
    },

    /// Pass rates derived from the recorded history
    Stats {
        /// Limit to one benchmark
        name: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: BenchSubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    match subcmd {
        BenchSubcommand::List => list(root, &config, json),
        BenchSubcommand::Run { name, times } => run_benchmarks(root, &config, name.as_deref(), times, json),
        BenchSubcommand::Stats { name } => stats(root, &config, name.as_deref(), json),
    }
}

fn fixtures_path(root: &Path, config: &AgentConfig) -> Option<PathBuf> {
    config.benchmarks.fixtures.as_deref().map(|p| paths::resolve(root, p))
}

fn history_path(root: &Path, config: &AgentConfig) -> PathBuf {
    paths::resolve(root, &config.benchmarks.history)
}

fn list(root: &Path, config: &AgentConfig, json: bool) -> anyhow::Result<()> {
    let benchmarks = all_benchmarks(fixtures_path(root, config).as_deref()).context("failed to load fixtures")?;
    if json {
        return print_json(&benchmarks);
    }
    let rows = benchmarks
        .iter()
        .map(|b| {
            let chains: Vec<String> = b.acceptable_handler_chains.iter().map(|c| c.join(">")).collect();
            vec![b.name.clone(), b.prompt.clone(), chains.join(" | ")]
        })
        .collect();
    print_table(&["NAME", "PROMPT", "ACCEPTABLE CHAINS"], rows);
    Ok(())
}

fn run_benchmarks(
    root: &Path,
    config: &AgentConfig,
    name: Option<&str>,
    times: usize,
    json: bool,
) -> anyhow::Result<()> {
    if times == 0 {
        anyhow::bail!("--times must be at least 1");
    }
    let agent = Arc::new(super::build_agent(config)?);
    let benchmarks = all_benchmarks(fixtures_path(root, config).as_deref()).context("failed to load fixtures")?;
    let harness = BenchmarkHarness::new(agent, benchmarks)?;
    let history_file = history_path(root, config);
    let mut history = BenchmarkHistory::load(&history_file).context("failed to load benchmark history")?;

    let rt = super::runtime()?;
    let results = rt.block_on(async {
        let cancel = super::ctrl_c_token();
        match name {
            Some(n) => harness
                .run(n, times, &mut history, &cancel)
                .await
                .map(|runs| vec![(n.to_string(), runs)]),
            None => harness.run_all(times, &mut history, &cancel).await,
        }
    })?;
    history.save(&history_file).context("failed to save benchmark history")?;

    let summaries: Vec<BenchmarkSummary> = results.iter().map(|(n, _)| history.summary(n)).collect();
    if json {
        let value: Vec<_> = results
            .iter()
            .zip(&summaries)
            .map(|((n, runs), s)| serde_json::json!({ "name": n, "runs": runs, "summary": s }))
            .collect();
        return print_json(&value);
    }

    let rows = results
        .iter()
        .map(|(n, runs)| {
            let passed = runs.iter().filter(|r| r.passed()).count();
            let last_chain = runs.last().map(|r| r.handler_chain.join(">")).unwrap_or_default();
            vec![n.clone(), format!("{passed}/{}", runs.len()), last_chain]
        })
        .collect();
    print_table(&["BENCHMARK", "PASSED", "LAST CHAIN"], rows);
    Ok(())
}

fn stats(root: &Path, config: &AgentConfig, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let history = BenchmarkHistory::load(&history_path(root, config)).context("failed to load benchmark history")?;
    let summaries = match name {
        Some(n) => vec![history.summary(n)],
        None => history.summaries(),
    };
    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No benchmark runs recorded.");
        return Ok(());
    }
    let rows = summaries
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.runs.to_string(),
                format!("{:.0}%", s.handler_chain_valid_pct),
                s.follow_ups_valid_pct.map(|p| format!("{p:.0}%")).unwrap_or_else(|| "-".into()),
                format!("{:.0}", s.mean_duration_ms),
            ]
        })
        .collect();
    print_table(&["BENCHMARK", "RUNS", "CHAIN OK", "FOLLOW-UPS OK", "MEAN MS"], rows);
    Ok(())
}
