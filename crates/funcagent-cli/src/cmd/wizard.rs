use crate::output::{print_json, print_table};
use anyhow::Context;
use async_trait::async_trait;
use clap::Subcommand;
use funcagent_core::connections::{configured_provider, run_wizard, ConnectionOutcome, ConnectionTarget, WIZARDS};
use funcagent_core::paths;
use funcagent_core::wizard::{match_choice, Answers, Choice, Elicitor, ScriptedElicitor, WizardError, WizardResult};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use super::StderrProgress;

#[derive(Subcommand)]
pub enum WizardSubcommand {
    /// List the available connection wizards
    List,

    /// Run a connection wizard
    Run {
        /// Wizard id (see `funcagent wizard list`)
        id: String,

        /// YAML or JSON map of prompt id to answer; prompts interactively when omitted
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Functions project whose local.settings.json is updated
        #[arg(long)]
        project: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: WizardSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        WizardSubcommand::List => list(json),
        WizardSubcommand::Run { id, answers, project } => run_one(root, &id, answers.as_deref(), project, json),
    }
}

fn list(json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&WIZARDS);
    }
    let rows = WIZARDS
        .iter()
        .map(|w| vec![w.id.to_string(), w.label.to_string(), w.description.to_string()])
        .collect();
    print_table(&["ID", "NAME", "DESCRIPTION"], rows);
    Ok(())
}

fn run_one(
    root: &Path,
    id: &str,
    answers: Option<&Path>,
    project: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let provider = configured_provider(root, &config.resources).context("failed to load resource inventory")?;
    let project = project.map(|p| paths::resolve(root, &p));
    let target = ConnectionTarget::from_config(Arc::new(provider), &config.resources, project);

    let elicitor: Box<dyn Elicitor> = match answers {
        Some(path) => {
            let data = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            let map: BTreeMap<String, Answers> =
                serde_yaml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))?;
            Box::new(ScriptedElicitor::new(map))
        }
        None => Box::new(TerminalElicitor::new()),
    };

    let rt = super::runtime()?;
    let outcome = rt.block_on(async {
        let cancel = super::ctrl_c_token();
        run_wizard(id, target, elicitor.as_ref(), &StderrProgress, &cancel).await
    })?;

    if json {
        print_json(&outcome)?;
    } else {
        print_outcome(&outcome);
    }
    if !outcome.outcome.is_completed() {
        anyhow::bail!(
            "wizard {} did not complete: {}",
            outcome.wizard_id,
            outcome.outcome.error.as_deref().unwrap_or("cancelled")
        );
    }
    Ok(())
}

fn print_outcome(outcome: &ConnectionOutcome) {
    println!("Wizard: {} ({:?})", outcome.wizard_id, outcome.outcome.state);
    if !outcome.outcome.executed.is_empty() {
        println!("Executed: {}", outcome.outcome.executed.join(", "));
    }
    if !outcome.outcome.skipped.is_empty() {
        println!("Skipped: {}", outcome.outcome.skipped.join(", "));
    }
    for d in &outcome.outcome.diagnostics {
        println!("[warning] {}: {}", d.step, d.message);
    }
    for (k, v) in &outcome.settings {
        println!("{k} = {v}");
    }
}

// ---------------------------------------------------------------------------
// TerminalElicitor
// ---------------------------------------------------------------------------

/// Asks on stderr and reads answers from stdin. End of input is a missing answer.
struct TerminalElicitor {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalElicitor {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn read(&self, key: &str, prompt: &str) -> WizardResult<String> {
        eprint!("{prompt}: ");
        let _ = std::io::stderr().flush();
        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) => Ok(line.trim().to_string()),
            Ok(None) => Err(WizardError::MissingAnswer(key.to_string())),
            Err(e) => Err(WizardError::step(key, e.to_string())),
        }
    }
}

#[async_trait]
impl Elicitor for TerminalElicitor {
    async fn pick(&self, key: &str, title: &str, choices: &[Choice]) -> WizardResult<String> {
        eprintln!("{title}");
        for (i, c) in choices.iter().enumerate() {
            match &c.description {
                Some(d) => eprintln!("  {}. {} ({d})", i + 1, c.label),
                None => eprintln!("  {}. {}", i + 1, c.label),
            }
        }
        loop {
            let answer = self.read(key, "Choice").await?;
            let by_number = answer
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| choices.get(i));
            if let Some(c) = by_number.or_else(|| match_choice(choices, &answer)) {
                return Ok(c.id.clone());
            }
            eprintln!("Enter a number between 1 and {}.", choices.len());
        }
    }

    async fn input(&self, key: &str, title: &str, default: Option<&str>) -> WizardResult<String> {
        let prompt = match default {
            Some(d) => format!("{title} [{d}]"),
            None => title.to_string(),
        };
        let answer = self.read(key, &prompt).await?;
        match default {
            Some(d) if answer.is_empty() => Ok(d.to_string()),
            _ => Ok(answer),
        }
    }

    async fn feedback(&self, _key: &str, message: &str) {
        eprintln!("{message}");
    }
}
