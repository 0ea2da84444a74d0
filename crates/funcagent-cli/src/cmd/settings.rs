use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use funcagent_core::paths;
use funcagent_core::settings::LocalSettings;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum SettingsSubcommand {
    /// List app settings
    List {
        /// Functions project directory (default: project root)
        #[arg(long)]
        project: Option<PathBuf>,
    },

    /// Resolve a value, following a `%NAME%` reference
    Resolve {
        value: String,

        /// Functions project directory (default: project root)
        #[arg(long)]
        project: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: SettingsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SettingsSubcommand::List { project } => list(&project_dir(root, project), json),
        SettingsSubcommand::Resolve { value, project } => resolve(&project_dir(root, project), &value, json),
    }
}

fn project_dir(root: &Path, project: Option<PathBuf>) -> PathBuf {
    project.map(|p| paths::resolve(root, &p)).unwrap_or_else(|| root.to_path_buf())
}

fn load(project: &Path) -> anyhow::Result<LocalSettings> {
    LocalSettings::load(project)
        .with_context(|| format!("failed to load {}", paths::local_settings_path(project).display()))
}

fn list(project: &Path, json: bool) -> anyhow::Result<()> {
    let settings = load(project)?;
    if json {
        return print_json(&settings.values);
    }
    let rows = settings
        .values
        .iter()
        .map(|(k, v)| vec![k.clone(), v.clone()])
        .collect();
    print_table(&["NAME", "VALUE"], rows);
    Ok(())
}

fn resolve(project: &Path, value: &str, json: bool) -> anyhow::Result<()> {
    let settings = load(project)?;
    let resolved = settings.resolve(value);
    if json {
        return print_json(&serde_json::json!({ "value": value, "resolved": resolved }));
    }
    match resolved {
        Some(v) => {
            println!("{v}");
            Ok(())
        }
        None => anyhow::bail!("{value} does not name an app setting"),
    }
}
