mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    bench::BenchSubcommand, config::ConfigSubcommand, settings::SettingsSubcommand,
    wizard::WizardSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "funcagent",
    about = "Azure Functions assistant: route chat prompts, run connection wizards, replay benchmarks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .funcagent/ or .git/)
    #[arg(long, global = true, env = "FUNCAGENT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt to the assistant
    Ask {
        /// Prompt text; `/name` selects a command explicitly
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },

    /// Chat interactively, one prompt per line, until end of input
    Chat,

    /// List every command the assistant understands
    Commands,

    /// Run connection wizards
    Wizard {
        #[command(subcommand)]
        subcommand: WizardSubcommand,
    },

    /// Replay routing benchmarks
    Bench {
        #[command(subcommand)]
        subcommand: BenchSubcommand,
    },

    /// Inspect a project's local.settings.json
    Settings {
        #[command(subcommand)]
        subcommand: SettingsSubcommand,
    },

    /// Create, show and validate .funcagent/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Serve the JSON API
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "3142")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Ask { prompt } => cmd::ask::run(&root, &prompt.join(" "), cli.json),
        Commands::Chat => cmd::ask::chat(&root, cli.json),
        Commands::Commands => cmd::commands::run(&root, cli.json),
        Commands::Wizard { subcommand } => cmd::wizard::run(&root, subcommand, cli.json),
        Commands::Bench { subcommand } => cmd::bench::run(&root, subcommand, cli.json),
        Commands::Settings { subcommand } => cmd::settings::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
