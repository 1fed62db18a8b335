mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, deploy::DeployArgs, name::NameArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stratum",
    about = "Multi-tenant, multi-region deployment orchestrator",
    version,
    propagate_version = true
)]
struct Cli {
    /// Directory holding the config/ tree (default: auto-detect)
    #[arg(long, global = true, env = "STRATUM_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one action against the provider
    Deploy(Box<DeployArgs>),

    /// Inspect resolved configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Print the names derived from a set of coordinates
    Name(NameArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Deploy(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_dir = || root::resolve_config_dir(cli.config_dir.as_deref());

    let result = match cli.command {
        Commands::Deploy(args) => cmd::deploy::run(&config_dir(), *args, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config_dir(), subcommand),
        Commands::Name(args) => cmd::name::run(args, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
