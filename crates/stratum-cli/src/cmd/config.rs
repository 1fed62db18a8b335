use super::{CoordinateArgs, SourceArgs};
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use std::sync::Arc;
use stratum_core::orchestrator::{self, Action, RunConfig};
use stratum_core::resolver::{CommandLineOverrides, ConfigHelper};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the resolved shared snapshot and each tenant snapshot
    Show {
        #[command(flatten)]
        coordinates: CoordinateArgs,

        /// Tenant to resolve (repeatable)
        #[arg(long = "tenant", env = "STRATUM_TENANT", value_delimiter = ',')]
        tenants: Vec<String>,

        #[command(flatten)]
        source: SourceArgs,

        /// Override a config value (key.path=value, repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_dir: &Path, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show {
            coordinates,
            tenants,
            source,
            overrides,
        } => show(config_dir, &coordinates, &tenants, &source, &overrides),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(
    config_dir: &Path,
    coordinates: &CoordinateArgs,
    tenants: &[String],
    source: &SourceArgs,
    overrides: &[String],
) -> anyhow::Result<()> {
    let run = RunConfig::new(Action::DeployConfig, coordinates.identity())
        .with_tenants(tenants.iter().map(String::as_str));

    let overrides = CommandLineOverrides::parse(overrides)?;
    let mut helpers: Vec<Arc<dyn ConfigHelper>> = Vec::new();
    if !overrides.is_empty() {
        helpers.push(Arc::new(overrides));
    }

    let resolved = orchestrator::resolve(&run, source.open(config_dir)?, helpers)
        .context("failed to resolve configuration")?;
    print_json(&resolved)
}
