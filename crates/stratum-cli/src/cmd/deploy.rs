use super::{CoordinateArgs, SourceArgs};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stratum_core::batch::DEFAULT_WORKERS;
use stratum_core::orchestrator::{Action, DeployReport, Orchestrator, RunConfig};
use stratum_core::provider::local::DEFAULT_NAME;
use stratum_core::provider::LocalProvider;
use stratum_core::resolver::{CommandLineOverrides, ConfigHelper};

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// CreateEnvironmentType, CreateEnvironment, Deploy, DeployConfig or DeployStation
    #[arg(long, env = "STRATUM_ACTION")]
    pub action: Action,

    #[command(flatten)]
    pub coordinates: CoordinateArgs,

    /// Tenant to deploy (repeatable)
    #[arg(long = "tenant", env = "STRATUM_TENANT", value_delimiter = ',')]
    pub tenants: Vec<String>,

    /// Track holding the station (DeployStation)
    #[arg(long, env = "STRATUM_TRACK")]
    pub track: Option<String>,

    /// Station within the track (DeployStation)
    #[arg(long, env = "STRATUM_STATION")]
    pub station: Option<String>,

    /// This environment owns the service's DNS names
    #[arg(long, env = "STRATUM_PRIMARY_ENVIRONMENT")]
    pub primary_environment: bool,

    /// This region is the environment's primary region
    #[arg(long, env = "STRATUM_PRIMARY_REGION")]
    pub primary_region: bool,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Directory holding the provider's state
    #[arg(long, env = "STRATUM_STATE_DIR")]
    pub state_dir: PathBuf,

    /// Account the credentials belong to
    #[arg(long, env = "STRATUM_ACCOUNT_ID")]
    pub account_id: String,

    /// Provider name: its config object and policy directory
    #[arg(long, env = "STRATUM_PROVIDER_NAME", default_value = DEFAULT_NAME)]
    pub provider_name: String,

    /// Maximum concurrent provider calls
    #[arg(long, env = "STRATUM_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Override a config value for every scope (key.path=value, repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

impl DeployArgs {
    fn run_config(&self) -> RunConfig {
        let mut run = RunConfig::new(self.action, self.coordinates.identity())
            .with_tenants(self.tenants.iter().map(String::as_str))
            .with_primary(self.primary_environment, self.primary_region)
            .with_workers(self.workers);
        if let (Some(track), Some(station)) = (&self.track, &self.station) {
            run = run.with_station(track, station);
        }
        run
    }
}

pub fn run(config_dir: &Path, args: DeployArgs, json: bool) -> anyhow::Result<()> {
    let run = args.run_config();
    let source = args.source.open(config_dir)?;

    let overrides = CommandLineOverrides::parse(&args.overrides)?;
    let mut helpers: Vec<Arc<dyn ConfigHelper>> = Vec::new();
    if !overrides.is_empty() {
        helpers.push(Arc::new(overrides));
    }

    let provider = Arc::new(
        LocalProvider::new(&args.state_dir, &args.account_id).with_name(&args.provider_name),
    );

    let action = run.action;
    let orchestrator = Orchestrator::new(run, source, provider, helpers)?;
    let report = orchestrator
        .run()
        .with_context(|| format!("{action} failed"))?;

    if json {
        print_json(&report)?;
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &DeployReport) {
    let groups = [
        ("config", &report.scopes),
        ("role", &report.roles),
        ("init", &report.init_containers),
        ("container", &report.service_containers),
    ];
    let mut rows: Vec<Vec<String>> = groups
        .iter()
        .flat_map(|(kind, names)| names.iter().map(move |n| vec![kind.to_string(), n.clone()]))
        .collect();
    rows.sort();

    if rows.is_empty() {
        println!("{} complete.", report.action);
    } else {
        print_table(&["KIND", "NAME"], &rows);
        println!();
        println!("{} complete: {} item(s) reconciled.", report.action, rows.len());
    }
}
