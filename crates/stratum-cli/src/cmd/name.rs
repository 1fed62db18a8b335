use super::CoordinateArgs;
use crate::output::{print_json, print_table};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct NameArgs {
    #[command(flatten)]
    pub coordinates: CoordinateArgs,

    /// Tenant whose instance name to derive
    #[arg(long, env = "STRATUM_TENANT")]
    pub tenant: Option<String>,

    /// Length limit for the short form
    #[arg(long, default_value_t = 32)]
    pub max: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Names {
    service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_name: Option<String>,
    config_name: String,
    resource_name: String,
    short_name: String,
}

pub fn run(args: NameArgs, json: bool) -> anyhow::Result<()> {
    let mut identity = args.coordinates.identity();
    if let Some(tenant) = &args.tenant {
        identity = identity.with_tenant(tenant);
    }
    identity.validate()?;
    if args.max == 0 {
        anyhow::bail!("--max must be greater than zero");
    }

    let config_name = identity.config_name();
    let names = Names {
        service_name: identity.service_name().to_string(),
        instance_name: identity.instance_name().map(|n| n.to_string()),
        config_name: config_name.to_string(),
        resource_name: identity.resource_name().to_string(),
        short_name: config_name.short_name(args.max),
    };

    if json {
        return print_json(&names);
    }

    let mut rows = vec![vec!["service".to_string(), names.service_name.clone()]];
    if let Some(instance) = &names.instance_name {
        rows.push(vec!["instance".to_string(), instance.clone()]);
    }
    rows.push(vec!["config".to_string(), names.config_name.clone()]);
    rows.push(vec!["resource".to_string(), names.resource_name.clone()]);
    rows.push(vec![format!("short ({})", args.max), names.short_name.clone()]);
    print_table(&["NAME", "VALUE"], &rows);
    Ok(())
}
