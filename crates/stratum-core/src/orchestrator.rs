//! One run: resolve configuration, validate the account, then drive the
//! provider through the phases the action selects.
//!
//! Phases are strictly ordered; only work inside a phase runs concurrently.
//!
//! ```text
//! station (DeployStation) → shared snapshot → account → dnsSuffix
//!   CreateEnvironmentType | CreateEnvironment   shared context only
//!   Deploy | DeployStation | DeployConfig:
//!     service descriptor, policies, tenant snapshots      (no mutation yet)
//!     shared config + policies
//!     shared init containers                               (not DeployConfig)
//!     tenant config + policies                             one batch
//!     tenant init containers                               one batch
//!     service containers of every context                  one batch
//! ```

use crate::batch::BatchExecutor;
use crate::container::Tenancy;
use crate::context::{self, DeploymentContext, Reconciled, RunSettings, Scope, SHARED_LABEL};
use crate::error::{DeployError, Result};
use crate::identity::Identity;
use crate::naming::validate_token;
use crate::provider::Provider;
use crate::resolver::{ConfigHelper, ConfigResolver, SharedLayers};
use crate::service::{fetch_policies, ServiceDescriptor};
use crate::snapshot::Snapshot;
use crate::source::ConfigSource;
use crate::station::Station;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    CreateEnvironmentType,
    CreateEnvironment,
    Deploy,
    DeployConfig,
    DeployStation,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::CreateEnvironmentType => "CreateEnvironmentType",
            Action::CreateEnvironment => "CreateEnvironment",
            Action::Deploy => "Deploy",
            Action::DeployConfig => "DeployConfig",
            Action::DeployStation => "DeployStation",
        }
    }

    pub fn all() -> &'static [Action] {
        &[
            Action::CreateEnvironmentType,
            Action::CreateEnvironment,
            Action::Deploy,
            Action::DeployConfig,
            Action::DeployStation,
        ]
    }

    /// Whether the action reconciles config, policies and roles.
    pub fn deploys_config(self) -> bool {
        matches!(
            self,
            Action::Deploy | Action::DeployConfig | Action::DeployStation
        )
    }

    pub fn deploys_containers(self) -> bool {
        matches!(self, Action::Deploy | Action::DeployStation)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DeployError;

    /// Accepts `DeployConfig`, `deploy-config` and `deploy_config`.
    fn from_str(s: &str) -> Result<Self> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Action::all()
            .iter()
            .copied()
            .find(|a| a.as_str().to_ascii_lowercase() == folded)
            .ok_or_else(|| DeployError::InvalidAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Inputs to one run, validated once before the orchestrator is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub action: Action,
    pub identity: Identity,
    pub tenants: Vec<String>,
    pub track: Option<String>,
    pub station: Option<String>,
    pub primary_environment: bool,
    pub primary_region: bool,
    pub workers: usize,
}

impl RunConfig {
    pub fn new(action: Action, identity: Identity) -> Self {
        let tenants = identity.tenant.iter().cloned().collect();
        Self {
            action,
            identity: identity.shared(),
            tenants,
            track: None,
            station: None,
            primary_environment: false,
            primary_region: false,
            workers: crate::batch::DEFAULT_WORKERS,
        }
    }

    pub fn with_tenants<I, S>(mut self, tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tenant in tenants {
            let tenant = tenant.into();
            if !self.tenants.contains(&tenant) {
                self.tenants.push(tenant);
            }
        }
        self
    }

    pub fn with_station(mut self, track: impl Into<String>, station: impl Into<String>) -> Self {
        self.track = Some(track.into());
        self.station = Some(station.into());
        self
    }

    pub fn with_primary(mut self, environment: bool, region: bool) -> Self {
        self.primary_environment = environment;
        self.primary_region = region;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.identity.validate()?;
        validate_tenants(&self.tenants)?;
        if self.action == Action::DeployStation {
            let track = self
                .track
                .as_deref()
                .ok_or_else(|| DeployError::MissingParameter("track".to_string()))?;
            let station = self
                .station
                .as_deref()
                .ok_or_else(|| DeployError::MissingParameter("station".to_string()))?;
            validate_token(track)?;
            validate_token(station)?;
        }
        if self.workers == 0 {
            return Err(DeployError::invalid_config(
                "workers",
                "worker count must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Coordinates and tenants after station resolution.
    fn target(&self, source: &dyn ConfigSource) -> Result<(Identity, Vec<String>)> {
        match (self.action, &self.track, &self.station) {
            (Action::DeployStation, Some(track), Some(station)) => {
                let station = Station::fetch(source, track, station)?;
                tracing::info!(track = %track, station = %station.name, "resolved station");
                let mut tenants = self.tenants.clone();
                for tenant in station.tenants.iter() {
                    if !tenants.contains(tenant) {
                        tenants.push(tenant.clone());
                    }
                }
                validate_tenants(&tenants)?;
                let identity = station.apply(&self.identity);
                identity.validate()?;
                Ok((identity, tenants))
            }
            (Action::DeployStation, _, _) => Err(DeployError::MissingParameter(
                "track and station".to_string(),
            )),
            _ => Ok((self.identity.clone(), self.tenants.clone())),
        }
    }
}

/// Names lowercase every part, so tenants must stay distinct once folded, and
/// none may take the shared scope's label.
fn validate_tenants(tenants: &[String]) -> Result<()> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for tenant in tenants {
        validate_token(tenant)?;
        let folded = tenant.to_lowercase();
        if folded == SHARED_LABEL {
            return Err(DeployError::invalid_config(
                "tenants",
                format!("\"{tenant}\" is reserved for the shared scope"),
            ));
        }
        if let Some(previous) = seen.insert(folded, tenant) {
            return Err(DeployError::invalid_config(
                "tenants",
                format!("\"{previous}\" and \"{tenant}\" would share resource names"),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Names of everything a run reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub action: Action,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub identity: Identity,
    pub tenants: Vec<String>,
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
    pub init_containers: Vec<String>,
    pub service_containers: Vec<String>,
}

impl DeployReport {
    fn new(action: Action, identity: &Identity, tenants: &[String]) -> Self {
        Self {
            action,
            started_at: Utc::now(),
            finished_at: None,
            identity: identity.clone(),
            tenants: tenants.to_vec(),
            scopes: Vec::new(),
            roles: Vec::new(),
            init_containers: Vec::new(),
            service_containers: Vec::new(),
        }
    }

    fn record<I: IntoIterator<Item = Reconciled>>(&mut self, items: I) {
        for item in items {
            match item {
                Reconciled::Config(name) => self.scopes.push(name),
                Reconciled::Role(name) => self.roles.push(name),
                Reconciled::InitContainer(name) => self.init_containers.push(name),
                Reconciled::ServiceContainer(name) => self.service_containers.push(name),
            }
        }
    }
}

/// Snapshots resolved without touching a provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub identity: Identity,
    pub shared: Snapshot,
    pub tenants: BTreeMap<String, Snapshot>,
}

/// Resolve the shared snapshot and every tenant snapshot for `run`.
pub fn resolve(
    run: &RunConfig,
    source: Arc<dyn ConfigSource>,
    helpers: Vec<Arc<dyn ConfigHelper>>,
) -> Result<ResolvedConfig> {
    run.validate()?;
    let resolver = ConfigResolver::new(source, helpers);
    let (identity, tenants) = run.target(resolver.source())?;
    let shared = resolver.resolve_shared(&identity)?;
    let mut resolved = BTreeMap::new();
    for tenant in &tenants {
        resolved.insert(
            tenant.clone(),
            resolver.resolve_tenant(&shared, &identity, tenant)?,
        );
    }
    Ok(ResolvedConfig {
        identity,
        shared: shared.resolved,
        tenants: resolved,
    })
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<P: Provider> {
    run: RunConfig,
    resolver: ConfigResolver,
    provider: Arc<P>,
    executor: BatchExecutor,
}

impl<P: Provider> Orchestrator<P> {
    pub fn new(
        run: RunConfig,
        source: Arc<dyn ConfigSource>,
        provider: Arc<P>,
        helpers: Vec<Arc<dyn ConfigHelper>>,
    ) -> Result<Self> {
        run.validate()?;
        let executor = BatchExecutor::new(run.workers)?;
        Ok(Self {
            run,
            resolver: ConfigResolver::new(source, helpers),
            provider,
            executor,
        })
    }

    pub fn run(&self) -> Result<DeployReport> {
        let action = self.run.action;
        let (identity, tenants) = self.run.target(self.resolver.source())?;
        log_coordinates(action, &identity, &tenants);

        let shared = self.resolver.resolve_shared(&identity)?;
        let account = Arc::new(
            self.provider
                .validate_account(&shared.resolved, &identity)?,
        );
        let settings = Arc::new(RunSettings {
            primary_environment: self.run.primary_environment,
            primary_region: self.run.primary_region,
            dns_suffix: shared.dns_suffix()?.to_string(),
        });

        let shared_ctx = self.context(&account, &settings, &identity, shared.resolved.clone())?;
        let mut report = DeployReport::new(action, &identity, &tenants);

        match action {
            Action::CreateEnvironmentType => {
                tracing::info!(environment_type = %identity.environment_type, "create environment type");
                shared_ctx.create_environment_type()?;
            }
            Action::CreateEnvironment => {
                tracing::info!(environment = ?identity.environment, "create environment");
                shared_ctx.create_environment()?;
            }
            Action::Deploy | Action::DeployConfig | Action::DeployStation => {
                self.deploy(
                    &mut report,
                    &identity,
                    &tenants,
                    &shared,
                    shared_ctx,
                    &account,
                    &settings,
                )?;
            }
        }

        tracing::info!(
            action = %action,
            scopes = report.scopes.len(),
            roles = report.roles.len(),
            init_containers = report.init_containers.len(),
            service_containers = report.service_containers.len(),
            "run complete"
        );
        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    fn context(
        &self,
        account: &Arc<P::Account>,
        settings: &Arc<RunSettings>,
        identity: &Identity,
        snapshot: Snapshot,
    ) -> Result<DeploymentContext<P>> {
        let variables = context::template_variables(
            self.provider.as_ref(),
            account,
            self.resolver.helpers(),
            identity,
            &snapshot,
        )?;
        let scope = Scope {
            identity: identity.clone(),
            snapshot,
            variables,
            settings: Arc::clone(settings),
        };
        Ok(DeploymentContext::new(
            Arc::clone(&self.provider),
            Arc::clone(account),
            scope,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn deploy(
        &self,
        report: &mut DeployReport,
        identity: &Identity,
        tenants: &[String],
        shared: &SharedLayers,
        shared_ctx: DeploymentContext<P>,
        account: &Arc<P::Account>,
        settings: &Arc<RunSettings>,
    ) -> Result<()> {
        let containers = self.run.action.deploys_containers();
        let source = self.resolver.source();
        let provider = self.provider.name();

        // Everything that can fail on configuration is read before the first
        // mutating call.
        let service = ServiceDescriptor::fetch(source, &identity.service)?;
        let multi_policies = fetch_policies(source, &identity.service, provider, Tenancy::Multi)?;
        let single_policies = fetch_policies(source, &identity.service, provider, Tenancy::Single)?;
        let tenant_snapshots = self.resolve_tenants(identity, tenants, shared)?;

        let mut shared_ctx = shared_ctx.with_policies(multi_policies);
        if containers {
            shared_ctx = shared_ctx.with_containers(
                service.containers.init(Tenancy::Multi),
                service.containers.service(Tenancy::Multi),
            );
        }
        let shared_ctx = Arc::new(shared_ctx);

        let mut tenant_ctxs = Vec::with_capacity(tenant_snapshots.len());
        for (tenant, snapshot) in tenant_snapshots {
            let mut ctx = self
                .context(account, settings, &identity.with_tenant(&tenant), snapshot)?
                .with_policies(single_policies.clone());
            if containers {
                ctx = ctx.with_containers(
                    service.containers.init(Tenancy::Single),
                    service.containers.service(Tenancy::Single),
                );
            }
            tenant_ctxs.push(Arc::new(ctx));
        }

        // Shared scope first: tenant resources may depend on it.
        report.record(shared_ctx.process_config_and_policies(&self.executor)?);
        if containers {
            report.record(shared_ctx.deploy_init_containers()?);
        }

        let mut batch = self.executor.batch("tenant-config");
        for ctx in &tenant_ctxs {
            ctx.submit_config_and_policies(&mut batch);
        }
        report.record(batch.wait_for_all()?.into_iter().map(|(_, item)| item));

        if !containers {
            return Ok(());
        }

        let mut batch = self.executor.batch("tenant-init");
        for ctx in &tenant_ctxs {
            let ctx = Arc::clone(ctx);
            batch.submit(format!("{}/init", ctx.label()), move || {
                ctx.deploy_init_containers()
            });
        }
        report.record(batch.wait_for_all()?.into_iter().flat_map(|(_, items)| items));

        let mut batch = self.executor.batch("service-containers");
        shared_ctx.submit_service_containers(&mut batch);
        for ctx in &tenant_ctxs {
            ctx.submit_service_containers(&mut batch);
        }
        report.record(batch.wait_for_all()?.into_iter().map(|(_, item)| item));
        Ok(())
    }

    /// Run the tenant pipeline for every tenant concurrently.
    fn resolve_tenants(
        &self,
        identity: &Identity,
        tenants: &[String],
        shared: &SharedLayers,
    ) -> Result<Vec<(String, Snapshot)>> {
        let mut batch = self.executor.batch("tenant-resolve");
        for tenant in tenants {
            let resolver = self.resolver.clone();
            let shared = shared.clone();
            let identity = identity.clone();
            let tenant = tenant.clone();
            batch.submit(tenant.clone(), move || {
                resolver.resolve_tenant(&shared, &identity, &tenant)
            });
        }
        batch.wait_for_all()
    }
}

fn log_coordinates(action: Action, identity: &Identity, tenants: &[String]) {
    let absent = "<none>";
    tracing::info!(
        action = %action,
        environment_type = %identity.environment_type,
        environment = identity.environment.as_deref().unwrap_or(absent),
        realm = identity.realm.as_deref().unwrap_or(absent),
        region = identity.region.as_deref().unwrap_or(absent),
        service = %identity.service,
        "run coordinates"
    );
    for (i, tenant) in tenants.iter().enumerate() {
        tracing::info!(index = i, tenant = %tenant, "tenant");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
