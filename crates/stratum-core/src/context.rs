//! Deployment contexts: one per tenant plus one shared.
//!
//! A context is assembled once from a resolved snapshot and never changes
//! afterwards. Tasks share it through an `Arc`.

use crate::batch::{Batch, BatchExecutor};
use crate::container::ContainerSpec;
use crate::error::Result;
use crate::identity::Identity;
use crate::naming::Name;
use crate::provider::Provider;
use crate::resolver::ConfigHelper;
use crate::service::Policies;
use crate::snapshot::Snapshot;
use crate::template::{self, TemplateVariables};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SHARED_LABEL: &str = "shared";

/// Settings fixed for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    pub primary_environment: bool,
    pub primary_region: bool,
    pub dns_suffix: String,
}

/// Everything a provider call needs to know about the scope it acts on.
#[derive(Debug, Clone)]
pub struct Scope {
    pub identity: Identity,
    pub snapshot: Snapshot,
    pub variables: TemplateVariables,
    pub settings: Arc<RunSettings>,
}

impl Scope {
    pub fn tenant(&self) -> Option<&str> {
        self.identity.tenant.as_deref()
    }

    /// The tenant id, or `shared`.
    pub fn label(&self) -> &str {
        self.tenant().unwrap_or(SHARED_LABEL)
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        self.identity.tags()
    }

    pub fn config_name(&self) -> Name {
        self.identity.config_name()
    }

    pub fn render(&self, template: &str) -> String {
        template::substitute(template, &self.variables)
    }
}

/// Template variables for a scope: provider first, then helpers, then identity.
pub fn template_variables<P: Provider>(
    provider: &P,
    account: &P::Account,
    helpers: &[Arc<dyn ConfigHelper>],
    identity: &Identity,
    snapshot: &Snapshot,
) -> Result<TemplateVariables> {
    let mut vars = TemplateVariables::new();
    provider.populate_template_variables(account, &mut vars)?;
    for helper in helpers {
        helper.populate_template_variables(snapshot, &mut vars)?;
    }
    template::add_identity_variables(&mut vars, identity, snapshot)?;
    Ok(vars)
}

/// One item reconciled by a context, for the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Config(String),
    Role(String),
    InitContainer(String),
    ServiceContainer(String),
}

pub struct DeploymentContext<P: Provider> {
    scope: Scope,
    policies: Policies,
    init_containers: Vec<ContainerSpec>,
    service_containers: Vec<ContainerSpec>,
    provider: Arc<P>,
    account: Arc<P::Account>,
}

impl<P: Provider> DeploymentContext<P> {
    pub fn new(provider: Arc<P>, account: Arc<P::Account>, scope: Scope) -> Self {
        Self {
            scope,
            policies: Policies::new(),
            init_containers: Vec::new(),
            service_containers: Vec::new(),
            provider,
            account,
        }
    }

    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_containers(mut self, init: Vec<ContainerSpec>, service: Vec<ContainerSpec>) -> Self {
        self.init_containers = init;
        self.service_containers = service;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn label(&self) -> &str {
        self.scope.label()
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn init_containers(&self) -> &[ContainerSpec] {
        &self.init_containers
    }

    pub fn service_containers(&self) -> &[ContainerSpec] {
        &self.service_containers
    }

    pub fn create_environment_type(&self) -> Result<()> {
        self.provider
            .create_environment_type(&self.account, &self.scope)
    }

    pub fn create_environment(&self) -> Result<()> {
        self.provider.create_environment(&self.account, &self.scope)
    }

    /// Queue `save_config` and one `process_role` per policy on `batch`.
    pub fn submit_config_and_policies(self: &Arc<Self>, batch: &mut Batch<'_, Reconciled>) {
        let label = self.label().to_string();

        let ctx = Arc::clone(self);
        batch.submit(format!("{label}/config"), move || {
            let document = ctx.scope.snapshot.to_canonical_string()?;
            ctx.provider
                .save_config(&ctx.account, &ctx.scope, &document)?;
            Ok(Reconciled::Config(ctx.scope.config_name().to_string()))
        });

        for (name, template) in &self.policies {
            let ctx = Arc::clone(self);
            let name = name.clone();
            let template = template.clone();
            batch.submit(format!("{label}/role/{name}"), move || {
                let policy = ctx.scope.render(&template);
                ctx.provider
                    .process_role(&ctx.account, &ctx.scope, &name, &policy)?;
                Ok(Reconciled::Role(format!("{}/{name}", ctx.label())))
            });
        }
    }

    /// Save config and process every policy, waiting for all of them.
    pub fn process_config_and_policies(
        self: &Arc<Self>,
        executor: &BatchExecutor,
    ) -> Result<Vec<Reconciled>> {
        let mut batch = executor.batch(format!("{}-config", self.label()));
        self.submit_config_and_policies(&mut batch);
        Ok(batch
            .wait_for_all()?
            .into_iter()
            .map(|(_, item)| item)
            .collect())
    }

    /// Run service-level setup, then each init container in name order.
    pub fn deploy_init_containers(&self) -> Result<Vec<Reconciled>> {
        if self.init_containers.is_empty() && self.service_containers.is_empty() {
            return Ok(Vec::new());
        }
        self.provider.deploy_service(
            &self.account,
            &self.scope,
            !self.service_containers.is_empty(),
        )?;

        let mut deployed = Vec::with_capacity(self.init_containers.len());
        for container in &self.init_containers {
            tracing::info!(scope = %self.label(), container = %container.name, "deploy init container");
            self.provider
                .deploy_init_container(&self.account, &self.scope, container)?;
            deployed.push(Reconciled::InitContainer(format!(
                "{}/{}",
                self.label(),
                container.name
            )));
        }
        Ok(deployed)
    }

    /// Queue one `deploy_service_container` per service container on `batch`.
    pub fn submit_service_containers(self: &Arc<Self>, batch: &mut Batch<'_, Reconciled>) {
        for container in &self.service_containers {
            let ctx = Arc::clone(self);
            let container = container.clone();
            let task = format!("{}/container/{}", self.label(), container.name);
            batch.submit(task, move || {
                ctx.provider
                    .deploy_service_container(&ctx.account, &ctx.scope, &container)?;
                Ok(Reconciled::ServiceContainer(format!(
                    "{}/{}",
                    ctx.label(),
                    container.name
                )))
            });
        }
    }
}
