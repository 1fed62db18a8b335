//! Overlay pipelines that turn configuration documents into snapshots.
//!
//! The shared pipeline runs once per run:
//!
//! ```text
//! shared = overlay(defaults, environment, overrides, id)
//! ```
//!
//! and the tenant pipeline runs once per tenant, independently:
//!
//! ```text
//! intermediate = overlay(tenant, defaults, environment, overrides, tenant_id)
//! tenant_defaults  = helpers(copy of intermediate)
//! tenant_overrides = helpers(copy of tenant_defaults)
//! final = overlay(tenant_overrides, overrides, tenant_id)
//! ```
//!
//! Tenant overrides start from the tenant defaults, so defaults survive into
//! the final snapshot unless an override replaces them.

use crate::error::{DeployError, Result};
use crate::identity::Identity;
use crate::paths::{self, TENANT_DIR};
use crate::snapshot::{merge_into, overlay, Snapshot};
use crate::source::ConfigSource;
use crate::template::TemplateVariables;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Required in every shared snapshot.
pub const DNS_SUFFIX: &str = "dnsSuffix";

// ---------------------------------------------------------------------------
// ConfigHelper
// ---------------------------------------------------------------------------

/// A collaborator that contributes defaults, overrides and template variables.
///
/// Every hook defaults to doing nothing. Overlay hooks edit a working copy that
/// already holds the identity fragment (shared hooks) or the merged tenant view
/// (tenant hooks).
pub trait ConfigHelper: Send + Sync {
    fn overlay_defaults(&self, _config: &mut Map<String, Value>) -> Result<()> {
        Ok(())
    }

    fn overlay_overrides(&self, _config: &mut Map<String, Value>) -> Result<()> {
        Ok(())
    }

    fn overlay_tenant_defaults(&self, _tenant: &str, _config: &mut Map<String, Value>) -> Result<()> {
        Ok(())
    }

    fn overlay_tenant_overrides(
        &self,
        _tenant: &str,
        _config: &mut Map<String, Value>,
    ) -> Result<()> {
        Ok(())
    }

    fn populate_template_variables(
        &self,
        _config: &Snapshot,
        _vars: &mut TemplateVariables,
    ) -> Result<()> {
        Ok(())
    }
}

/// `key.path=value` pairs applied as shared overrides, so they reach every scope.
#[derive(Debug, Clone, Default)]
pub struct CommandLineOverrides {
    values: Map<String, Value>,
}

impl CommandLineOverrides {
    /// Parse `a.b.c=value` assignments. Values are JSON when they parse as JSON,
    /// otherwise plain strings.
    pub fn parse<I, S>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = Map::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let Some((key, raw)) = assignment.split_once('=') else {
                return Err(DeployError::invalid_config(
                    "--set",
                    format!("expected key=value, got \"{assignment}\""),
                ));
            };
            let parts: Vec<&str> = key.split('.').map(str::trim).collect();
            if parts.iter().any(|p| p.is_empty()) {
                return Err(DeployError::invalid_config(
                    "--set",
                    format!("invalid key \"{key}\""),
                ));
            }
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            merge_into(&mut values, &nest(&parts, value));
        }
        Ok(Self { values })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn nest(parts: &[&str], value: Value) -> Map<String, Value> {
    let mut node = value;
    for part in parts.iter().skip(1).rev() {
        let mut obj = Map::new();
        obj.insert(part.to_string(), node);
        node = Value::Object(obj);
    }
    let mut root = Map::new();
    if let Some(first) = parts.first() {
        root.insert(first.to_string(), node);
    }
    root
}

impl ConfigHelper for CommandLineOverrides {
    fn overlay_overrides(&self, config: &mut Map<String, Value>) -> Result<()> {
        merge_into(config, &self.values);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// The layers of the shared pipeline, kept for the tenant pipeline to reuse.
#[derive(Debug, Clone)]
pub struct SharedLayers {
    pub environment: Snapshot,
    pub defaults: Snapshot,
    pub overrides: Snapshot,
    pub id: Snapshot,
    pub resolved: Snapshot,
}

impl SharedLayers {
    pub fn dns_suffix(&self) -> Result<&str> {
        self.resolved.required_string(DNS_SUFFIX)
    }
}

/// Resolves snapshots from a configuration source and a list of helpers.
/// Cheap to clone; clones share the source and helpers.
#[derive(Clone)]
pub struct ConfigResolver {
    source: Arc<dyn ConfigSource>,
    helpers: Arc<[Arc<dyn ConfigHelper>]>,
}

impl ConfigResolver {
    pub fn new(source: Arc<dyn ConfigSource>, helpers: Vec<Arc<dyn ConfigHelper>>) -> Self {
        Self {
            source,
            helpers: helpers.into(),
        }
    }

    pub fn source(&self) -> &dyn ConfigSource {
        self.source.as_ref()
    }

    pub fn helpers(&self) -> &[Arc<dyn ConfigHelper>] {
        &self.helpers
    }

    /// Cascade defaults → environment type → environment → realm → region.
    pub fn environment_config(&self, identity: &Identity) -> Result<Snapshot> {
        let mut merged = Map::new();
        for level in paths::environment_cascade(identity) {
            match self.source.fetch_document(&level.dir, &level.file) {
                Ok(doc) => {
                    tracing::debug!(path = %paths::join(&level.dir, &level.file), "loaded config");
                    merge_into(&mut merged, &doc);
                }
                Err(DeployError::DocumentNotFound { path }) if !level.required => {
                    tracing::warn!(%path, "no {} config, skipping", level.entity);
                }
                Err(DeployError::DocumentNotFound { path }) => {
                    return Err(DeployError::MissingDocument {
                        entity: level.entity.to_string(),
                        name: level.name,
                        path,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Snapshot::from_map(merged))
    }

    /// Run the shared pipeline for `identity` (its tenant, if any, is ignored).
    pub fn resolve_shared(&self, identity: &Identity) -> Result<SharedLayers> {
        let identity = identity.shared();
        let environment = self.environment_config(&identity)?;
        let id = identity.id_config();

        let mut defaults = id.to_map();
        for helper in self.helpers.iter() {
            helper.overlay_defaults(&mut defaults)?;
        }
        let defaults = Snapshot::from_map(defaults);

        let mut overrides = id.to_map();
        for helper in self.helpers.iter() {
            helper.overlay_overrides(&mut overrides)?;
        }
        let overrides = Snapshot::from_map(overrides);

        let resolved = overlay([&defaults, &environment, &overrides, &id]);
        Ok(SharedLayers {
            environment,
            defaults,
            overrides,
            id,
            resolved,
        })
    }

    /// `config/tenant/<tenant>.json`, which must exist.
    pub fn tenant_config(&self, tenant: &str) -> Result<Snapshot> {
        match self
            .source
            .fetch_snapshot(TENANT_DIR, &paths::json_file(tenant))
        {
            Err(DeployError::DocumentNotFound { path }) => Err(DeployError::MissingDocument {
                entity: "tenant".to_string(),
                name: tenant.to_string(),
                path,
            }),
            other => other,
        }
    }

    /// Run the tenant pipeline for `tenant` on top of the shared layers.
    pub fn resolve_tenant(
        &self,
        shared: &SharedLayers,
        identity: &Identity,
        tenant: &str,
    ) -> Result<Snapshot> {
        let tenant_id = identity.with_tenant(tenant).id_config();
        let tenant_config = self.tenant_config(tenant)?;

        let intermediate = overlay([
            &tenant_config,
            &shared.defaults,
            &shared.environment,
            &shared.overrides,
            &tenant_id,
        ]);

        let mut tenant_defaults = intermediate.to_map();
        for helper in self.helpers.iter() {
            helper.overlay_tenant_defaults(tenant, &mut tenant_defaults)?;
        }

        let mut tenant_overrides = tenant_defaults;
        for helper in self.helpers.iter() {
            helper.overlay_tenant_overrides(tenant, &mut tenant_overrides)?;
        }
        let tenant_overrides = Snapshot::from_map(tenant_overrides);

        Ok(overlay([&tenant_overrides, &shared.overrides, &tenant_id]))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
