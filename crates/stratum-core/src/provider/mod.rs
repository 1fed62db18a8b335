//! The reconciliation contract between the orchestrator and a cloud.
//!
//! A provider is chosen at construction. Account validation runs once and
//! yields the provider's `Account` value; that value is then shared read-only
//! with every reconciliation call. Every call must be idempotent: repeating it
//! with the same inputs converges on the same live state.

pub mod local;

pub use local::{LocalAccount, LocalProvider};

use crate::container::ContainerSpec;
use crate::context::Scope;
use crate::error::Result;
use crate::identity::Identity;
use crate::snapshot::Snapshot;
use crate::template::TemplateVariables;

pub trait Provider: Send + Sync + 'static {
    /// Account-level settings read from configuration and confirmed against
    /// live credentials.
    type Account: Send + Sync + 'static;

    /// Names the provider's configuration object and policy directory.
    fn name(&self) -> &str;

    /// Confirm the account named by `config` is the one our credentials reach.
    fn validate_account(&self, config: &Snapshot, identity: &Identity) -> Result<Self::Account>;

    fn populate_template_variables(
        &self,
        _account: &Self::Account,
        _vars: &mut TemplateVariables,
    ) -> Result<()> {
        Ok(())
    }

    fn create_environment_type(&self, account: &Self::Account, scope: &Scope) -> Result<()>;

    fn create_environment(&self, account: &Self::Account, scope: &Scope) -> Result<()>;

    /// Reconcile the role `name` and its policy from resolved policy text.
    fn process_role(
        &self,
        account: &Self::Account,
        scope: &Scope,
        name: &str,
        policy: &str,
    ) -> Result<()>;

    /// Store the scope's resolved configuration, serialized canonically.
    fn save_config(&self, account: &Self::Account, scope: &Scope, document: &str) -> Result<()>;

    /// Service-level network setup, run once per scope before its containers.
    fn deploy_service(
        &self,
        account: &Self::Account,
        scope: &Scope,
        has_service_containers: bool,
    ) -> Result<()>;

    fn deploy_init_container(
        &self,
        account: &Self::Account,
        scope: &Scope,
        container: &ContainerSpec,
    ) -> Result<()>;

    fn deploy_service_container(
        &self,
        account: &Self::Account,
        scope: &Scope,
        container: &ContainerSpec,
    ) -> Result<()>;
}
