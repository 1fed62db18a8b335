//! A provider that keeps its "cloud" as JSON records under a state directory.
//!
//! Every operation reads the current record, compares it with the desired
//! state and writes only when they differ, so repeated runs leave the state
//! directory byte-for-byte unchanged.
//!
//! ```text
//! <state>/policies/<name>.json          policy with retained versions
//! <state>/roles/<name>.json             role and its attached policies
//! <state>/buckets/<bucket>.json         config bucket
//! <state>/buckets/<bucket>/config/*.json saved configuration
//! <state>/load-balancers/<name>.json
//! <state>/target-groups/<name>.json
//! <state>/listeners/<load-balancer>.json listener and its path rules
//! <state>/services/<name>.json
//! <state>/tasks/<name>.json             init container runs
//! <state>/dns/<host>.json
//! ```

use super::Provider;
use crate::container::{ContainerSpec, DEFAULT_HEALTH_CHECK_PATH, DEFAULT_PORT, DEFAULT_TARGET_GROUP};
use crate::context::Scope;
use crate::error::{DeployError, Result};
use crate::identity::{Identity, TAG_ENVIRONMENT, TAG_ENVIRONMENT_TYPE};
use crate::io;
use crate::naming::{Name, RESOURCE_PREFIX};
use crate::snapshot::{required_object, required_str, required_string_array, Snapshot};
use crate::template::{self, TemplateVariables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_NAME: &str = "local";

/// Versions kept per policy, including the default.
pub const MAX_POLICY_VERSIONS: usize = 5;
/// Listener rules for service paths start at this priority.
pub const MIN_RULE_PRIORITY: u32 = 1000;
pub const HTTPS_PORT: u16 = 443;
/// Load balancer and target group names are capped at this length.
pub const MAX_LB_NAME: usize = 32;

const POLICIES: &str = "policies";
const ROLES: &str = "roles";
const BUCKETS: &str = "buckets";
const LOAD_BALANCERS: &str = "load-balancers";
const TARGET_GROUPS: &str = "target-groups";
const LISTENERS: &str = "listeners";
const SERVICES: &str = "services";
const TASKS: &str = "tasks";
const DNS: &str = "dns";

const ENVIRONMENT_TYPE_ROLES: [&str; 3] = ["admin", "support", "cicd"];

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Account settings from the provider's configuration object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAccount {
    pub account_id: String,
    pub region_name: String,
    pub cluster_name: String,
    pub certificate: Option<String>,
    pub load_balancer_security_groups: Vec<String>,
    pub load_balancer_subnets: Vec<String>,
    /// Region → config bucket, for every region of the environment type.
    pub config_buckets: BTreeMap<String, String>,
}

impl LocalAccount {
    pub fn config_bucket(&self) -> &str {
        self.config_buckets
            .get(&self.region_name)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

pub fn default_config_bucket(environment_type: &str, region: &str) -> String {
    format!("{RESOURCE_PREFIX}{environment_type}-{region}-config")
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyVersion {
    pub version: u32,
    pub document: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub name: String,
    pub default_version: u32,
    pub versions: Vec<PolicyVersion>,
    pub tags: BTreeMap<String, String>,
}

impl PolicyRecord {
    pub fn default_document(&self) -> Option<&str> {
        self.versions
            .iter()
            .find(|v| v.version == self.default_version)
            .map(|v| v.document.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub name: String,
    pub attached_policies: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub name: String,
    pub region: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerRecord {
    pub name: String,
    pub dns_name: String,
    pub security_groups: Vec<String>,
    pub subnets: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGroupRecord {
    pub name: String,
    pub port: u16,
    pub health_check_path: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerRule {
    pub priority: u32,
    pub path: String,
    pub target_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerRecord {
    pub load_balancer: String,
    pub port: u16,
    pub certificate: Option<String>,
    pub default_target_group: String,
    pub rules: Vec<ListenerRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub cluster: String,
    pub container: String,
    pub target_group: String,
    pub port: u16,
    pub paths: Vec<String>,
    pub health_check_path: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub cluster: String,
    pub container: String,
    pub port: u16,
    pub paths: Vec<String>,
    pub health_check_path: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub name: String,
    pub target: String,
}

// ---------------------------------------------------------------------------
// LocalProvider
// ---------------------------------------------------------------------------

pub struct LocalProvider {
    name: String,
    state_dir: PathBuf,
    account_id: String,
    // Listener rules are edited by concurrent service-container tasks.
    listener_lock: Mutex<()>,
}

impl LocalProvider {
    /// `account_id` plays the role of the live credentials.
    pub fn new(state_dir: impl Into<PathBuf>, account_id: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            state_dir: state_dir.into(),
            account_id: account_id.into(),
            listener_lock: Mutex::new(()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn record_path(&self, kind: &str, name: &str) -> PathBuf {
        self.state_dir.join(kind).join(format!("{name}.json"))
    }

    pub fn config_path(&self, bucket: &str, config_name: &str) -> PathBuf {
        self.state_dir
            .join(BUCKETS)
            .join(bucket)
            .join("config")
            .join(format!("{config_name}.json"))
    }

    pub fn policy(&self, name: &str) -> Result<Option<PolicyRecord>> {
        io::read_json(&self.record_path(POLICIES, name))
    }

    pub fn role(&self, name: &str) -> Result<Option<RoleRecord>> {
        io::read_json(&self.record_path(ROLES, name))
    }

    pub fn listener(&self, load_balancer: &str) -> Result<Option<ListenerRecord>> {
        io::read_json(&self.record_path(LISTENERS, load_balancer))
    }

    pub fn target_group(&self, name: &str) -> Result<Option<TargetGroupRecord>> {
        io::read_json(&self.record_path(TARGET_GROUPS, name))
    }

    pub fn dns_record(&self, name: &str) -> Result<Option<DnsRecord>> {
        io::read_json(&self.record_path(DNS, name))
    }

    // -- policies and roles --------------------------------------------------

    /// Make `document` the default version of policy `name`.
    fn ensure_policy(&self, name: &str, document: &str, tags: &BTreeMap<String, String>) -> Result<()> {
        let canonical = template::canonicalize(document).map_err(|e| {
            DeployError::invalid_config(format!("policy {name}"), format!("not valid JSON: {e}"))
        })?;
        let path = self.record_path(POLICIES, name);

        let Some(mut record) = io::read_json::<PolicyRecord>(&path)? else {
            tracing::info!(policy = %name, "create policy");
            let record = PolicyRecord {
                name: name.to_string(),
                default_version: 1,
                versions: vec![PolicyVersion {
                    version: 1,
                    document: canonical,
                    created_at: Utc::now(),
                }],
                tags: tags.clone(),
            };
            io::write_json(&path, &record)?;
            return Ok(());
        };

        let unchanged = record
            .default_document()
            .is_some_and(|current| template::documents_equal(current, &canonical));
        if unchanged {
            tracing::debug!(policy = %name, "policy unchanged");
        } else {
            if record.versions.len() >= MAX_POLICY_VERSIONS {
                let default = record.default_version;
                if let Some(oldest) = record
                    .versions
                    .iter()
                    .filter(|v| v.version != default)
                    .map(|v| v.version)
                    .min()
                {
                    tracing::debug!(policy = %name, version = oldest, "delete policy version");
                    record.versions.retain(|v| v.version != oldest);
                }
            }
            let next = record.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;
            tracing::info!(policy = %name, version = next, "update policy");
            record.versions.push(PolicyVersion {
                version: next,
                document: canonical,
                created_at: Utc::now(),
            });
            record.default_version = next;
        }
        record.tags = tags.clone();
        io::write_json(&path, &record)?;
        Ok(())
    }

    /// Create role `name` if missing and attach `policy` if not attached.
    fn ensure_role(&self, name: &str, policy: &str, tags: &BTreeMap<String, String>) -> Result<()> {
        let path = self.record_path(ROLES, name);
        let mut record = match io::read_json::<RoleRecord>(&path)? {
            Some(record) => record,
            None => {
                tracing::info!(role = %name, "create role");
                RoleRecord {
                    name: name.to_string(),
                    attached_policies: Vec::new(),
                    tags: tags.clone(),
                }
            }
        };
        if !record.attached_policies.iter().any(|p| p == policy) {
            tracing::info!(role = %name, policy, "attach policy");
            record.attached_policies.push(policy.to_string());
            record.attached_policies.sort();
        }
        record.tags = tags.clone();
        io::write_json(&path, &record)?;
        Ok(())
    }

    fn ensure_policy_and_role(
        &self,
        base: &Name,
        document: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        let policy = format!("{base}-policy");
        let role = format!("{base}-role");
        self.ensure_policy(&policy, document, tags)?;
        self.ensure_role(&role, &policy, tags)
    }

    // -- network -------------------------------------------------------------

    fn ensure_load_balancer(
        &self,
        name: &str,
        account: &LocalAccount,
        tags: &BTreeMap<String, String>,
    ) -> Result<LoadBalancerRecord> {
        let path = self.record_path(LOAD_BALANCERS, name);
        let desired = LoadBalancerRecord {
            name: name.to_string(),
            dns_name: format!("{name}.{}.elb.local", account.region_name),
            security_groups: account.load_balancer_security_groups.clone(),
            subnets: account.load_balancer_subnets.clone(),
            tags: tags.clone(),
        };
        match io::read_json::<LoadBalancerRecord>(&path)? {
            None => tracing::info!(load_balancer = %name, "create load balancer"),
            Some(existing) if existing == desired => {
                tracing::debug!(load_balancer = %name, "load balancer unchanged");
                return Ok(existing);
            }
            Some(_) => tracing::info!(load_balancer = %name, "update load balancer"),
        }
        io::write_json(&path, &desired)?;
        Ok(desired)
    }

    fn ensure_target_group(
        &self,
        name: &str,
        port: u16,
        health_check_path: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        let desired = TargetGroupRecord {
            name: name.to_string(),
            port,
            health_check_path: health_check_path.to_string(),
            tags: tags.clone(),
        };
        let path = self.record_path(TARGET_GROUPS, name);
        match io::read_json::<TargetGroupRecord>(&path)? {
            Some(existing) if existing == desired => return Ok(()),
            Some(_) => tracing::info!(target_group = %name, "update target group"),
            None => tracing::info!(target_group = %name, "create target group"),
        }
        io::write_json(&path, &desired)?;
        Ok(())
    }

    fn ensure_listener(
        &self,
        load_balancer: &str,
        default_target_group: &str,
        certificate: Option<&str>,
    ) -> Result<()> {
        let _guard = self.lock_listeners()?;
        let path = self.record_path(LISTENERS, load_balancer);
        let listener = match io::read_json::<ListenerRecord>(&path)? {
            Some(mut existing) => {
                existing.port = HTTPS_PORT;
                existing.certificate = certificate.map(str::to_string);
                existing.default_target_group = default_target_group.to_string();
                existing
            }
            None => {
                tracing::info!(load_balancer, "create listener");
                ListenerRecord {
                    load_balancer: load_balancer.to_string(),
                    port: HTTPS_PORT,
                    certificate: certificate.map(str::to_string),
                    default_target_group: default_target_group.to_string(),
                    rules: Vec::new(),
                }
            }
        };
        io::write_json(&path, &listener)?;
        Ok(())
    }

    /// Point every path of `paths` at `target_group`: stale rules for this
    /// target group are deleted, misdirected rules are retargeted, and missing
    /// rules are added at the next free priority.
    fn configure_network_rules(
        &self,
        load_balancer: &str,
        target_group: &str,
        paths: &[String],
    ) -> Result<()> {
        let _guard = self.lock_listeners()?;
        let path = self.record_path(LISTENERS, load_balancer);
        let Some(mut listener) = io::read_json::<ListenerRecord>(&path)? else {
            return Err(DeployError::provider(
                "configure-network-rules",
                load_balancer,
                "listener does not exist; service setup has not run",
            ));
        };

        listener.rules.retain(|rule| {
            let stale = rule.target_group == target_group && !paths.contains(&rule.path);
            if stale {
                tracing::info!(load_balancer, path = %rule.path, "delete listener rule");
            }
            !stale
        });

        for wanted in paths {
            if let Some(rule) = listener.rules.iter_mut().find(|r| &r.path == wanted) {
                if rule.target_group != target_group {
                    tracing::info!(load_balancer, path = %wanted, target_group, "retarget listener rule");
                    rule.target_group = target_group.to_string();
                }
                continue;
            }
            let priority = listener
                .rules
                .iter()
                .map(|r| r.priority + 1)
                .max()
                .unwrap_or(MIN_RULE_PRIORITY)
                .max(MIN_RULE_PRIORITY);
            tracing::info!(load_balancer, path = %wanted, priority, "create listener rule");
            listener.rules.push(ListenerRule {
                priority,
                path: wanted.clone(),
                target_group: target_group.to_string(),
            });
        }

        listener.rules.sort_by_key(|r| r.priority);
        io::write_json(&path, &listener)?;
        Ok(())
    }

    fn lock_listeners(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.listener_lock
            .lock()
            .map_err(|_| DeployError::provider("lock", "listeners", "listener lock poisoned"))
    }

    // -- DNS -------------------------------------------------------------------

    /// The regional host always points at the load balancer; in the primary
    /// environment the service host points at the regional host.
    fn ensure_host_records(&self, account: &LocalAccount, scope: &Scope, lb: &str) -> Result<()> {
        let suffix = &scope.settings.dns_suffix;
        if suffix.is_empty() {
            return Ok(());
        }
        let identity = &scope.identity;
        let region = identity.region.as_deref().unwrap_or(account.region_name.as_str());
        let regional = Name::new([
            Some(identity.environment_type.as_str()),
            identity.environment.as_deref(),
            Some(region),
            scope.tenant(),
            Some(identity.service.as_str()),
        ]);
        let regional_host = format!("{regional}.{suffix}");
        self.ensure_dns_record(&regional_host, &format!("{lb}.{}.elb.local", account.region_name))?;

        if scope.settings.primary_environment {
            let host = Name::new([scope.tenant(), Some(identity.service.as_str())]);
            self.ensure_dns_record(&format!("{host}.{suffix}"), &regional_host)?;
        }
        Ok(())
    }

    fn ensure_dns_record(&self, name: &str, target: &str) -> Result<()> {
        let record = DnsRecord {
            name: name.to_string(),
            target: target.to_string(),
        };
        if io::write_json(&self.record_path(DNS, name), &record)? {
            tracing::info!(dns = %name, target = %target, "reconciled DNS record");
        }
        Ok(())
    }

    fn load_balancer_name(identity: &Identity) -> String {
        identity.resource_name().short_name(MAX_LB_NAME)
    }

    fn require_environment(identity: &Identity) -> Result<&str> {
        identity
            .environment
            .as_deref()
            .ok_or_else(|| DeployError::MissingParameter("environment".to_string()))
    }
}

fn role_document(environment_type: &str, role: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": format!("{role}:*"),
            "Resource": format!("arn:stratum:{environment_type}:*"),
        }]
    })
    .to_string()
}

impl Provider for LocalProvider {
    type Account = LocalAccount;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate_account(&self, config: &Snapshot, identity: &Identity) -> Result<LocalAccount> {
        let parent = format!("/{}", self.name);
        let node = config.required_object(&self.name)?;

        let account_id = required_str(node, "accountId", &parent)?.to_string();
        if account_id != self.account_id {
            return Err(DeployError::AccountMismatch {
                expected: account_id,
                actual: self.account_id.clone(),
            });
        }

        let region_name = required_str(node, "regionName", &parent)?.to_string();
        let cluster_name = match node.get("clusterName") {
            Some(Value::String(s)) => s.clone(),
            _ => Name::new([
                Some(identity.environment_type.as_str()),
                identity.environment.as_deref(),
            ])
            .to_string(),
        };
        let certificate = node
            .get("certificate")
            .and_then(Value::as_str)
            .map(str::to_string);

        let regions_parent = format!("{parent}/environmentTypeRegions");
        let mut config_buckets = BTreeMap::new();
        for (region, settings) in required_object(node, "environmentTypeRegions", &parent)? {
            let bucket = match settings.get("configBucket") {
                Some(Value::String(b)) => b.clone(),
                Some(_) => {
                    return Err(DeployError::invalid_config(
                        format!("{regions_parent}/{region}/configBucket"),
                        "expected a string",
                    ))
                }
                None => default_config_bucket(&identity.environment_type, region),
            };
            config_buckets.insert(region.clone(), bucket);
        }
        config_buckets
            .entry(region_name.clone())
            .or_insert_with(|| default_config_bucket(&identity.environment_type, &region_name));

        let account = LocalAccount {
            account_id,
            region_name,
            cluster_name,
            certificate,
            load_balancer_security_groups: required_string_array(
                node,
                "loadBalancerSecurityGroups",
                &parent,
            )?,
            load_balancer_subnets: required_string_array(node, "loadBalancerSubnets", &parent)?,
            config_buckets,
        };
        tracing::info!(account = %account.account_id, region = %account.region_name, "account validated");
        Ok(account)
    }

    fn populate_template_variables(
        &self,
        account: &LocalAccount,
        vars: &mut TemplateVariables,
    ) -> Result<()> {
        vars.insert("accountId".to_string(), account.account_id.clone());
        vars.insert("regionName".to_string(), account.region_name.clone());
        vars.insert("configBucket".to_string(), account.config_bucket().to_string());
        Ok(())
    }

    fn create_environment_type(&self, account: &LocalAccount, scope: &Scope) -> Result<()> {
        let env_type = &scope.identity.environment_type;
        let type_tags: BTreeMap<String, String> = scope
            .tags()
            .into_iter()
            .filter(|(k, _)| k == TAG_ENVIRONMENT_TYPE)
            .collect();
        tracing::debug!(environment_type = %env_type, "create environment type");

        for role in ENVIRONMENT_TYPE_ROLES {
            let base = Name::new([Some(format!("{RESOURCE_PREFIX}{env_type}")), Some(role.to_string())]);
            self.ensure_policy_and_role(&base, &role_document(env_type, role), &type_tags)?;
        }

        for (region, bucket) in &account.config_buckets {
            let desired = BucketRecord {
                name: bucket.clone(),
                region: region.clone(),
                tags: type_tags.clone(),
            };
            let path = self.record_path(BUCKETS, bucket);
            if io::write_json(&path, &desired)? {
                tracing::info!(bucket = %bucket, region = %region, "reconciled config bucket");
            }
        }
        Ok(())
    }

    fn create_environment(&self, _account: &LocalAccount, scope: &Scope) -> Result<()> {
        let environment = Self::require_environment(&scope.identity)?;
        let env_type = &scope.identity.environment_type;
        let base = Name::new([Some(env_type.as_str()), Some(environment), Some("admin")]);
        let tags: BTreeMap<String, String> = scope
            .tags()
            .into_iter()
            .filter(|(k, _)| {
                k == TAG_ENVIRONMENT_TYPE || k == TAG_ENVIRONMENT
            })
            .collect();
        self.ensure_policy_and_role(&base, &role_document(env_type, "admin"), &tags)
    }

    fn process_role(
        &self,
        _account: &LocalAccount,
        scope: &Scope,
        name: &str,
        policy: &str,
    ) -> Result<()> {
        let base = scope.identity.resource_name().child(name);
        self.ensure_policy_and_role(&base, policy, &scope.tags())
    }

    fn save_config(&self, account: &LocalAccount, scope: &Scope, document: &str) -> Result<()> {
        let config_name = scope.config_name().to_string();
        let path = self.config_path(account.config_bucket(), &config_name);
        if io::write_if_changed(&path, document.as_bytes())? {
            tracing::info!(config = %config_name, bucket = %account.config_bucket(), "saved config");
        } else {
            tracing::debug!(config = %config_name, "config unchanged");
        }
        Ok(())
    }

    fn deploy_service(
        &self,
        account: &LocalAccount,
        scope: &Scope,
        has_service_containers: bool,
    ) -> Result<()> {
        if !has_service_containers {
            tracing::debug!(scope = %scope.label(), "no service containers, no load balancer");
            return Ok(());
        }
        let tags = scope.tags();
        let lb = Self::load_balancer_name(&scope.identity);
        self.ensure_load_balancer(&lb, account, &tags)?;

        let default_tg = scope
            .identity
            .resource_name()
            .child(DEFAULT_TARGET_GROUP)
            .short_name(MAX_LB_NAME);
        self.ensure_target_group(&default_tg, DEFAULT_PORT, DEFAULT_HEALTH_CHECK_PATH, &tags)?;
        self.ensure_listener(&lb, &default_tg, account.certificate.as_deref())
    }

    fn deploy_init_container(
        &self,
        account: &LocalAccount,
        scope: &Scope,
        container: &ContainerSpec,
    ) -> Result<()> {
        let name = scope.identity.resource_name().child(&container.name).to_string();
        let record = TaskRecord {
            name: name.clone(),
            cluster: account.cluster_name.clone(),
            container: container.name.clone(),
            port: container.port,
            paths: container.paths.clone(),
            health_check_path: container.health_check_path.clone(),
            tags: scope.tags(),
        };
        if io::write_json(&self.record_path(TASKS, &name), &record)? {
            tracing::info!(task = %name, "registered init task");
        }
        Ok(())
    }

    fn deploy_service_container(
        &self,
        account: &LocalAccount,
        scope: &Scope,
        container: &ContainerSpec,
    ) -> Result<()> {
        let tags = scope.tags();
        let base = scope.identity.resource_name().child(&container.name);
        let target_group = base.short_name(MAX_LB_NAME);
        self.ensure_target_group(&target_group, container.port, &container.health_check_path, &tags)?;

        let lb = Self::load_balancer_name(&scope.identity);
        self.configure_network_rules(&lb, &target_group, &container.paths)?;

        self.ensure_host_records(account, scope, &lb)?;

        let name = base.to_string();
        let record = ServiceRecord {
            name: name.clone(),
            cluster: account.cluster_name.clone(),
            container: container.name.clone(),
            target_group,
            port: container.port,
            paths: container.paths.clone(),
            health_check_path: container.health_check_path.clone(),
            tags,
        };
        if io::write_json(&self.record_path(SERVICES, &name), &record)? {
            tracing::info!(service = %name, "reconciled service");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
