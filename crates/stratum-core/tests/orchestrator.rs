use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use stratum_core::container::ContainerSpec;
use stratum_core::context::Scope;
use stratum_core::identity::Identity;
use stratum_core::orchestrator::{resolve, Action, Orchestrator, RunConfig};
use stratum_core::provider::{LocalProvider, Provider};
use stratum_core::snapshot::Snapshot;
use stratum_core::source::{ConfigSource, MemoryConfigSource};
use stratum_core::template::TemplateVariables;
use stratum_core::{DeployError, Result};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Recording provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    CreateEnvironmentType,
    CreateEnvironment,
    ProcessRole { scope: String, name: String, policy: String },
    SaveConfig { scope: String, document: String },
    DeployService { scope: String, has_service_containers: bool },
    DeployInit { scope: String, container: ContainerSpec },
    DeployServiceContainer { scope: String, container: ContainerSpec },
}

#[derive(Default)]
struct RecordingProvider {
    calls: Mutex<Vec<Call>>,
    fail_on: Option<String>,
}

impl RecordingProvider {
    fn failing_on(scope: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(scope.to_string()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

struct Account {
    id: String,
}

impl Provider for RecordingProvider {
    type Account = Account;

    fn name(&self) -> &str {
        "fake"
    }

    fn validate_account(&self, config: &Snapshot, _identity: &Identity) -> Result<Account> {
        let id = config
            .pointer("fake/accountId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DeployError::invalid_config("/fake/accountId", "missing"))?;
        if id != "42" {
            return Err(DeployError::AccountMismatch {
                expected: id.to_string(),
                actual: "42".to_string(),
            });
        }
        Ok(Account { id: id.to_string() })
    }

    fn populate_template_variables(&self, account: &Account, vars: &mut TemplateVariables) -> Result<()> {
        vars.insert("accountId".into(), account.id.clone());
        Ok(())
    }

    fn create_environment_type(&self, _account: &Account, _scope: &Scope) -> Result<()> {
        self.record(Call::CreateEnvironmentType);
        Ok(())
    }

    fn create_environment(&self, _account: &Account, _scope: &Scope) -> Result<()> {
        self.record(Call::CreateEnvironment);
        Ok(())
    }

    fn process_role(&self, _account: &Account, scope: &Scope, name: &str, policy: &str) -> Result<()> {
        self.record(Call::ProcessRole {
            scope: scope.label().to_string(),
            name: name.to_string(),
            policy: policy.to_string(),
        });
        Ok(())
    }

    fn save_config(&self, _account: &Account, scope: &Scope, document: &str) -> Result<()> {
        if self.fail_on.as_deref() == Some(scope.label()) {
            return Err(DeployError::provider("save-config", scope.label(), "access denied"));
        }
        self.record(Call::SaveConfig {
            scope: scope.label().to_string(),
            document: document.to_string(),
        });
        Ok(())
    }

    fn deploy_service(&self, _account: &Account, scope: &Scope, has_service_containers: bool) -> Result<()> {
        self.record(Call::DeployService {
            scope: scope.label().to_string(),
            has_service_containers,
        });
        Ok(())
    }

    fn deploy_init_container(&self, _account: &Account, scope: &Scope, container: &ContainerSpec) -> Result<()> {
        self.record(Call::DeployInit {
            scope: scope.label().to_string(),
            container: container.clone(),
        });
        Ok(())
    }

    fn deploy_service_container(
        &self,
        _account: &Account,
        scope: &Scope,
        container: &ContainerSpec,
    ) -> Result<()> {
        self.record(Call::DeployServiceContainer {
            scope: scope.label().to_string(),
            container: container.clone(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn config_tree() -> MemoryConfigSource {
    MemoryConfigSource::new()
        .with_document("config/defaults.json", json!({"logLevel": "info"}))
        .with_document(
            "config/environment/dev/environmentType.json",
            json!({
                "dnsSuffix": "dev.example.com",
                "fake": {"accountId": "42"},
                "local": {
                    "accountId": "123456789012",
                    "regionName": "us-east-1",
                    "loadBalancerSecurityGroups": ["sg-1"],
                    "loadBalancerSubnets": ["subnet-a"],
                    "environmentTypeRegions": {"us-east-1": {}}
                }
            }),
        )
        .with_document(
            "config/environment/dev/qa1/environment.json",
            json!({"logLevel": "debug"}),
        )
        .with_document("config/tenant/acme.json", json!({"plan": "gold"}))
        .with_document("config/tenant/globex.json", json!({"plan": "silver"}))
        .with_document(
            "config/service/billing/service.json",
            json!({
                "containers": {
                    "migrate": {"tenancy": "SINGLE", "containerType": "INIT", "port": 8080, "paths": ["/a", "/b"]},
                    "api": {"tenancy": "SINGLE", "paths": ["/api"]},
                    "router": {"tenancy": "MULTI", "paths": ["/route"]}
                }
            }),
        )
        .with_document(
            "config/service/billing/fake/policy/singleTenant/reader.json",
            json!({"Statement": [{"Resource": "bucket/${tenantId}/*", "Account": "${accountId}"}]}),
        )
        .with_document(
            "config/service/billing/fake/policy/multiTenant/writer.json",
            json!({"Statement": [{"Resource": "${fullyQualifiedServiceName}"}]}),
        )
        .with_document(
            "config/service/billing/local/policy/singleTenant/reader.json",
            json!({"Statement": [{"Resource": "bucket/${tenantId}/*"}]}),
        )
        .with_document(
            "config/track/main.json",
            json!({"stations": [{"name": "canary", "environmentType": "dev", "environment": "qa1",
                                 "realm": "us", "region": "us-east-1", "tenants": ["acme"]}]}),
        )
        .with_document("config/environment/dev/qa1/us/realm.json", json!({}))
        .with_document("config/environment/dev/qa1/us/us-east-1/region.json", json!({}))
}

fn identity() -> Identity {
    Identity::new("dev", "billing").with_environment("qa1")
}

fn deploy_run() -> RunConfig {
    RunConfig::new(Action::Deploy, identity()).with_tenants(["acme", "globex"])
}

fn run_with(provider: &Arc<RecordingProvider>, run: RunConfig, source: MemoryConfigSource) -> Result<()> {
    let orchestrator = Orchestrator::new(run, Arc::new(source), Arc::clone(provider), vec![])?;
    orchestrator.run().map(|_| ())
}

fn position(calls: &[Call], wanted: impl Fn(&Call) -> bool) -> usize {
    calls
        .iter()
        .position(wanted)
        .unwrap_or_else(|| panic!("call not found in {calls:#?}"))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn deploy_two_tenants() {
    let provider = Arc::new(RecordingProvider::default());
    run_with(&provider, deploy_run(), config_tree()).unwrap();
    let calls = provider.calls();

    let configs: BTreeMap<String, serde_json::Value> = calls
        .iter()
        .filter_map(|c| match c {
            Call::SaveConfig { scope, document } => {
                Some((scope.clone(), serde_json::from_str(document).unwrap()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(configs.len(), 3);
    assert_eq!(configs["acme"]["dnsSuffix"], "dev.example.com");
    assert_eq!(configs["globex"]["dnsSuffix"], "dev.example.com");
    assert_eq!(configs["acme"]["id"]["tenantId"], "acme");
    assert_eq!(configs["globex"]["id"]["tenantId"], "globex");
    assert_eq!(configs["acme"]["plan"], "gold");
    assert_eq!(configs["acme"]["logLevel"], "debug");
    assert!(configs["shared"]["id"].get("tenantId").is_none());

    let service_calls: Vec<(String, String)> = calls
        .iter()
        .filter_map(|c| match c {
            Call::DeployServiceContainer { scope, container } => {
                Some((scope.clone(), container.name.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(service_calls.len(), 3);
    for expected in [("acme", "api"), ("globex", "api"), ("shared", "router")] {
        let count = service_calls
            .iter()
            .filter(|(s, n)| s == expected.0 && n == expected.1)
            .count();
        assert_eq!(count, 1, "{expected:?} in {service_calls:?}");
    }
}

#[test]
fn policies_are_rendered_per_scope() {
    let provider = Arc::new(RecordingProvider::default());
    run_with(&provider, deploy_run(), config_tree()).unwrap();

    let roles: Vec<(String, String, String)> = provider
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::ProcessRole { scope, name, policy } => Some((scope, name, policy)),
            _ => None,
        })
        .collect();
    assert_eq!(roles.len(), 3);

    let acme = roles.iter().find(|(s, _, _)| s == "acme").unwrap();
    assert_eq!(acme.1, "reader");
    assert!(acme.2.contains("bucket/acme/*"), "{}", acme.2);
    assert!(acme.2.contains("\"42\""), "{}", acme.2);

    let shared = roles.iter().find(|(s, _, _)| s == "shared").unwrap();
    assert_eq!(shared.1, "writer");
    assert!(shared.2.contains("dev-qa1-billing"), "{}", shared.2);
}

#[test]
fn init_container_precedes_service_containers() {
    let provider = Arc::new(RecordingProvider::default());
    run_with(&provider, deploy_run(), config_tree()).unwrap();
    let calls = provider.calls();

    for tenant in ["acme", "globex"] {
        let init = position(&calls, |c| {
            matches!(c, Call::DeployInit { scope, .. } if scope == tenant)
        });
        let Call::DeployInit { container, .. } = &calls[init] else {
            unreachable!()
        };
        assert_eq!(container.port, 8080);
        assert_eq!(container.paths, vec!["/a", "/b"]);
        assert_eq!(container.health_check_path, "/HealthCheck");

        let service = position(&calls, |c| {
            matches!(c, Call::DeployService { scope, .. } if scope == tenant)
        });
        let first_container = position(&calls, |c| {
            matches!(c, Call::DeployServiceContainer { scope, .. } if scope == tenant)
        });
        assert!(service < init);
        assert!(init < first_container);
    }
}

#[test]
fn shared_phase_completes_before_tenant_init() {
    let provider = Arc::new(RecordingProvider::default());
    run_with(&provider, deploy_run(), config_tree()).unwrap();
    let calls = provider.calls();

    let shared_service = position(&calls, |c| {
        matches!(c, Call::DeployService { scope, .. } if scope == "shared")
    });
    let shared_config = position(&calls, |c| {
        matches!(c, Call::SaveConfig { scope, .. } if scope == "shared")
    });
    let first_tenant_init = position(&calls, |c| {
        matches!(c, Call::DeployInit { scope, .. } if scope != "shared")
    });
    let first_service_container = position(&calls, |c| {
        matches!(c, Call::DeployServiceContainer { .. })
    });
    let last_init = calls
        .iter()
        .rposition(|c| matches!(c, Call::DeployInit { .. }))
        .unwrap();

    assert!(shared_config < shared_service);
    assert!(shared_service < first_tenant_init);
    assert!(last_init < first_service_container);
}

#[test]
fn deploy_config_skips_containers() {
    let provider = Arc::new(RecordingProvider::default());
    let run = RunConfig::new(Action::DeployConfig, identity()).with_tenants(["acme"]);
    run_with(&provider, run, config_tree()).unwrap();
    let calls = provider.calls();
    assert!(calls.iter().all(|c| matches!(
        c,
        Call::SaveConfig { .. } | Call::ProcessRole { .. }
    )));
    assert_eq!(calls.len(), 4);
}

#[test]
fn create_environment_actions_touch_shared_scope_only() {
    let provider = Arc::new(RecordingProvider::default());
    let run = RunConfig::new(Action::CreateEnvironmentType, identity()).with_tenants(["acme"]);
    run_with(&provider, run, config_tree()).unwrap();
    assert_eq!(provider.calls(), vec![Call::CreateEnvironmentType]);

    let provider = Arc::new(RecordingProvider::default());
    let run = RunConfig::new(Action::CreateEnvironment, identity());
    run_with(&provider, run, config_tree()).unwrap();
    assert_eq!(provider.calls(), vec![Call::CreateEnvironment]);
}

#[test]
fn missing_environment_type_makes_no_provider_calls() {
    let provider = Arc::new(RecordingProvider::default());
    let run = RunConfig::new(Action::Deploy, Identity::new("prod", "billing")).with_tenants(["acme"]);
    let err = run_with(&provider, run, config_tree()).unwrap_err();
    assert!(err.is_config_error(), "{err}");
    assert!(provider.calls().is_empty());
}

#[test]
fn missing_tenant_config_makes_no_provider_calls() {
    let provider = Arc::new(RecordingProvider::default());
    let run = RunConfig::new(Action::Deploy, identity()).with_tenants(["acme", "initech"]);
    let err = run_with(&provider, run, config_tree()).unwrap_err();
    assert!(err.to_string().contains("initech"), "{err}");
    assert!(provider.calls().is_empty());
}

#[test]
fn case_colliding_tenants_make_no_provider_calls() {
    let provider = Arc::new(RecordingProvider::default());
    let run = RunConfig::new(Action::Deploy, identity()).with_tenants(["acme", "Acme"]);
    let err = run_with(&provider, run, config_tree()).unwrap_err();
    assert!(err.is_config_error(), "{err}");
    assert!(provider.calls().is_empty());
}

#[test]
fn station_tenant_colliding_with_requested_tenant_is_rejected() {
    let provider = Arc::new(RecordingProvider::default());
    let run = RunConfig::new(Action::DeployStation, Identity::new("prod", "billing"))
        .with_tenants(["ACME"])
        .with_station("main", "canary");
    let err = run_with(&provider, run, config_tree()).unwrap_err();
    assert!(err.is_config_error(), "{err}");
    assert!(err.to_string().contains("\"ACME\" and \"acme\""), "{err}");
    assert!(provider.calls().is_empty());
}

#[test]
fn shared_tenant_makes_no_provider_calls() {
    let provider = Arc::new(RecordingProvider::default());
    let source = config_tree().with_document("config/tenant/shared.json", json!({}));
    let run = RunConfig::new(Action::Deploy, identity()).with_tenants(["shared"]);
    let err = run_with(&provider, run, source).unwrap_err();
    assert!(err.is_config_error(), "{err}");
    assert!(provider.calls().is_empty());
}

#[test]
fn account_mismatch_makes_no_provider_calls() {
    let mut source = config_tree();
    source.insert(
        "config/environment/dev/qa1/environment.json",
        json!({"fake": {"accountId": "7"}}),
    );
    let provider = Arc::new(RecordingProvider::default());
    let err = run_with(&provider, deploy_run(), source).unwrap_err();
    assert!(matches!(err, DeployError::AccountMismatch { .. }));
    assert!(provider.calls().is_empty());
}

#[test]
fn missing_dns_suffix_is_a_config_error() {
    let mut source = config_tree();
    source.insert(
        "config/environment/dev/environmentType.json",
        json!({"fake": {"accountId": "42"}}),
    );
    let provider = Arc::new(RecordingProvider::default());
    let err = run_with(&provider, deploy_run(), source).unwrap_err();
    assert!(err.to_string().contains("dnsSuffix"), "{err}");
    assert!(provider.calls().is_empty());
}

#[test]
fn batch_failure_is_surfaced_and_later_phases_do_not_run() {
    let provider = Arc::new(RecordingProvider::failing_on("globex"));
    let err = run_with(&provider, deploy_run(), config_tree()).unwrap_err();
    match &err {
        DeployError::Batch { batch, failures } => {
            assert_eq!(batch, "tenant-config");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].task, "globex/config");
        }
        other => panic!("expected a batch failure, got {other}"),
    }
    let calls = provider.calls();
    // the sibling tenant still finished
    assert!(calls
        .iter()
        .any(|c| matches!(c, Call::SaveConfig { scope, .. } if scope == "acme")));
    assert!(!calls
        .iter()
        .any(|c| matches!(c, Call::DeployServiceContainer { .. })));
}

#[test]
fn deploy_station_uses_station_coordinates() {
    let provider = Arc::new(RecordingProvider::default());
    let run = RunConfig::new(Action::DeployStation, Identity::new("prod", "billing"))
        .with_station("main", "canary");
    let orchestrator =
        Orchestrator::new(run, Arc::new(config_tree()), Arc::clone(&provider), vec![]).unwrap();
    let report = orchestrator.run().unwrap();
    assert_eq!(report.tenants, vec!["acme"]);
    assert_eq!(report.identity.region.as_deref(), Some("us-east-1"));
    assert_eq!(report.service_containers.len(), 2);
}

#[test]
fn resolve_is_read_only() {
    let resolved = resolve(&deploy_run(), Arc::new(config_tree()), vec![]).unwrap();
    assert_eq!(resolved.shared.string("dnsSuffix"), Some("dev.example.com"));
    assert_eq!(resolved.tenants.len(), 2);
    assert_eq!(
        resolved.tenants["globex"].pointer("id/tenantId"),
        Some(&json!("globex"))
    );
}

// ---------------------------------------------------------------------------
// Idempotence against the file-backed provider
// ---------------------------------------------------------------------------

fn snapshot_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().display().to_string();
                files.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

fn local_run(state: &Path, source: &Arc<dyn ConfigSource>) -> stratum_core::orchestrator::DeployReport {
    let provider = Arc::new(LocalProvider::new(state, "123456789012"));
    let run = deploy_run().with_primary(true, true);
    Orchestrator::new(run, Arc::clone(source), provider, vec![])
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn repeated_deploy_is_idempotent() {
    let state = TempDir::new().unwrap();
    let source: Arc<dyn ConfigSource> = Arc::new(config_tree());

    let first_report = local_run(state.path(), &source);
    let first = snapshot_tree(state.path());
    let second_report = local_run(state.path(), &source);
    let second = snapshot_tree(state.path());

    assert_eq!(first, second);
    assert_eq!(first_report.service_containers, second_report.service_containers);
    assert!(first.keys().any(|k| k.starts_with("policies/")));
    assert!(first.keys().any(|k| k.starts_with("listeners/")));
    assert!(first.keys().any(|k| k.contains("config/dev-qa1-acme-billing.json")));
}

#[test]
fn changed_policy_adds_one_version() {
    let state = TempDir::new().unwrap();
    let source: Arc<dyn ConfigSource> = Arc::new(config_tree());
    local_run(state.path(), &source);

    let mut changed = config_tree();
    changed.insert(
        "config/service/billing/local/policy/singleTenant/reader.json",
        json!({"Statement": [{"Resource": "bucket/${tenantId}/private/*"}]}),
    );
    let changed: Arc<dyn ConfigSource> = Arc::new(changed);
    local_run(state.path(), &changed);
    local_run(state.path(), &changed);

    let provider = LocalProvider::new(state.path(), "123456789012");
    let policy = provider
        .policy("dev-qa1-acme-billing-reader-policy")
        .unwrap()
        .unwrap();
    assert_eq!(policy.versions.len(), 2);
    assert_eq!(policy.default_version, 2);
}
