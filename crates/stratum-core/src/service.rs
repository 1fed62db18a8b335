use crate::container::{ContainerSet, Tenancy};
use crate::error::{DeployError, Result};
use crate::paths::{self, DOT_JSON, MULTI_TENANT, SINGLE_TENANT};
use crate::snapshot::Snapshot;
use crate::source::ConfigSource;
use std::collections::BTreeMap;

/// Policy name → template text.
pub type Policies = BTreeMap<String, String>;

/// `config/service/<service>/service.json` with its containers partitioned.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub document: Snapshot,
    pub containers: ContainerSet,
}

impl ServiceDescriptor {
    pub fn fetch(source: &dyn ConfigSource, service: &str) -> Result<Self> {
        let dir = paths::service_dir(service);
        let document = match source.fetch_snapshot(&dir, paths::SERVICE_FILE) {
            Ok(doc) => doc,
            Err(DeployError::DocumentNotFound { path }) => {
                return Err(DeployError::MissingDocument {
                    entity: "service".to_string(),
                    name: service.to_string(),
                    path,
                })
            }
            Err(e) => return Err(e),
        };
        let containers = ContainerSet::from_descriptor(document.as_map())?;
        tracing::info!(
            service,
            containers = containers.len(),
            "loaded service descriptor"
        );
        Ok(Self {
            name: service.to_string(),
            document,
            containers,
        })
    }
}

pub fn tenancy_dir(tenancy: Tenancy) -> &'static str {
    match tenancy {
        Tenancy::Single => SINGLE_TENANT,
        Tenancy::Multi => MULTI_TENANT,
    }
}

/// Load every policy template for `service` under the provider's policy tree.
///
/// Every listed file must be a `.json` document; the policy name is the file
/// stem and the template is the document's compact JSON text.
pub fn fetch_policies(
    source: &dyn ConfigSource,
    service: &str,
    provider: &str,
    tenancy: Tenancy,
) -> Result<Policies> {
    let dir = paths::policy_dir(service, provider, tenancy_dir(tenancy));
    let mut policies = Policies::new();
    for file in source.list_files(&dir)? {
        let Some(stem) = file.strip_suffix(DOT_JSON) else {
            return Err(DeployError::invalid_config(
                paths::join(&dir, &file),
                "policy files must have a .json extension",
            ));
        };
        let document = source.fetch_document(&dir, &file)?;
        policies.insert(stem.to_string(), serde_json::to_string(&document)?);
    }
    tracing::debug!(service, %tenancy, count = policies.len(), "loaded policies");
    Ok(policies)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryConfigSource;
    use serde_json::json;

    #[test]
    fn unknown_service_is_a_config_error() {
        let source = MemoryConfigSource::new();
        let err = ServiceDescriptor::fetch(&source, "billing").unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("service \"billing\""), "{err}");
    }

    #[test]
    fn policies_keyed_by_stem() {
        let source = MemoryConfigSource::new()
            .with_document(
                "config/service/billing/local/policy/singleTenant/reader.json",
                json!({"Statement": [{"Resource": "${tenantId}"}]}),
            )
            .with_document(
                "config/service/billing/local/policy/multiTenant/writer.json",
                json!({"Statement": []}),
            );
        let single = fetch_policies(&source, "billing", "local", Tenancy::Single).unwrap();
        assert_eq!(single.len(), 1);
        assert!(single["reader"].contains("${tenantId}"));
        let multi = fetch_policies(&source, "billing", "local", Tenancy::Multi).unwrap();
        assert!(multi.contains_key("writer"));
    }

    #[test]
    fn non_json_policy_file_is_rejected() {
        let mut source = MemoryConfigSource::new();
        source.insert_raw(
            "config/service/billing/local/policy/singleTenant/notes.txt",
            "hello",
        );
        let err = fetch_policies(&source, "billing", "local", Tenancy::Single).unwrap_err();
        assert!(err.to_string().contains("notes.txt"), "{err}");
    }

    #[test]
    fn missing_policy_dir_is_empty() {
        let source = MemoryConfigSource::new();
        let p = fetch_policies(&source, "billing", "local", Tenancy::Multi).unwrap();
        assert!(p.is_empty());
    }
}
