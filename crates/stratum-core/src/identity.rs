//! Identity coordinates of a deployable unit.
//!
//! An [`Identity`] names the position of a deployment in the hierarchy
//! environment type → environment → realm → region → tenant → service. An
//! absent tenant means the shared, multi-tenant scope.

use crate::error::Result;
use crate::naming::{validate_token, Name};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const ID: &str = "id";

pub const TAG_ENVIRONMENT_TYPE: &str = "STRATUM_ENVIRONMENT_TYPE";
pub const TAG_ENVIRONMENT: &str = "STRATUM_ENVIRONMENT";
pub const TAG_REALM: &str = "STRATUM_REALM";
pub const TAG_REGION: &str = "STRATUM_REGION";
pub const TAG_SERVICE: &str = "STRATUM_SERVICE";
pub const TAG_TENANT: &str = "STRATUM_TENANT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub environment_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl Identity {
    pub fn new(environment_type: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            environment_type: environment_type.into(),
            environment: None,
            realm: None,
            region: None,
            service: service.into(),
            tenant: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// The same coordinates scoped to one tenant.
    pub fn with_tenant(&self, tenant: impl Into<String>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            ..self.clone()
        }
    }

    /// The same coordinates in the shared scope.
    pub fn shared(&self) -> Self {
        Self {
            tenant: None,
            ..self.clone()
        }
    }

    pub fn is_shared(&self) -> bool {
        self.tenant.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        validate_token(&self.environment_type)?;
        validate_token(&self.service)?;
        for token in [&self.environment, &self.realm, &self.region, &self.tenant]
            .into_iter()
            .flatten()
        {
            validate_token(token)?;
        }
        Ok(())
    }

    /// The synthetic `{ "id": { ... } }` fragment carrying these coordinates.
    pub fn id_config(&self) -> Snapshot {
        let mut id = Map::new();
        let mut put = |key: &str, value: Option<&String>| {
            if let Some(v) = value {
                id.insert(key.to_string(), Value::String(v.clone()));
            }
        };
        put("environmentId", self.environment.as_ref());
        put("environmentType", Some(&self.environment_type));
        put("realmId", self.realm.as_ref());
        put("regionId", self.region.as_ref());
        put("serviceId", Some(&self.service));
        put("tenantId", self.tenant.as_ref());

        let mut root = Map::new();
        root.insert(ID.to_string(), Value::Object(id));
        Snapshot::from_map(root)
    }

    /// `type-env-realm-region-service`
    pub fn service_name(&self) -> Name {
        Name::new([
            Some(self.environment_type.as_str()),
            self.environment.as_deref(),
            self.realm.as_deref(),
            self.region.as_deref(),
            Some(self.service.as_str()),
        ])
    }

    /// `type-env-realm-region-tenant-service`, only for tenant scopes.
    pub fn instance_name(&self) -> Option<Name> {
        self.tenant.as_ref().map(|_| self.config_name())
    }

    /// Key under which the resolved configuration of this scope is saved.
    pub fn config_name(&self) -> Name {
        Name::new([
            Some(self.environment_type.as_str()),
            self.environment.as_deref(),
            self.realm.as_deref(),
            self.region.as_deref(),
            self.tenant.as_deref(),
            Some(self.service.as_str()),
        ])
    }

    /// `type-env-tenant-service`, the base of tenant-level resource names.
    pub fn resource_name(&self) -> Name {
        Name::new([
            Some(self.environment_type.as_str()),
            self.environment.as_deref(),
            self.tenant.as_deref(),
            Some(self.service.as_str()),
        ])
    }

    /// Tags applied to every resource reconciled for this scope.
    pub fn tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        let pairs = [
            (TAG_ENVIRONMENT_TYPE, Some(&self.environment_type)),
            (TAG_ENVIRONMENT, self.environment.as_ref()),
            (TAG_REALM, self.realm.as_ref()),
            (TAG_REGION, self.region.as_ref()),
            (TAG_SERVICE, Some(&self.service)),
            (TAG_TENANT, self.tenant.as_ref()),
        ];
        for (key, value) in pairs {
            if let Some(v) = value {
                tags.insert(key.to_string(), v.clone());
            }
        }
        tags
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
