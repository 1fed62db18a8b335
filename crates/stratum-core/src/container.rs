use crate::error::{DeployError, Result};
use crate::snapshot::{kind_of, required_str};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const CONTAINERS: &str = "containers";
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_HEALTH_CHECK_PATH: &str = "/HealthCheck";
/// Suffix of the load balancer's default target group; no container may take it.
pub const DEFAULT_TARGET_GROUP: &str = "default";

// ---------------------------------------------------------------------------
// Tenancy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tenancy {
    Single,
    Multi,
}

impl Tenancy {
    pub fn as_str(self) -> &'static str {
        match self {
            Tenancy::Single => "SINGLE",
            Tenancy::Multi => "MULTI",
        }
    }
}

impl fmt::Display for Tenancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tenancy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SINGLE" => Ok(Tenancy::Single),
            "MULTI" => Ok(Tenancy::Multi),
            _ => Err(format!("unknown tenancy: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ContainerType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerType {
    Init,
    Service,
}

impl ContainerType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerType::Init => "INIT",
            ContainerType::Service => "SERVICE",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INIT" => Ok(ContainerType::Init),
            "SERVICE" => Ok(ContainerType::Service),
            _ => Err(format!("unknown container type: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ContainerSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub tenancy: Tenancy,
    pub container_type: ContainerType,
    pub port: u16,
    pub paths: Vec<String>,
    pub health_check_path: String,
}

impl ContainerSpec {
    /// Read one entry of the service descriptor's `containers` object.
    pub fn parse(name: &str, node: &Map<String, Value>) -> Result<Self> {
        let path = format!("/{CONTAINERS}/{name}");
        if name.eq_ignore_ascii_case(DEFAULT_TARGET_GROUP) {
            return Err(DeployError::invalid_config(
                path,
                format!("\"{DEFAULT_TARGET_GROUP}\" is reserved for the default target group"),
            ));
        }

        let tenancy = required_str(node, "tenancy", &path)?
            .parse::<Tenancy>()
            .map_err(|e: String| DeployError::invalid_config(format!("{path}/tenancy"), e))?;

        let container_type = match node.get("containerType") {
            None => ContainerType::Service,
            Some(Value::String(s)) => s.parse::<ContainerType>().map_err(|e: String| {
                DeployError::invalid_config(format!("{path}/containerType"), e)
            })?,
            Some(other) => {
                return Err(DeployError::invalid_config(
                    format!("{path}/containerType"),
                    format!("expected a string, found {}", kind_of(other)),
                ))
            }
        };

        let port = parse_port(node.get("port"), &path)?;

        let paths = match node.get("paths") {
            None => Vec::new(),
            Some(_) => crate::snapshot::required_string_array(node, "paths", &path)?,
        };

        let health_check_path = match node.get("healthCheckPath") {
            None => DEFAULT_HEALTH_CHECK_PATH.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(DeployError::invalid_config(
                    format!("{path}/healthCheckPath"),
                    format!("expected a string, found {}", kind_of(other)),
                ))
            }
        };

        Ok(Self {
            name: name.to_string(),
            tenancy,
            container_type,
            port,
            paths,
            health_check_path,
        })
    }
}

fn parse_port(node: Option<&Value>, parent: &str) -> Result<u16> {
    let path = format!("{parent}/port");
    let invalid = |reason: String| DeployError::invalid_config(path.clone(), reason);
    match node {
        None => Ok(DEFAULT_PORT),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| invalid(format!("{n} is not a valid port"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u16>()
            .map_err(|_| invalid(format!("\"{s}\" is not a valid port"))),
        Some(other) => Err(invalid(format!(
            "expected a number, found {}",
            kind_of(other)
        ))),
    }
}

// ---------------------------------------------------------------------------
// ContainerSet
// ---------------------------------------------------------------------------

/// The service's containers split by tenancy and type, each ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSet {
    single_init: BTreeMap<String, ContainerSpec>,
    single_service: BTreeMap<String, ContainerSpec>,
    multi_init: BTreeMap<String, ContainerSpec>,
    multi_service: BTreeMap<String, ContainerSpec>,
}

impl ContainerSet {
    /// Partition the `containers` object of a service descriptor. Entries that
    /// are not objects are ignored; a missing `containers` key yields an empty set.
    pub fn from_descriptor(descriptor: &Map<String, Value>) -> Result<Self> {
        let mut set = Self::default();
        let containers = match descriptor.get(CONTAINERS) {
            None => return Ok(set),
            Some(Value::Object(c)) => c,
            Some(other) => {
                return Err(DeployError::invalid_config(
                    format!("/{CONTAINERS}"),
                    format!("expected an object, found {}", kind_of(other)),
                ))
            }
        };

        for (name, node) in containers {
            let Value::Object(node) = node else {
                tracing::debug!(container = %name, "skipping non-object container entry");
                continue;
            };
            set.insert(ContainerSpec::parse(name, node)?);
        }
        Ok(set)
    }

    pub fn insert(&mut self, spec: ContainerSpec) {
        let map = match (spec.tenancy, spec.container_type) {
            (Tenancy::Single, ContainerType::Init) => &mut self.single_init,
            (Tenancy::Single, ContainerType::Service) => &mut self.single_service,
            (Tenancy::Multi, ContainerType::Init) => &mut self.multi_init,
            (Tenancy::Multi, ContainerType::Service) => &mut self.multi_service,
        };
        map.insert(spec.name.clone(), spec);
    }

    pub fn init(&self, tenancy: Tenancy) -> Vec<ContainerSpec> {
        match tenancy {
            Tenancy::Single => self.single_init.values().cloned().collect(),
            Tenancy::Multi => self.multi_init.values().cloned().collect(),
        }
    }

    pub fn service(&self, tenancy: Tenancy) -> Vec<ContainerSpec> {
        match tenancy {
            Tenancy::Single => self.single_service.values().cloned().collect(),
            Tenancy::Multi => self.multi_service.values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.single_init.len()
            + self.single_service.len()
            + self.multi_init.len()
            + self.multi_service.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
