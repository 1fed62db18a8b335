use crate::error::{DeployError, Result};
use crate::identity::Identity;
use crate::paths::{self, TRACK_DIR};
use crate::snapshot::{kind_of, required_str};
use crate::source::ConfigSource;
use serde::Serialize;
use serde_json::Value;

const STATIONS: &str = "stations";
const TENANTS: &str = "tenants";

/// One stop on a release track: a set of coordinates and the tenants deployed there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub name: String,
    pub environment_type: String,
    pub environment: String,
    pub realm: String,
    pub region: String,
    pub tenants: Vec<String>,
}

impl Station {
    /// Read `config/track/<track>.json` and return the station called `station`.
    pub fn fetch(source: &dyn ConfigSource, track: &str, station: &str) -> Result<Self> {
        let file = paths::json_file(track);
        let doc = match source.fetch_document(TRACK_DIR, &file) {
            Ok(doc) => doc,
            Err(DeployError::DocumentNotFound { path }) => {
                return Err(DeployError::MissingDocument {
                    entity: "track".to_string(),
                    name: track.to_string(),
                    path,
                })
            }
            Err(e) => return Err(e),
        };
        let track_path = paths::join(TRACK_DIR, &file);

        let stations = match doc.get(STATIONS) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(DeployError::invalid_config(
                    format!("{track_path}#/{STATIONS}"),
                    format!("expected an array, found {}", kind_of(other)),
                ))
            }
            None => {
                return Err(DeployError::invalid_config(
                    format!("{track_path}#/{STATIONS}"),
                    "track has no stations",
                ))
            }
        };

        for (i, node) in stations.iter().enumerate() {
            let parent = format!("{track_path}#/{STATIONS}/{i}");
            let Value::Object(obj) = node else {
                return Err(DeployError::invalid_config(
                    parent,
                    format!("expected an object, found {}", kind_of(node)),
                ));
            };
            if required_str(obj, "name", &parent)? != station {
                continue;
            }

            let tenants = match obj.get(TENANTS) {
                None => Vec::new(),
                Some(_) => crate::snapshot::required_string_array(obj, TENANTS, &parent)?,
            };
            return Ok(Self {
                name: station.to_string(),
                environment_type: required_str(obj, "environmentType", &parent)?.to_string(),
                environment: required_str(obj, "environment", &parent)?.to_string(),
                realm: required_str(obj, "realm", &parent)?.to_string(),
                region: required_str(obj, "region", &parent)?.to_string(),
                tenants,
            });
        }

        Err(DeployError::invalid_config(
            track_path,
            format!("no station named \"{station}\""),
        ))
    }

    /// `base` re-pointed at this station's coordinates; the service is kept.
    pub fn apply(&self, base: &Identity) -> Identity {
        Identity::new(&self.environment_type, &base.service)
            .with_environment(&self.environment)
            .with_realm(&self.realm)
            .with_region(&self.region)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
