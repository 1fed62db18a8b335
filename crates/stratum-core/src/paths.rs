use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Configuration tree layout
// ---------------------------------------------------------------------------

pub const CONFIG_DIR: &str = "config";
pub const ENVIRONMENT_DIR: &str = "config/environment";
pub const TENANT_DIR: &str = "config/tenant";
pub const SERVICE_DIR: &str = "config/service";
pub const TRACK_DIR: &str = "config/track";

pub const DEFAULTS: &str = "defaults";
pub const ENVIRONMENT_TYPE: &str = "environmentType";
pub const ENVIRONMENT: &str = "environment";
pub const REALM: &str = "realm";
pub const REGION: &str = "region";
pub const SERVICE_FILE: &str = "service.json";
pub const POLICY: &str = "policy";
pub const SINGLE_TENANT: &str = "singleTenant";
pub const MULTI_TENANT: &str = "multiTenant";

pub const DOT_JSON: &str = ".json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn json_file(stem: &str) -> String {
    format!("{stem}{DOT_JSON}")
}

pub fn join(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

/// One level of the environment cascade: where it lives and whether it must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeLevel {
    pub dir: String,
    pub file: String,
    pub entity: &'static str,
    pub name: String,
    pub required: bool,
}

/// The environment-config cascade, least specific first.
///
/// Global defaults are optional; the environment type must exist; each deeper
/// level is visited only while its coordinate is set, and must exist if visited.
pub fn environment_cascade(identity: &Identity) -> Vec<CascadeLevel> {
    let mut levels = vec![CascadeLevel {
        dir: CONFIG_DIR.to_string(),
        file: json_file(DEFAULTS),
        entity: "defaults",
        name: String::new(),
        required: false,
    }];

    let mut dir = join(ENVIRONMENT_DIR, &identity.environment_type);
    levels.push(CascadeLevel {
        dir: dir.clone(),
        file: json_file(ENVIRONMENT_TYPE),
        entity: "environment type",
        name: identity.environment_type.clone(),
        required: true,
    });

    let deeper = [
        (identity.environment.as_ref(), ENVIRONMENT, "environment"),
        (identity.realm.as_ref(), REALM, "realm"),
        (identity.region.as_ref(), REGION, "region"),
    ];
    for (value, file, entity) in deeper {
        let Some(value) = value else { break };
        dir = join(&dir, value);
        levels.push(CascadeLevel {
            dir: dir.clone(),
            file: json_file(file),
            entity,
            name: value.clone(),
            required: true,
        });
    }
    levels
}

pub fn service_dir(service: &str) -> String {
    join(SERVICE_DIR, service)
}

pub fn policy_dir(service: &str, provider: &str, tenancy: &str) -> String {
    format!("{}/{provider}/{POLICY}/{tenancy}", service_dir(service))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_stops_at_first_absent_coordinate() {
        let identity = Identity::new("dev", "billing").with_environment("qa1");
        let levels = environment_cascade(&identity);
        let paths: Vec<String> = levels.iter().map(|l| join(&l.dir, &l.file)).collect();
        assert_eq!(
            paths,
            vec![
                "config/defaults.json",
                "config/environment/dev/environmentType.json",
                "config/environment/dev/qa1/environment.json",
            ]
        );
        assert!(!levels[0].required);
        assert!(levels[1].required);
    }

    #[test]
    fn cascade_skips_region_without_realm() {
        let identity = Identity::new("dev", "billing")
            .with_environment("qa1")
            .with_region("us-east-1");
        assert_eq!(environment_cascade(&identity).len(), 3);
    }

    #[test]
    fn full_cascade_depth() {
        let identity = Identity::new("prod", "billing")
            .with_environment("p1")
            .with_realm("eu")
            .with_region("eu-west-1");
        let last = environment_cascade(&identity).pop().unwrap();
        assert_eq!(last.dir, "config/environment/prod/p1/eu/eu-west-1");
        assert_eq!(last.file, "region.json");
    }

    #[test]
    fn policy_dir_layout() {
        assert_eq!(
            policy_dir("billing", "amazon", MULTI_TENANT),
            "config/service/billing/amazon/policy/multiTenant"
        );
    }
}
