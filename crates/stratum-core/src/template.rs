//! `${name}` substitution over policy and descriptor templates, and the
//! canonical JSON form used to decide whether a stored document needs updating.

use crate::error::Result;
use crate::identity::{Identity, ID};
use crate::snapshot::Snapshot;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const FQ_SERVICE_NAME: &str = "fullyQualifiedServiceName";
pub const FQ_INSTANCE_NAME: &str = "fullyQualifiedInstanceName";

/// Variable name → value, fixed once a deployment context is built.
pub type TemplateVariables = BTreeMap<String, String>;

static VARIABLE_RE: OnceLock<Regex> = OnceLock::new();

fn variable_re() -> &'static Regex {
    VARIABLE_RE.get_or_init(|| Regex::new(r"(\$?)\$\{([^${}]+)\}").unwrap())
}

/// Replace every `${name}` in `template` with its value.
///
/// Unknown names are left as written. `$${name}` renders as a literal `${name}`.
pub fn substitute(template: &str, vars: &TemplateVariables) -> String {
    variable_re()
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[2];
            if !caps[1].is_empty() {
                return format!("${{{name}}}");
            }
            match vars.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Parse `text` as JSON and re-serialize it compactly with sorted keys.
pub fn canonicalize(text: &str) -> Result<String> {
    let value: Value = serde_json::from_str(text)?;
    Ok(serde_json::to_string(&value)?)
}

/// Semantic equality of two JSON documents: key order and whitespace are
/// ignored, values are not. Unparseable input falls back to exact comparison.
pub fn documents_equal(a: &str, b: &str) -> bool {
    match (canonicalize(a), canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Add the identity-derived variables: every string under the snapshot's `id`
/// object, then the fully qualified service and instance names.
pub fn add_identity_variables(
    vars: &mut TemplateVariables,
    identity: &Identity,
    snapshot: &Snapshot,
) -> Result<()> {
    for (name, value) in snapshot.required_object(ID)? {
        if let Value::String(s) = value {
            vars.insert(name.clone(), s.clone());
        }
    }
    vars.insert(
        FQ_SERVICE_NAME.to_string(),
        identity.service_name().to_string(),
    );
    if let Some(instance) = identity.instance_name() {
        vars.insert(FQ_INSTANCE_NAME.to_string(), instance.to_string());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
