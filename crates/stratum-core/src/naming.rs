use crate::error::{DeployError, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

pub const SEPARATOR: &str = "-";

/// Prefix for resources that belong to an environment type rather than a service.
pub const RESOURCE_PREFIX: &str = "stratum-";

const HASH_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Token validation
// ---------------------------------------------------------------------------

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").unwrap())
}

/// Validate an identity coordinate (environment, realm, tenant, ...).
pub fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() || token.len() > 64 || !token_re().is_match(token) {
        return Err(DeployError::InvalidToken(token.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Name
// ---------------------------------------------------------------------------

/// A composite resource name: lowercase, separator-joined, absent parts skipped.
///
/// Names feed deterministic resource naming, so the rendering must be stable
/// for identical coordinates across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    parts: Vec<String>,
}

impl Name {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        Self {
            parts: parts
                .into_iter()
                .flatten()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Append a further component, e.g. a role or container name.
    pub fn child(&self, part: &str) -> Self {
        let mut parts = self.parts.clone();
        if !part.is_empty() {
            parts.push(part.to_lowercase());
        }
        Self { parts }
    }

    /// Length-bounded form for providers that cap identifier length.
    ///
    /// Names that fit are returned unchanged. Longer names keep as much of the
    /// prefix as fits and end in `-` plus eight hex digits of the SHA-256 of the
    /// full name, so two long names sharing a prefix still differ.
    pub fn short_name(&self, max: usize) -> String {
        let full = self.to_string();
        if full.len() <= max {
            return full;
        }
        let digest = Sha256::digest(full.as_bytes());
        let hash: String = digest
            .iter()
            .take(HASH_LEN / 2)
            .map(|b| format!("{b:02x}"))
            .collect();
        if max <= HASH_LEN {
            return hash[..max].to_string();
        }
        let mut keep = max - HASH_LEN - SEPARATOR.len();
        while !full.is_char_boundary(keep) {
            keep -= 1;
        }
        let prefix = full[..keep].trim_end_matches(SEPARATOR);
        format!("{prefix}{SEPARATOR}{hash}")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join(SEPARATOR))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_tokens() {
        for token in ["dev", "qa1", "us-east-1", "acme_corp", "A1"] {
            validate_token(token).unwrap_or_else(|_| panic!("expected valid: {token}"));
        }
    }

    #[test]
    fn invalid_tokens() {
        let long = "x".repeat(65);
        for token in ["", "-dev", "has space", "a/b", "a.b", long.as_str()] {
            assert!(validate_token(token).is_err(), "expected invalid: {token}");
        }
    }

    #[test]
    fn name_is_lowercase_and_skips_absent_parts() {
        let name = Name::new([Some("Dev"), None, Some("QA1"), Some("Billing")]);
        assert_eq!(name.to_string(), "dev-qa1-billing");
    }

    #[test]
    fn child_appends_component() {
        let name = Name::new([Some("dev"), Some("qa1")]).child("Reader");
        assert_eq!(name.to_string(), "dev-qa1-reader");
    }

    #[test]
    fn short_name_unchanged_when_it_fits() {
        let name = Name::new([Some("dev"), Some("qa1"), Some("billing")]);
        assert_eq!(name.short_name(32), "dev-qa1-billing");
    }

    #[test]
    fn short_name_is_bounded_and_stable() {
        let name = Name::new([
            Some("staging"),
            Some("environment-one"),
            Some("tenant-with-a-long-name"),
            Some("billing"),
        ]);
        let short = name.short_name(32);
        assert_eq!(short.len(), 32);
        assert_eq!(short, name.short_name(32));
        assert!(short.starts_with("staging-environment-one-"));
    }

    #[test]
    fn short_names_differ_for_shared_long_prefix() {
        let a = Name::new([Some("staging-environment-one-tenant-with-long-name"), Some("a")]);
        let b = Name::new([Some("staging-environment-one-tenant-with-long-name"), Some("b")]);
        assert_ne!(a.short_name(32), b.short_name(32));
    }
}
