pub mod config;
pub mod deploy;
pub mod name;

use anyhow::Context;
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use stratum_core::identity::Identity;
use stratum_core::source::{ConfigSource, FsConfigSource, GitHubConfigSource};

// ---------------------------------------------------------------------------
// Shared argument groups
// ---------------------------------------------------------------------------

/// The coordinates of a deployment, minus tenants.
#[derive(Args, Debug, Clone)]
pub struct CoordinateArgs {
    /// Environment type (e.g. dev, prod)
    #[arg(long, env = "STRATUM_ENVIRONMENT_TYPE")]
    pub environment_type: String,

    /// Environment within the type
    #[arg(long, env = "STRATUM_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Realm within the environment
    #[arg(long, env = "STRATUM_REALM")]
    pub realm: Option<String>,

    /// Region within the realm
    #[arg(long, env = "STRATUM_REGION")]
    pub region: Option<String>,

    /// Service to deploy
    #[arg(long, env = "STRATUM_SERVICE")]
    pub service: String,
}

impl CoordinateArgs {
    pub fn identity(&self) -> Identity {
        let mut identity = Identity::new(&self.environment_type, &self.service);
        if let Some(environment) = &self.environment {
            identity = identity.with_environment(environment);
        }
        if let Some(realm) = &self.realm {
            identity = identity.with_realm(realm);
        }
        if let Some(region) = &self.region {
            identity = identity.with_region(region);
        }
        identity
    }
}

/// Where configuration is read from: a GitHub repository, or the local tree.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// GitHub organization holding the config repository
    #[arg(long, env = "STRATUM_GITHUB_ORG", requires = "github_repo")]
    pub github_org: Option<String>,

    /// GitHub config repository
    #[arg(long, env = "STRATUM_GITHUB_REPO", requires = "github_org")]
    pub github_repo: Option<String>,

    /// Branch to read configuration from
    #[arg(long, env = "STRATUM_GITHUB_BRANCH", default_value = stratum_core::source::github::DEFAULT_BRANCH)]
    pub github_branch: String,

    /// Token for the GitHub API
    #[arg(long, env = "STRATUM_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "STRATUM_GITHUB_API", hide = true)]
    pub github_api: Option<String>,
}

impl SourceArgs {
    pub fn open(&self, config_dir: &Path) -> anyhow::Result<Arc<dyn ConfigSource>> {
        match (&self.github_org, &self.github_repo) {
            (Some(org), Some(repo)) => {
                tracing::debug!(org = %org, repo = %repo, branch = %self.github_branch, "reading config from GitHub");
                let mut source = GitHubConfigSource::new(org, repo)
                    .context("failed to build GitHub client")?
                    .with_branch(&self.github_branch)
                    .with_token(self.github_token.clone());
                if let Some(api) = &self.github_api {
                    source = source.with_api_base(api);
                }
                Ok(Arc::new(source))
            }
            _ => {
                tracing::debug!(dir = %config_dir.display(), "reading config from directory");
                Ok(Arc::new(FsConfigSource::new(config_dir)))
            }
        }
    }
}
