use super::{parse_object, ConfigSource};
use crate::error::{DeployError, Result};
use base64::Engine;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "main";

const TYPE_FILE: &str = "file";

/// A configuration tree read through the GitHub contents API.
pub struct GitHubConfigSource {
    client: Client,
    api_base: String,
    organization: String,
    repo: String,
    branch: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    content: Option<String>,
}

impl GitHubConfigSource {
    pub fn new(organization: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stratum/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeployError::Source(e.to_string()))?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            organization: organization.into(),
            repo: repo.into(),
            branch: DEFAULT_BRANCH.to_string(),
            token: None,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.organization, self.repo, path
        )
    }

    fn get(&self, path: &str) -> Result<Option<reqwest::blocking::Response>> {
        let mut request = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        // The token never appears in logs.
        tracing::debug!(path, branch = %self.branch, "fetch from github");
        let response = request
            .send()
            .map_err(|e| DeployError::Source(format!("unable to read {path}: {e}")))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response)),
            s => Err(DeployError::Source(format!(
                "unable to read {path}: HTTP {s}"
            ))),
        }
    }
}

impl ConfigSource for GitHubConfigSource {
    fn fetch_document(&self, dir: &str, file_name: &str) -> Result<Map<String, Value>> {
        let path = crate::paths::join(dir, file_name);
        let Some(response) = self.get(&path)? else {
            return Err(DeployError::DocumentNotFound { path });
        };
        let entry: ContentEntry = response
            .json()
            .map_err(|e| DeployError::Source(format!("unable to decode {path}: {e}")))?;
        if entry.kind != TYPE_FILE {
            return Err(DeployError::MalformedDocument {
                path,
                reason: format!("expected a file but found a {}", entry.kind),
            });
        }
        let Some(content) = entry.content else {
            return Err(DeployError::MalformedDocument {
                path,
                reason: "there is no content node in the response".to_string(),
            });
        };
        // GitHub wraps base64 content at 60 columns.
        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| DeployError::MalformedDocument {
                path: path.clone(),
                reason: format!("content is not valid base64: {e}"),
            })?;
        parse_object(&path, &bytes)
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let Some(response) = self.get(dir)? else {
            tracing::warn!(dir, "no such directory, returning empty list");
            return Ok(Vec::new());
        };
        let entries: Vec<ContentEntry> = response.json().map_err(|e| {
            DeployError::Source(format!("unable to list {dir}, received a non-array response: {e}"))
        })?;
        let mut files: Vec<String> = entries
            .into_iter()
            .filter(|e| e.kind == TYPE_FILE)
            .map(|e| e.name)
            .collect();
        files.sort();
        Ok(files)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
