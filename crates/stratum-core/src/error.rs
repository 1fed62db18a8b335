use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("no such {entity} \"{name}\" (expected {path})")]
    MissingDocument {
        entity: String,
        name: String,
        path: String,
    },

    #[error("document not found: {path}")]
    DocumentNotFound { path: String },

    #[error("malformed document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("invalid configuration at {path}: {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("\"{0}\" is a required parameter")]
    MissingParameter(String),

    #[error("account ID is {expected} but our credentials are for account {actual}")]
    AccountMismatch { expected: String, actual: String },

    #[error("\"{0}\" is not a valid action")]
    InvalidAction(String),

    #[error("invalid name token '{0}': must be alphanumeric with hyphens or underscores")]
    InvalidToken(String),

    #[error("config source error: {0}")]
    Source(String),

    #[error("{operation} failed for {resource}: {message}")]
    Provider {
        operation: String,
        resource: String,
        message: String,
    },

    #[error("batch '{batch}' failed: {}", summarize(.failures))]
    Batch {
        batch: String,
        failures: Vec<TaskFailure>,
    },

    #[error("executor error: {0}")]
    Executor(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One failed unit of work inside a batch.
#[derive(Debug)]
pub struct TaskFailure {
    pub task: String,
    pub error: DeployError,
}

fn summarize(failures: &[TaskFailure]) -> String {
    let parts: Vec<String> = failures
        .iter()
        .map(|f| format!("[{}] {}", f.task, f.error))
        .collect();
    format!("{} task(s) failed: {}", failures.len(), parts.join("; "))
}

impl DeployError {
    /// Configuration errors abort a run before any mutating provider call.
    pub fn is_config_error(&self) -> bool {
        match self {
            DeployError::MissingDocument { .. }
            | DeployError::DocumentNotFound { .. }
            | DeployError::MalformedDocument { .. }
            | DeployError::InvalidConfig { .. }
            | DeployError::MissingParameter(_)
            | DeployError::AccountMismatch { .. }
            | DeployError::InvalidAction(_)
            | DeployError::InvalidToken(_) => true,
            DeployError::Batch { failures, .. } => {
                failures.iter().all(|f| f.error.is_config_error())
            }
            _ => false,
        }
    }

    pub fn invalid_config(path: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::InvalidConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn provider(
        operation: impl Into<String>,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DeployError::Provider {
            operation: operation.into(),
            resource: resource.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_error_lists_every_failure() {
        let err = DeployError::Batch {
            batch: "tenant-config".into(),
            failures: vec![
                TaskFailure {
                    task: "acme/save-config".into(),
                    error: DeployError::provider("save-config", "bucket", "denied"),
                },
                TaskFailure {
                    task: "globex/role/reader".into(),
                    error: DeployError::MissingParameter("region".into()),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 task(s) failed"));
        assert!(msg.contains("acme/save-config"));
        assert!(msg.contains("globex/role/reader"));
        assert!(!err.is_config_error());
    }

    #[test]
    fn config_errors_are_classified() {
        assert!(DeployError::invalid_config("/amazon", "missing").is_config_error());
        assert!(DeployError::AccountMismatch {
            expected: "1".into(),
            actual: "2".into()
        }
        .is_config_error());
        assert!(!DeployError::provider("op", "res", "boom").is_config_error());
    }
}
