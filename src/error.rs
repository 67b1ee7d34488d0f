use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by builtins and the fetcher.
///
/// None of these end the shell: the interpreter renders them as text at the
/// command boundary.
#[derive(Debug, Error)]
pub enum ShellError {
    /// A path, process or remote resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Missing or malformed operands.
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("network failure fetching {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("cannot read archive {}: {reason}", path.display())]
    ArchiveFormat { path: PathBuf, reason: String },

    #[error("Currently only GitHub repositories are supported")]
    HostUnsupported { host: String },

    #[error("malformed manifest from {url}: {source}")]
    Manifest {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ShellError {
    pub(crate) fn network(url: &str, reason: impl ToString) -> Self {
        Self::NetworkFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArchiveFormat {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_unsupported_renders_user_message() {
        let err = ShellError::HostUnsupported {
            host: "gitlab.com".into(),
        };
        assert_eq!(
            err.to_string(),
            "Currently only GitHub repositories are supported"
        );
    }

    #[test]
    fn network_failure_names_the_url() {
        let err = ShellError::network("https://example.test/x.zip", "connection reset");
        assert_eq!(
            err.to_string(),
            "network failure fetching https://example.test/x.zip: connection reset"
        );
    }
}
