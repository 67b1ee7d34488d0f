use crate::error::ShellError;
use reqwest::Url;

/// Source-hosting providers the fetcher knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    GitHub,
}

impl Host {
    fn from_domain(domain: &str) -> Option<Self> {
        match domain.to_ascii_lowercase().as_str() {
            "github.com" | "www.github.com" => Some(Self::GitHub),
            _ => None,
        }
    }
}

/// A repository on a supported host, optionally pinned to a branch or tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReference {
    pub host: Host,
    pub owner: String,
    pub repo: String,
    pub branch_or_tag: Option<String>,
}

impl RepoReference {
    /// Parse a repository URL.
    ///
    /// Accepted forms: `https://github.com/o/r`, `github.com/o/r`,
    /// `git@github.com:o/r.git` and `.../o/r/tree/<branch>`. A trailing `.git`
    /// or `.zip` on the repository segment is dropped.
    pub fn parse_url(input: &str) -> Result<Self, ShellError> {
        let input = input.trim();
        let normalized = if let Some(rest) = input.strip_prefix("git@") {
            format!("ssh://{}", rest.replacen(':', "/", 1))
        } else if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{input}")
        };

        let url = Url::parse(&normalized)
            .map_err(|e| ShellError::InvalidArgument(format!("invalid repository url '{input}': {e}")))?;
        let domain = url.host_str().unwrap_or_default();
        let host = Host::from_domain(domain).ok_or_else(|| ShellError::HostUnsupported {
            host: domain.to_string(),
        })?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let (owner, repo, rest) = match segments.as_slice() {
            [owner, repo, rest @ ..] => (*owner, strip_repo_suffix(repo), rest),
            _ => {
                return Err(ShellError::InvalidArgument(format!(
                    "repository url '{input}' must name an owner and a repository"
                )));
            }
        };
        let branch_or_tag = match rest {
            ["tree", branch @ ..] if !branch.is_empty() => Some(branch.join("/")),
            _ => None,
        };

        Self::build(host, owner, repo, branch_or_tag)
    }

    /// Parse an `owner/repo[@tag]` slug. Full URLs are accepted as well.
    pub fn parse_slug(input: &str) -> Result<Self, ShellError> {
        let input = input.trim();
        if input.contains("://") || input.starts_with("git@") || input.contains("github.com") {
            return Self::parse_url(input);
        }
        let (path, tag) = match input.split_once('@') {
            Some((path, tag)) if !tag.is_empty() => (path, Some(tag.to_string())),
            Some((path, _)) => (path, None),
            None => (input, None),
        };
        match path.split('/').collect::<Vec<_>>().as_slice() {
            [owner, repo] => Self::build(Host::GitHub, owner, strip_repo_suffix(repo), tag),
            _ => Err(ShellError::InvalidArgument(format!(
                "expected owner/repo, got '{input}'"
            ))),
        }
    }

    fn build(
        host: Host,
        owner: &str,
        repo: &str,
        branch_or_tag: Option<String>,
    ) -> Result<Self, ShellError> {
        if owner.is_empty() || repo.is_empty() {
            return Err(ShellError::InvalidArgument(
                "owner and repository must not be empty".to_string(),
            ));
        }
        Ok(Self {
            host,
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch_or_tag,
        })
    }

    /// `owner/repo`.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn strip_repo_suffix(segment: &str) -> &str {
    segment
        .strip_suffix(".git")
        .or_else(|| segment.strip_suffix(".zip"))
        .unwrap_or(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(owner: &str, repo: &str, branch: Option<&str>) -> RepoReference {
        RepoReference {
            host: Host::GitHub,
            owner: owner.into(),
            repo: repo.into(),
            branch_or_tag: branch.map(String::from),
        }
    }

    #[test]
    fn parses_common_url_forms() {
        for url in [
            "https://github.com/acme/widget",
            "https://github.com/acme/widget.git",
            "https://github.com/acme/widget/",
            "github.com/acme/widget",
            "http://www.github.com/acme/widget",
            "git@github.com:acme/widget.git",
        ] {
            assert_eq!(
                RepoReference::parse_url(url).unwrap(),
                reference("acme", "widget", None),
                "{url}"
            );
        }
    }

    #[test]
    fn tree_suffix_pins_branch() {
        let r = RepoReference::parse_url("https://github.com/acme/widget/tree/feature/x").unwrap();
        assert_eq!(r, reference("acme", "widget", Some("feature/x")));
    }

    #[test]
    fn other_hosts_are_rejected() {
        let err = RepoReference::parse_url("https://gitlab.com/acme/widget").unwrap_err();
        assert!(matches!(err, ShellError::HostUnsupported { ref host } if host == "gitlab.com"));
    }

    #[test]
    fn missing_repo_segment_is_invalid() {
        assert!(matches!(
            RepoReference::parse_url("https://github.com/acme"),
            Err(ShellError::InvalidArgument(_))
        ));
    }

    #[test]
    fn slugs_with_and_without_tag() {
        assert_eq!(
            RepoReference::parse_slug("acme/widget").unwrap(),
            reference("acme", "widget", None)
        );
        assert_eq!(
            RepoReference::parse_slug("acme/widget@v1.2").unwrap(),
            reference("acme", "widget", Some("v1.2"))
        );
        assert_eq!(RepoReference::parse_slug("acme/widget").unwrap().slug(), "acme/widget");
    }

    #[test]
    fn malformed_slugs_are_invalid() {
        for slug in ["widget", "acme/", "/widget", "a/b/c"] {
            assert!(
                matches!(RepoReference::parse_slug(slug), Err(ShellError::InvalidArgument(_))),
                "{slug}"
            );
        }
    }
}
