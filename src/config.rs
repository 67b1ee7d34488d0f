//! Runtime settings read from the process environment.
//!
//! The shell keeps no configuration file. Every knob has a default and can be
//! overridden with a `WINTERM_*` variable:
//! - `WINTERM_GITHUB_API` - API base URL (default: `https://api.github.com`)
//! - `WINTERM_GITHUB_WEB` - archive host base URL (default: `https://github.com`)
//! - `WINTERM_HTTP_TIMEOUT_SECS` - connect timeout, and total timeout for API
//!   manifests; archive downloads have no total deadline
//! - `WINTERM_HISTORY_SIZE` - number of stored history entries
//! - `WINTERM_ALLOW_EXTERNAL` - comma separated allow-list of external binaries
//! - `GITHUB_TOKEN` - optional bearer token for API calls

use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_WEB_BASE: &str = "https://github.com";

/// Branch used when the repository manifest does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Tag sentinel meaning "most recent release".
pub const LATEST_RELEASE: &str = "latest";

/// Number of history entries shown by the `history` builtin.
pub const HISTORY_DISPLAY: usize = 20;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Which external binaries the fall-through handler may launch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExternalPolicy {
    #[default]
    Unrestricted,
    AllowList(Vec<String>),
}

impl ExternalPolicy {
    pub fn permits(&self, name: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::AllowList(names) => names.iter().any(|n| n == name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub api_base: String,
    pub web_base: String,
    pub user_agent: String,
    pub http_timeout: Duration,
    pub github_token: Option<String>,
    pub history_capacity: usize,
    pub external_policy: ExternalPolicy,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            user_agent: format!("winterm/{}", env!("CARGO_PKG_VERSION")),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            github_token: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            external_policy: ExternalPolicy::Unrestricted,
        }
    }
}

impl ShellConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(api) = lookup("WINTERM_GITHUB_API").filter(|v| !v.trim().is_empty()) {
            config.api_base = api.trim().trim_end_matches('/').to_string();
        }
        if let Some(web) = lookup("WINTERM_GITHUB_WEB").filter(|v| !v.trim().is_empty()) {
            config.web_base = web.trim().trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("WINTERM_HTTP_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(n) if n > 0 => config.http_timeout = Duration::from_secs(n),
                _ => warn!("ignoring invalid WINTERM_HTTP_TIMEOUT_SECS={secs:?}"),
            }
        }
        if let Some(size) = lookup("WINTERM_HISTORY_SIZE") {
            match size.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.history_capacity = n,
                _ => warn!("ignoring invalid WINTERM_HISTORY_SIZE={size:?}"),
            }
        }
        if let Some(list) = lookup("WINTERM_ALLOW_EXTERNAL") {
            let names: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !names.is_empty() {
                config.external_policy = ExternalPolicy::AllowList(names);
            }
        }
        config.github_token = lookup("GITHUB_TOKEN").filter(|t| !t.trim().is_empty());

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ShellConfig::from_lookup(|_| None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.web_base, DEFAULT_WEB_BASE);
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.external_policy, ExternalPolicy::Unrestricted);
        assert!(config.github_token.is_none());
    }

    #[test]
    fn overrides_are_trimmed_and_parsed() {
        let config = ShellConfig::from_lookup(lookup_from(&[
            ("WINTERM_GITHUB_API", "http://127.0.0.1:9000/"),
            ("WINTERM_HTTP_TIMEOUT_SECS", "5"),
            ("WINTERM_HISTORY_SIZE", "3"),
            ("WINTERM_ALLOW_EXTERNAL", "git, ls ,,"),
        ]));
        assert_eq!(config.api_base, "http://127.0.0.1:9000");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.history_capacity, 3);
        assert_eq!(
            config.external_policy,
            ExternalPolicy::AllowList(vec!["git".into(), "ls".into()])
        );
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = ShellConfig::from_lookup(lookup_from(&[
            ("WINTERM_HTTP_TIMEOUT_SECS", "soon"),
            ("WINTERM_HISTORY_SIZE", "0"),
        ]));
        assert_eq!(
            config.http_timeout,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
        );
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn allow_list_policy_only_permits_listed_names() {
        let policy = ExternalPolicy::AllowList(vec!["git".into()]);
        assert!(policy.permits("git"));
        assert!(!policy.permits("rm"));
        assert!(ExternalPolicy::Unrestricted.permits("anything"));
    }
}
