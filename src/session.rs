use crate::config::ShellConfig;
use crate::host;
use anyhow::{Context, Result, bail};
use std::collections::{HashMap, VecDeque};
use std::env as stdenv;
use std::fs;
use std::path::{Path, PathBuf};

/// Who is running the shell, captured once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub host: String,
}

/// Mutable state shared by every command of one interactive session.
///
/// The session contains:
/// - `vars`: environment variables visible to launched processes (e.g., PATH).
/// - the working directory, which always points at an existing directory.
/// - the home directory and identity, fixed after construction.
/// - the command history, evicted oldest-first once it reaches its capacity.
/// - `should_exit`: set by `exit` so the interactive loop knows to stop.
#[derive(Debug, Clone)]
pub struct Session {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// When set to true, indicates that the interactive loop should exit.
    pub should_exit: bool,
    working_dir: PathBuf,
    home_dir: PathBuf,
    identity: Identity,
    history: VecDeque<String>,
    history_capacity: usize,
}

impl Session {
    /// Capture the current process state into a new session.
    pub fn new(config: &ShellConfig) -> Self {
        let vars: HashMap<String, String> = stdenv::vars().collect();
        let home_dir = vars
            .get("HOME")
            .or_else(|| vars.get("USERPROFILE"))
            .map(PathBuf::from)
            .filter(|p| p.is_dir())
            .or_else(|| stdenv::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));
        let working_dir = stdenv::current_dir()
            .and_then(fs::canonicalize)
            .unwrap_or_else(|_| home_dir.clone());
        let user = vars
            .get("USER")
            .or_else(|| vars.get("USERNAME"))
            .cloned()
            .unwrap_or_else(|| "user".to_string());
        let identity = Identity {
            user,
            host: host::hostname(),
        };

        Self::from_parts(vars, working_dir, home_dir, identity, config.history_capacity)
    }

    /// Assemble a session from explicit parts.
    pub fn from_parts(
        vars: HashMap<String, String>,
        working_dir: PathBuf,
        home_dir: PathBuf,
        identity: Identity,
        history_capacity: usize,
    ) -> Self {
        Self {
            vars,
            should_exit: false,
            working_dir,
            home_dir,
            identity,
            history: VecDeque::new(),
            history_capacity: history_capacity.max(1),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Resolve a user-supplied path against the working directory.
    ///
    /// `~` and `~/...` expand to the home directory.
    pub fn resolve(&self, arg: &str) -> PathBuf {
        if arg == "~" {
            return self.home_dir.clone();
        }
        if let Some(rest) = arg.strip_prefix("~/") {
            return self.home_dir.join(rest);
        }
        self.working_dir.join(arg)
    }

    /// Move the working directory, keeping it canonical and extant.
    pub fn change_dir(&mut self, target: &Path) -> Result<()> {
        let canonical = fs::canonicalize(target)
            .with_context(|| format!("can't canonicalize {}", target.display()))?;
        if !canonical.is_dir() {
            bail!("{} is not a directory", canonical.display());
        }
        self.working_dir = canonical;
        Ok(())
    }

    /// Append a raw input line, dropping the oldest entry when full.
    pub fn record(&mut self, line: &str) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(line.to_string());
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// The last `n` history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> impl Iterator<Item = &str> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).map(String::as_str)
    }

    /// Interactive prompt, e.g. `alice@box:~/src$ `.
    pub fn prompt(&self) -> String {
        format!(
            "{}@{}:{}$ ",
            self.identity.user,
            self.identity.host,
            self.display_dir()
        )
    }

    fn display_dir(&self) -> String {
        match self.working_dir.strip_prefix(&self.home_dir) {
            Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
            Ok(rest) => format!("~/{}", rest.display()),
            Err(_) => self.working_dir.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_in(dir: &Path) -> Session {
        Session::from_parts(
            HashMap::new(),
            dir.to_path_buf(),
            dir.to_path_buf(),
            Identity {
                user: "alice".into(),
                host: "box".into(),
            },
            3,
        )
    }

    #[test]
    fn test_set_and_get_var() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = session_in(tmp.path());

        assert_eq!(session.get_var("SOME_RANDOM_ENV_VAR_12345"), None);
        session.set_var("KEY", "VALUE");
        assert_eq!(session.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_new_reads_from_process_env() {
        let session = Session::new(&ShellConfig::default());
        assert!(session.get_var("PATH").is_some());
        assert!(session.working_dir().is_dir());
    }

    #[test]
    fn test_history_evicts_oldest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = session_in(tmp.path());
        for line in ["a", "b", "c", "d"] {
            session.record(line);
        }
        assert_eq!(session.history().collect::<Vec<_>>(), ["b", "c", "d"]);
        assert_eq!(session.recent_history(2).collect::<Vec<_>>(), ["c", "d"]);
    }

    #[test]
    fn test_change_dir_rejects_missing_and_keeps_old_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = session_in(tmp.path());
        let before = session.working_dir().to_path_buf();

        assert!(session.change_dir(&tmp.path().join("missing")).is_err());
        assert_eq!(session.working_dir(), before);

        fs::write(tmp.path().join("file"), b"x").unwrap();
        assert!(session.change_dir(&tmp.path().join("file")).is_err());
        assert_eq!(session.working_dir(), before);
    }

    #[test]
    fn test_prompt_abbreviates_home() {
        let tmp = tempfile::tempdir().unwrap();
        let home = fs::canonicalize(tmp.path()).unwrap();
        fs::create_dir(home.join("src")).unwrap();
        let mut session = session_in(&home);
        assert_eq!(session.prompt(), "alice@box:~$ ");

        session.change_dir(&home.join("src")).unwrap();
        assert_eq!(session.prompt(), "alice@box:~/src$ ");
    }

    #[test]
    fn test_resolve_expands_tilde() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session_in(tmp.path());
        assert_eq!(session.resolve("~"), tmp.path());
        assert_eq!(session.resolve("~/x"), tmp.path().join("x"));
        assert_eq!(session.resolve("y"), tmp.path().join("y"));
    }
}
