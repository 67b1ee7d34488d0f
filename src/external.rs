use crate::command::ExecutableCommand;
use crate::config::ExternalPolicy;
use crate::error::ShellError;
use crate::session::Session;
use anyhow::Result;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Command that is not a builtin: a host process launched from `PATH`.
pub struct ExternalCommand {
    name: String,
    args: Vec<String>,
    policy: ExternalPolicy,
}

impl ExternalCommand {
    pub fn new(name: impl Into<String>, args: &[&str], policy: ExternalPolicy) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|x| x.to_string()).collect(),
            policy,
        }
    }

    fn not_found(&self) -> ShellError {
        ShellError::NotFound(format!("Command not found: {}", self.name))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        if !self.policy.permits(&self.name) {
            return Err(ShellError::PermissionDenied(format!(
                "{}: not permitted by external command policy",
                self.name
            ))
            .into());
        }

        let search_paths = session.get_var("PATH").unwrap_or_default();
        let executable = match find_command_path(
            OsStr::new(&search_paths),
            session.working_dir(),
            Path::new(&self.name),
        ) {
            Some(path) => path.into_owned(),
            None => return Err(self.not_found().into()),
        };
        debug!(command = %self.name, path = %executable.display(), "launching external command");

        let output = std::process::Command::new(&executable)
            .args(&self.args)
            .env_clear()
            .envs(session.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(session.working_dir())
            .output();
        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(self.not_found().into()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(ShellError::PermissionDenied(format!(
                    "{}: Permission denied",
                    self.name
                ))
                .into());
            }
            Err(e) => return Err(ShellError::Io(e).into()),
        };

        if !output.stdout.is_empty() {
            stdout.write_all(&output.stdout)?;
        } else if !output.stderr.is_empty() {
            write!(stdout, "Error: {}", String::from_utf8_lossy(&output.stderr))?;
        }
        Ok(())
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh` or `./foo`): resolved
///   against `cwd`, returned if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup or the working directory.
pub fn find_command_path<'a>(
    search_paths: &OsStr,
    cwd: &Path,
    path: &'a Path,
) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(x), None) if !path.starts_with(".") => {
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        _ => {
            let joined = cwd.join(path);
            find_by_path(&joined).map(|p| Cow::Owned(p.to_path_buf()))
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let path = dir.join(cmd);
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
