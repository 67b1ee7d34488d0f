use super::BuiltinCommand;
use crate::error::ShellError;
use crate::session::Session;
use anyhow::{Context, Result, bail};
use argh::FromArgs;
use chrono::{DateTime, Local};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

#[derive(FromArgs)]
/// List directory contents.
pub struct Ls {
    #[argh(positional)]
    /// directory to list; defaults to the current directory.
    pub path: Option<String>,

    #[argh(switch, short = 'l')]
    /// use a long listing format.
    pub long: bool,

    #[argh(switch, short = 'a')]
    /// do not ignore entries starting with `.`.
    pub all: bool,
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    const BUNDLED_SWITCHES: bool = true;

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let path = match &self.path {
            Some(p) => session.resolve(p),
            None => session.working_dir().to_path_buf(),
        };
        let read = fs::read_dir(&path).map_err(|_| {
            ShellError::NotFound(format!(
                "ls: cannot access '{}': No such file or directory",
                path.display()
            ))
        })?;

        let mut names: Vec<String> = read
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| self.all || !n.starts_with('.'))
            .collect();
        names.sort();

        if !self.long {
            writeln!(stdout, "{}", names.join("  "))?;
            return Ok(());
        }
        for name in names {
            let meta = fs::symlink_metadata(path.join(&name))
                .with_context(|| format!("ls: cannot stat '{name}'"))?;
            let mtime: DateTime<Local> = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH).into();
            writeln!(
                stdout,
                "{}{:03o} {:8} {} {}",
                if meta.is_dir() { 'd' } else { '-' },
                permission_bits(&meta),
                meta.len(),
                mtime.format("%b %d %H:%M"),
                name
            )?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() { 0o444 } else { 0o666 }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the home directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative, `..` or `~`.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let Some(target) = self.target.filter(|t| !t.is_empty()) else {
            let home = session.home_dir().to_path_buf();
            return session.change_dir(&home);
        };

        let new_dir = if target == ".." {
            session
                .working_dir()
                .parent()
                .unwrap_or(session.working_dir())
                .to_path_buf()
        } else {
            session.resolve(&target)
        };
        if !new_dir.is_dir() {
            bail!(ShellError::NotFound(format!(
                "cd: {target}: No such file or directory"
            )));
        }
        session
            .change_dir(&new_dir)
            .with_context(|| format!("cd: {target}"))
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        writeln!(stdout, "{}", session.working_dir().to_string_lossy())?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// print file(s) to stdout
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print, in order.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        if self.files.is_empty() {
            bail!(ShellError::InvalidArgument("cat: missing operand".into()));
        }
        let mut contents = Vec::with_capacity(self.files.len());
        for fname in &self.files {
            let path = session.resolve(fname);
            if path.is_dir() {
                bail!(ShellError::InvalidArgument(format!("cat: {fname}: Is a directory")));
            }
            let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    ShellError::NotFound(format!("cat: {fname}: No such file or directory"))
                }
                _ => ShellError::InvalidArgument(format!("cat: {fname}: {e}")),
            })?;
            contents.push(text);
        }
        write!(stdout, "{}", contents.join("\n"))?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
pub struct Echo {
    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Create directories, including missing parents.
pub struct Mkdir {
    #[argh(positional, greedy)]
    /// directories to create.
    pub dirs: Vec<String>,
}

impl BuiltinCommand for Mkdir {
    fn name() -> &'static str {
        "mkdir"
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        if self.dirs.is_empty() {
            bail!(ShellError::InvalidArgument("mkdir: missing operand".into()));
        }
        for dir in &self.dirs {
            fs::create_dir_all(session.resolve(dir)).with_context(|| format!("mkdir: {dir}"))?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Remove files or directories.
pub struct Rm {
    #[argh(switch, short = 'r')]
    /// remove directories and their contents recursively.
    pub recursive: bool,

    #[argh(switch, short = 'f')]
    /// ignore nonexistent files.
    pub force: bool,

    #[argh(positional)]
    /// paths to remove.
    pub targets: Vec<String>,
}

impl BuiltinCommand for Rm {
    fn name() -> &'static str {
        "rm"
    }

    const BUNDLED_SWITCHES: bool = true;

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        if self.targets.is_empty() {
            bail!(ShellError::InvalidArgument("rm: missing operand".into()));
        }
        for target in &self.targets {
            let path = session.resolve(target);
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(_) if self.force => continue,
                Err(_) => bail!(ShellError::NotFound(format!(
                    "rm: cannot remove '{target}': No such file or directory"
                ))),
            };
            let removed = if meta.is_dir() {
                if !self.recursive {
                    bail!(ShellError::InvalidArgument(format!("rm: {target}: is a directory")));
                }
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.with_context(|| format!("rm: {target}"))?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Copy a file, or a directory recursively.
pub struct Cp {
    #[argh(positional)]
    /// source path followed by the destination; an existing directory
    /// receives the copy inside it.
    pub paths: Vec<String>,
}

impl BuiltinCommand for Cp {
    fn name() -> &'static str {
        "cp"
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let (source_arg, dest_arg) = two_operands("cp", &self.paths)?;
        let source = session.resolve(source_arg);
        let mut dest = session.resolve(dest_arg);
        if !source.exists() {
            bail!(ShellError::NotFound(format!(
                "cp: cannot stat '{source_arg}': No such file or directory"
            )));
        }
        if dest.is_dir() {
            if let Some(name) = source.file_name() {
                dest = dest.join(name);
            }
        }
        if source.is_dir() {
            copy_tree(&source, &dest).with_context(|| format!("cp: {source_arg}"))?;
        } else {
            fs::copy(&source, &dest).with_context(|| format!("cp: {source_arg}"))?;
        }
        Ok(())
    }
}

/// Split `<source> <dest>` operands, with coreutils-style messages.
fn two_operands<'a>(cmd: &str, paths: &'a [String]) -> Result<(&'a str, &'a str)> {
    match paths {
        [source, dest] => Ok((source.as_str(), dest.as_str())),
        [_, _, extra, ..] => bail!(ShellError::InvalidArgument(format!(
            "{cmd}: extra operand '{extra}'"
        ))),
        _ => bail!(ShellError::InvalidArgument(format!("{cmd}: missing operand"))),
    }
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    if dest.starts_with(source) {
        bail!("cannot copy a directory into itself");
    }
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(source)?;
        let out: PathBuf = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}

#[derive(FromArgs)]
/// Move or rename a file or directory.
pub struct Mv {
    #[argh(positional)]
    /// source path followed by the destination; an existing directory
    /// receives the entry inside it.
    pub paths: Vec<String>,
}

impl BuiltinCommand for Mv {
    fn name() -> &'static str {
        "mv"
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let (source_arg, dest_arg) = two_operands("mv", &self.paths)?;
        let source = session.resolve(source_arg);
        let mut dest = session.resolve(dest_arg);
        if fs::symlink_metadata(&source).is_err() {
            bail!(ShellError::NotFound(format!(
                "mv: cannot stat '{source_arg}': No such file or directory"
            )));
        }
        if dest.is_dir() {
            if let Some(name) = source.file_name() {
                dest = dest.join(name);
            }
        }
        fs::rename(&source, &dest).with_context(|| format!("mv: {source_arg}"))?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Create empty files or update their modification time.
pub struct Touch {
    #[argh(positional, greedy)]
    /// files to touch.
    pub files: Vec<String>,
}

impl BuiltinCommand for Touch {
    fn name() -> &'static str {
        "touch"
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        for fname in &self.files {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(session.resolve(fname))
                .with_context(|| format!("touch: {fname}"))?;
            file.set_modified(SystemTime::now())
                .with_context(|| format!("touch: {fname}"))?;
        }
        Ok(())
    }
}
