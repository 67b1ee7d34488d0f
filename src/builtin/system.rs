use super::BuiltinCommand;
use crate::config::HISTORY_DISPLAY;
use crate::error::ShellError;
use crate::host;
use crate::session::Session;
use anyhow::{Result, bail};
use argh::FromArgs;
use std::io::{self, Write};
use std::path::Path;

const PS_LIMIT: usize = 20;

const TUX: &str = r#"
        .--.
       |o_o |
       |:_/ |
      //   \ \
     (|     | )
    /'\_   _/`\
    \___)=(___/
"#;

#[derive(FromArgs)]
/// Clear the terminal screen.
pub struct Clear {}

impl BuiltinCommand for Clear {
    fn name() -> &'static str {
        "clear"
    }

    fn aliases() -> &'static [&'static str] {
        &["cls"]
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        write!(stdout, "\x1b[2J\x1b[H")?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Display system information.
pub struct Neofetch {}

impl BuiltinCommand for Neofetch {
    fn name() -> &'static str {
        "neofetch"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let uname = host::uname()?;
        let identity = session.identity();
        let title = format!("{}@{}", identity.user, identity.host);
        let memory = host::memory()
            .map(|m| format!("{:.1}GiB / {:.1}GiB", host::gib(m.used), host::gib(m.total)))
            .unwrap_or_else(|| "Unknown".into());
        let disk = host::disk_usage(Path::new("/"))
            .map(|d| format!("{:.1}GiB / {:.1}GiB", host::gib(d.used), host::gib(d.total)))
            .unwrap_or_else(|_| "Unknown".into());
        let uptime = host::uptime()
            .map(host::format_uptime)
            .unwrap_or_else(|| "Unknown".into());
        let kernel = uname.version.split('#').next().unwrap_or_default().trim();
        let var = |key: &str| session.get_var(key).unwrap_or_else(|| "Unknown".into());

        write!(stdout, "{TUX}")?;
        writeln!(stdout, "{title}")?;
        writeln!(stdout, "{}", "-".repeat(title.len()))?;
        writeln!(stdout, "OS: {} {}", uname.sysname, uname.release)?;
        writeln!(stdout, "Kernel: {kernel}")?;
        writeln!(stdout, "Uptime: {uptime}")?;
        writeln!(stdout, "Shell: {}", var("SHELL"))?;
        writeln!(stdout, "Terminal: {}", var("TERM"))?;
        writeln!(stdout, "CPU: {}", uname.machine)?;
        writeln!(stdout, "Memory: {memory}")?;
        writeln!(stdout, "Disk: {disk}")?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print the current user.
pub struct Whoami {}

impl BuiltinCommand for Whoami {
    fn name() -> &'static str {
        "whoami"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        writeln!(stdout, "{}", session.identity().user)?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print the local date and time.
pub struct Date {}

impl BuiltinCommand for Date {
    fn name() -> &'static str {
        "date"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        writeln!(stdout, "{}", chrono::Local::now().format("%a %b %d %H:%M:%S %Y"))?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print system information.
pub struct Uname {
    #[argh(switch, short = 'a')]
    /// print all fields.
    pub all: bool,

    #[argh(switch, short = 's')]
    /// print the kernel name.
    pub kernel_name: bool,

    #[argh(switch, short = 'n')]
    /// print the network node hostname.
    pub nodename: bool,

    #[argh(switch, short = 'r')]
    /// print the kernel release.
    pub kernel_release: bool,

    #[argh(switch, short = 'm')]
    /// print the machine hardware name.
    pub machine: bool,
}

impl BuiltinCommand for Uname {
    fn name() -> &'static str {
        "uname"
    }

    const BUNDLED_SWITCHES: bool = true;

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        let u = host::uname()?;
        let line = if self.all {
            format!(
                "{} {} {} {} {}",
                u.sysname, u.nodename, u.release, u.version, u.machine
            )
        } else if self.nodename {
            u.nodename
        } else if self.kernel_release {
            u.release
        } else if self.machine {
            u.machine
        } else {
            u.sysname
        };
        writeln!(stdout, "{line}")?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Display disk space usage per mounted filesystem.
pub struct Df {}

impl BuiltinCommand for Df {
    fn name() -> &'static str {
        "df"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        writeln!(stdout, "Filesystem      Size  Used  Avail  Use%  Mounted on")?;
        for mount in host::mounts()? {
            // Pseudo filesystems and unreadable mounts are skipped.
            let Ok(usage) = host::disk_usage(Path::new(&mount.mount_point)) else {
                continue;
            };
            if usage.total == 0 {
                continue;
            }
            writeln!(
                stdout,
                "{:14.14} {:4.1}G {:4.1}G {:4.1}G {:4.0}%  {}",
                mount.device,
                host::gib(usage.total),
                host::gib(usage.used),
                host::gib(usage.available),
                usage.percent_used(),
                mount.mount_point
            )?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Display running processes.
pub struct Ps {}

impl BuiltinCommand for Ps {
    fn name() -> &'static str {
        "ps"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        writeln!(stdout, "PID    CMD")?;
        for proc in host::processes()?.iter().take(PS_LIMIT - 1) {
            writeln!(stdout, "{:<6} {}", proc.pid, proc.name)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Terminate a process.
pub struct Kill {
    #[argh(positional)]
    /// process id to terminate.
    pub pid: Option<String>,
}

fn parse_pid(arg: &str) -> Result<i32, ShellError> {
    let digits = arg.strip_prefix('-').unwrap_or(arg);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ShellError::InvalidArgument(format!("kill: invalid pid '{arg}'")));
    }
    match arg.parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(ShellError::InvalidArgument(format!(
            "kill: {arg}: pid out of range"
        ))),
    }
}

impl BuiltinCommand for Kill {
    fn name() -> &'static str {
        "kill"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        let Some(arg) = self.pid else {
            bail!(ShellError::InvalidArgument("Usage: kill [pid]".into()));
        };
        let pid = parse_pid(&arg)?;
        match host::kill(pid) {
            Ok(()) => writeln!(stdout, "Process {pid} terminated")?,
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {
                bail!(ShellError::NotFound(format!("kill: ({pid}) - No such process")))
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                bail!(ShellError::PermissionDenied(format!("kill: ({pid}) - {e}")))
            }
            Err(e) => bail!("kill: {e}"),
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Show recent command history.
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        for (i, cmd) in session.recent_history(HISTORY_DISPLAY).enumerate() {
            writeln!(stdout, "{}  {}", i + 1, cmd)?;
        }
        Ok(())
    }
}

const HELP_TEXT: &str = "\
Available commands:
  ls [path] [-l] [-a]     - List directory contents
  cd [path]               - Change directory
  pwd                     - Print working directory
  cat [file...]           - Display file contents
  echo [text...]          - Display text
  mkdir [dir...]          - Create directories
  rm [file...] [-r] [-f]  - Remove files/directories
  cp [source] [dest]      - Copy files
  mv [source] [dest]      - Move/rename files
  touch [file...]         - Create empty files
  clear/cls               - Clear terminal screen
  neofetch                - Display system information
  whoami                  - Print current user
  date                    - Print date and time
  uname [-a]              - Print system information
  df                      - Display disk usage
  du [path]               - Estimate file space usage
  find [path] -name [pat] - Search for files
  grep [pattern] [file]   - Search text in files
  ps                      - Display processes
  kill [pid]              - Terminate process
  history                 - Show command history
  git_clone [url] [-b br] - Clone Git repository
  download_release [repo] [tag?] - Download GitHub release
  help                    - Show this help
  exit                    - Exit terminal

Any other command is run as an external program found on PATH.
Append --help to a builtin for its full usage.
";

#[derive(FromArgs)]
/// Show the list of commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        stdout.write_all(HELP_TEXT.as_bytes())?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        session.should_exit = true;
        Ok(())
    }
}
