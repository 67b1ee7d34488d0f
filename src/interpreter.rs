use crate::builtin::default_factories;
use crate::command::{Command, CommandFactory, ExecutableCommand};
use crate::config::{ExternalPolicy, ShellConfig};
use crate::external::ExternalCommand;
use crate::fetch::Fetcher;
use crate::fetch::http::GithubHttp;
use crate::session::Session;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// What one input line produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text to show the user; may be empty.
    Output(String),
    /// The line asked the shell to terminate.
    Exit,
}

/// Line-oriented command interpreter.
///
/// Each line is split on whitespace, recorded in the session history and
/// dispatched to a builtin by name, or to an external program when no builtin
/// matches. Failures are rendered as text; `execute` itself never fails.
///
/// Example
/// ```no_run
/// use winterm::{Interpreter, Outcome, config::ShellConfig};
/// let mut sh = Interpreter::from_config(&ShellConfig::default()).unwrap();
/// assert!(matches!(sh.execute("echo hello"), Outcome::Output(s) if s == "hello"));
/// ```
pub struct Interpreter {
    session: Session,
    table: HashMap<&'static str, Rc<dyn CommandFactory>>,
    policy: ExternalPolicy,
}

impl Interpreter {
    /// Create an interpreter with the default builtins and the given fetcher.
    pub fn new(session: Session, fetcher: Fetcher, config: &ShellConfig) -> Self {
        let mut table = HashMap::new();
        for factory in default_factories(Rc::new(fetcher)) {
            let factory: Rc<dyn CommandFactory> = Rc::from(factory);
            for name in factory.names() {
                table.insert(name, Rc::clone(&factory));
            }
        }
        Self {
            session,
            table,
            policy: config.external_policy.clone(),
        }
    }

    /// Interpreter for the current process: live session and GitHub client.
    pub fn from_config(config: &ShellConfig) -> anyhow::Result<Self> {
        let http = GithubHttp::from_config(config)?;
        let fetcher = Fetcher::new(config, Box::new(http));
        Ok(Self::new(Session::new(config), fetcher, config))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Run one raw input line.
    pub fn execute(&mut self, line: &str) -> Outcome {
        let Some(command) = Command::parse(line) else {
            return Outcome::Output(String::new());
        };
        self.session.record(line);
        debug!(command = %command.name, args = ?command.args, "dispatch");

        let args = command.arg_refs();
        let cmd: Box<dyn ExecutableCommand> = match self.table.get(command.name.as_str()) {
            Some(factory) => factory.create(&command.name, &args),
            None => Box::new(ExternalCommand::new(
                command.name.as_str(),
                &args,
                self.policy.clone(),
            )),
        };

        let mut out = Vec::new();
        if let Err(e) = cmd.execute(&mut out, &mut self.session) {
            debug!(command = %command.name, error = %e, "command failed");
            if !out.is_empty() && !out.ends_with(b"\n") {
                out.push(b'\n');
            }
            out.extend_from_slice(format!("{e:#}").as_bytes());
        }

        if self.session.should_exit {
            return Outcome::Exit;
        }
        let text = String::from_utf8_lossy(&out);
        Outcome::Output(text.trim_end_matches(['\n', '\r']).to_string())
    }

    /// Interactive loop on the controlling terminal.
    ///
    /// Returns once `exit` runs or input reaches end of file.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        println!("WinTerm v1.0");
        println!("Type 'help' for available commands");
        println!("Type 'exit' to quit\n");

        loop {
            match rl.readline(&self.session.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    match self.execute(&line) {
                        Outcome::Exit => break,
                        Outcome::Output(text) if !text.is_empty() => println!("{text}"),
                        Outcome::Output(_) => {}
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("Use 'exit' to quit");
                }
                Err(ReadlineError::Eof) => {
                    println!("Exiting...");
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShellError;
    use crate::fetch::http::HttpClient;
    use crate::session::Identity;
    use std::io::Read;
    use std::path::Path;

    struct NoNetwork;

    impl HttpClient for NoNetwork {
        fn get(&self, url: &str) -> Result<Box<dyn Read>, ShellError> {
            Err(ShellError::network(url, "offline"))
        }
    }

    fn interpreter_in(dir: &Path, policy: ExternalPolicy) -> Interpreter {
        let dir = std::fs::canonicalize(dir).unwrap();
        let mut vars = HashMap::new();
        vars.insert("PATH".to_string(), std::env::var("PATH").unwrap_or_default());
        let session = Session::from_parts(
            vars,
            dir.clone(),
            dir,
            Identity {
                user: "alice".into(),
                host: "box".into(),
            },
            1000,
        );
        let config = ShellConfig {
            external_policy: policy,
            ..ShellConfig::default()
        };
        let fetcher = Fetcher::new(&config, Box::new(NoNetwork));
        Interpreter::new(session, fetcher, &config)
    }

    fn output(outcome: Outcome) -> String {
        match outcome {
            Outcome::Output(text) => text,
            Outcome::Exit => panic!("unexpected exit"),
        }
    }

    #[test]
    fn test_empty_line_is_not_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sh = interpreter_in(tmp.path(), ExternalPolicy::Unrestricted);

        assert_eq!(sh.execute(""), Outcome::Output(String::new()));
        assert_eq!(sh.execute("   \t "), Outcome::Output(String::new()));
        assert_eq!(sh.session().history().len(), 0);
    }

    #[test]
    fn test_every_line_recorded_once_even_on_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sh = interpreter_in(tmp.path(), ExternalPolicy::Unrestricted);

        sh.execute("echo  hi");
        sh.execute("cat missing.txt");
        sh.execute("no_such_binary_xyz --flag");
        let history: Vec<&str> = sh.session().history().collect();
        assert_eq!(
            history,
            ["echo  hi", "cat missing.txt", "no_such_binary_xyz --flag"]
        );
    }

    #[test]
    fn test_unknown_command() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sh = interpreter_in(tmp.path(), ExternalPolicy::Unrestricted);

        assert_eq!(
            output(sh.execute("winterm_missing_cmd bar")),
            "Command not found: winterm_missing_cmd"
        );
    }

    #[test]
    fn test_builtins_and_aliases_dispatch() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sh = interpreter_in(tmp.path(), ExternalPolicy::Unrestricted);

        assert_eq!(output(sh.execute("echo hello   world")), "hello world");
        assert_eq!(output(sh.execute("cls")), "\x1b[2J\x1b[H");
        assert_eq!(
            output(sh.execute("cat nope")),
            "cat: nope: No such file or directory"
        );
        assert!(output(sh.execute("ls --help")).contains("Usage: ls"));
    }

    #[test]
    fn test_cd_changes_session_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        let mut sh = interpreter_in(tmp.path(), ExternalPolicy::Unrestricted);

        assert_eq!(output(sh.execute("cd sub")), "");
        assert!(sh.session().working_dir().ends_with("sub"));
        assert!(output(sh.execute("pwd")).ends_with("sub"));
    }

    #[test]
    fn test_exit_ends_session() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sh = interpreter_in(tmp.path(), ExternalPolicy::Unrestricted);

        assert_eq!(sh.execute("exit"), Outcome::Exit);
        assert_eq!(sh.session().history().collect::<Vec<_>>(), ["exit"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_external_runs_in_session_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("marker"), "").unwrap();
        let mut sh = interpreter_in(tmp.path(), ExternalPolicy::Unrestricted);

        let listing = output(sh.execute("sh -c ls"));
        assert_eq!(listing, "marker");
    }

    #[cfg(unix)]
    #[test]
    fn test_allow_list_blocks_other_programs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sh = interpreter_in(tmp.path(), ExternalPolicy::AllowList(vec!["true".into()]));

        assert_eq!(
            output(sh.execute("sh -c ls")),
            "sh: not permitted by external command policy"
        );
        assert_eq!(output(sh.execute("true")), "");
    }
}
