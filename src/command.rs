use crate::session::Session;
use anyhow::Result;
use std::io::Write;

/// One parsed input line: a command name and its arguments.
///
/// Splitting is purely on whitespace; quotes carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Parse a raw line. Returns `None` for empty or whitespace-only input.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let name = words.next()?.to_string();
        Some(Self {
            name,
            args: words.map(String::from).collect(),
        })
    }

    pub fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
/// Whatever the command writes to `stdout` becomes its rendered output; an
/// `Err` is rendered after that output.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()>;
}

/// Factory that creates a command instance for one of the names it serves.
///
/// The interpreter registers each factory under every name it returns, so
/// `create` is only ever called with one of them.
pub trait CommandFactory {
    /// Names (including aliases) the factory answers to.
    fn names(&self) -> Vec<&'static str>;

    /// Create a command instance for the provided name and arguments.
    fn create(&self, name: &str, args: &[&str]) -> Box<dyn ExecutableCommand>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_any_whitespace() {
        let cmd = Command::parse("  ls \t-l   -a ").unwrap();
        assert_eq!(cmd.name, "ls");
        assert_eq!(cmd.args, vec!["-l", "-a"]);
    }

    #[test]
    fn parse_keeps_quotes_literal() {
        let cmd = Command::parse("echo \"a b\"").unwrap();
        assert_eq!(cmd.args, vec!["\"a", "b\""]);
    }

    #[test]
    fn parse_empty_is_none() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("   \t"), None);
    }
}
