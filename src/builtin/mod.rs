use crate::command::{CommandFactory, ExecutableCommand};
use crate::fetch::Fetcher;
use crate::session::Session;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::io::Write;
use std::marker::PhantomData;
use std::rc::Rc;

mod fetch;
mod files;
mod search;
mod system;

pub(crate) use fetch::{DownloadRelease, GitClone};
pub(crate) use files::{Cat, Cd, Cp, Echo, Ls, Mkdir, Mv, Pwd, Rm, Touch};
pub(crate) use search::{Du, Find, Grep};
pub(crate) use system::{
    Clear, Date, Df, Exit, Help, History, Kill, Neofetch, Ps, Uname, Whoami,
};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Additional names dispatching to the same command.
    fn aliases() -> &'static [&'static str] {
        &[]
    }

    /// Accept `-la` as shorthand for `-l -a`. Only for commands whose
    /// options are all single-letter switches.
    const BUNDLED_SWITCHES: bool = false;

    /// Executes the command, writing its output to `stdout`.
    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        <T as BuiltinCommand>::execute(*self, stdout, session)
    }
}

/// Output of `argh` for `--help` or unparsable arguments.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        if self.is_error {
            anyhow::bail!("{}", self.output.trim_end());
        }
        stdout.write_all(self.output.as_bytes())?;
        Ok(())
    }
}

/// Factory allows creating instances of a builtin from its arguments.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

fn parse_args<T: FromArgs>(
    name: &str,
    args: &[&str],
    bundled: bool,
) -> std::result::Result<T, Box<dyn ExecutableCommand>> {
    let expanded;
    let args = if bundled {
        expanded = expand_bundled_switches(args);
        expanded.iter().map(String::as_str).collect::<Vec<_>>()
    } else {
        args.to_vec()
    };
    T::from_args(&[name], &args).map_err(|EarlyExit { output, status }| {
        Box::new(InvalidArgs {
            output,
            is_error: status.is_err(),
        }) as Box<dyn ExecutableCommand>
    })
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn names(&self) -> Vec<&'static str> {
        std::iter::once(T::name())
            .chain(T::aliases().iter().copied())
            .collect()
    }

    fn create(&self, name: &str, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match parse_args::<T>(name, args, T::BUNDLED_SWITCHES) {
            Ok(cmd) => Box::new(cmd),
            Err(invalid) => invalid,
        }
    }
}

/// Builtins that need the remote artifact fetcher.
pub(crate) trait FetchCommand: Sized + FromArgs {
    fn name() -> &'static str;

    fn execute(self, fetcher: &Fetcher, stdout: &mut dyn Write, session: &mut Session)
    -> Result<()>;
}

struct WithFetcher<T> {
    cmd: T,
    fetcher: Rc<Fetcher>,
}

impl<T: FetchCommand> ExecutableCommand for WithFetcher<T> {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let Self { cmd, fetcher } = *self;
        cmd.execute(&fetcher, stdout, session)
    }
}

/// Factory handing a shared [`Fetcher`] to each command it creates.
pub(crate) struct FetchFactory<T> {
    fetcher: Rc<Fetcher>,
    _phantom: PhantomData<T>,
}

impl<T> FetchFactory<T> {
    pub(crate) fn new(fetcher: Rc<Fetcher>) -> Self {
        Self {
            fetcher,
            _phantom: PhantomData,
        }
    }
}

impl<T: FetchCommand + 'static> CommandFactory for FetchFactory<T> {
    fn names(&self) -> Vec<&'static str> {
        vec![T::name()]
    }

    fn create(&self, name: &str, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match parse_args::<T>(name, args, false) {
            Ok(cmd) => Box::new(WithFetcher {
                cmd,
                fetcher: Rc::clone(&self.fetcher),
            }),
            Err(invalid) => invalid,
        }
    }
}

/// Every builtin the interactive shell ships with.
pub(crate) fn default_factories(fetcher: Rc<Fetcher>) -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Ls>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Cat>::default()),
        Box::new(Factory::<Echo>::default()),
        Box::new(Factory::<Mkdir>::default()),
        Box::new(Factory::<Rm>::default()),
        Box::new(Factory::<Cp>::default()),
        Box::new(Factory::<Mv>::default()),
        Box::new(Factory::<Touch>::default()),
        Box::new(Factory::<Clear>::default()),
        Box::new(Factory::<Neofetch>::default()),
        Box::new(Factory::<Whoami>::default()),
        Box::new(Factory::<Date>::default()),
        Box::new(Factory::<Uname>::default()),
        Box::new(Factory::<Df>::default()),
        Box::new(Factory::<Du>::default()),
        Box::new(Factory::<Find>::default()),
        Box::new(Factory::<Grep>::default()),
        Box::new(Factory::<Ps>::default()),
        Box::new(Factory::<Kill>::default()),
        Box::new(Factory::<History>::default()),
        Box::new(FetchFactory::<GitClone>::new(Rc::clone(&fetcher))),
        Box::new(FetchFactory::<DownloadRelease>::new(fetcher)),
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<Exit>::default()),
    ]
}

/// Split `-la` into `-l -a`; anything else passes through.
fn expand_bundled_switches(args: &[&str]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg.strip_prefix('-') {
            Some(flags)
                if flags.len() > 1
                    && !flags.starts_with('-')
                    && flags.chars().all(|c| c.is_ascii_alphabetic()) =>
            {
                out.extend(flags.chars().map(|c| format!("-{c}")));
            }
            _ => out.push(arg.to_string()),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::session::{Identity, Session};
    use std::collections::HashMap;
    use std::path::Path;

    pub(crate) fn session_in(dir: &Path) -> Session {
        let dir = std::fs::canonicalize(dir).unwrap();
        Session::from_parts(
            HashMap::new(),
            dir.clone(),
            dir,
            Identity {
                user: "alice".into(),
                host: "box".into(),
            },
            100,
        )
    }

    /// Run a builtin's argh parser and executor, returning its output.
    pub(crate) fn run<T: super::BuiltinCommand + 'static>(
        session: &mut Session,
        args: &[&str],
    ) -> anyhow::Result<String> {
        use crate::command::CommandFactory;
        let factory = super::Factory::<T>::default();
        let mut out = Vec::new();
        factory.create(T::name(), args).execute(&mut out, session)?;
        Ok(String::from_utf8(out).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_switches_are_split() {
        assert_eq!(expand_bundled_switches(&["-la", "x"]), ["-l", "-a", "x"]);
        assert_eq!(expand_bundled_switches(&["-l"]), ["-l"]);
        assert_eq!(expand_bundled_switches(&["--all"]), ["--all"]);
        assert_eq!(expand_bundled_switches(&["-12"]), ["-12"]);
        assert_eq!(expand_bundled_switches(&["-"]), ["-"]);
    }

    #[test]
    fn factory_answers_to_aliases() {
        let names = Factory::<Clear>::default().names();
        assert_eq!(names, ["clear", "cls"]);
    }
}
