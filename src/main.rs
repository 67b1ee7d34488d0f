use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use winterm::Interpreter;
use winterm::config::ShellConfig;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WINTERM_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ShellConfig::from_env();
    let mut shell = match Interpreter::from_config(&config) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("winterm: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    match shell.repl() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("winterm: {e}");
            ExitCode::FAILURE
        }
    }
}
