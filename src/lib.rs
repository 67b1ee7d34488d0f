//! WinTerm: an interactive command shell with a built-in GitHub fetcher.
//!
//! The shell runs a fixed set of builtins implemented in Rust (file
//! management, host information, text search) and falls back to programs found
//! on `PATH` for everything else. Two builtins, `git_clone` and
//! `download_release`, fetch repository and release archives from GitHub and
//! install them into the working directory without needing git.
//!
//! [`Interpreter`] is the entry point. [`session`] holds per-shell state,
//! [`command`] the traits builtins and external programs implement, and
//! [`fetch`] the download and install pipeline behind the fetch builtins.

mod builtin;
pub mod command;
pub mod config;
pub mod error;
mod external;
pub mod fetch;
pub mod host;
mod interpreter;
pub mod session;

pub use error::ShellError;
pub use interpreter::{Interpreter, Outcome};
