use super::FetchCommand;
use crate::error::ShellError;
use crate::fetch::{Fetcher, ReleaseOutcome};
use crate::session::Session;
use anyhow::Result;
use argh::FromArgs;
use std::io::Write;
use tracing::warn;

#[derive(FromArgs)]
/// Clone a GitHub repository by downloading its branch archive.
/// Usage: git_clone [repository_url]
pub struct GitClone {
    #[argh(positional)]
    /// repository URL, e.g. https://github.com/owner/repo.
    pub url: Option<String>,

    #[argh(option, short = 'b')]
    /// branch to fetch instead of the default branch.
    pub branch: Option<String>,
}

impl FetchCommand for GitClone {
    fn name() -> &'static str {
        "git_clone"
    }

    fn execute(
        self,
        fetcher: &Fetcher,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<()> {
        let Some(url) = self.url else {
            writeln!(stdout, "Usage: git_clone [repository_url]")?;
            return Ok(());
        };
        match fetcher.clone_repository(&url, self.branch.as_deref(), session.working_dir()) {
            Ok(result) => writeln!(
                stdout,
                "Repository cloned to {}",
                result.installed_path.display()
            )?,
            Err(e @ ShellError::HostUnsupported { .. }) => writeln!(stdout, "{e}")?,
            Err(e) => {
                warn!(%url, error = %e, "clone failed");
                writeln!(stdout, "Error cloning repository: {e}")?
            }
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Download a GitHub release into the current directory.
/// Usage: download_release [owner/repo] [tag?]
pub struct DownloadRelease {
    #[argh(positional)]
    /// repository slug such as owner/repo, then an optional release tag
    /// (the latest release when omitted).
    pub args: Vec<String>,
}

impl FetchCommand for DownloadRelease {
    fn name() -> &'static str {
        "download_release"
    }

    fn execute(
        self,
        fetcher: &Fetcher,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<()> {
        let (repo, tag) = match self.args.as_slice() {
            [repo] => (repo, None),
            [repo, tag] => (repo, Some(tag.as_str())),
            _ => {
                writeln!(stdout, "Usage: download_release [owner/repo] [tag?]")?;
                return Ok(());
            }
        };
        match fetcher.download_release(repo, tag, session.working_dir()) {
            Ok(ReleaseOutcome::Extracted { into }) => {
                writeln!(stdout, "Release extracted to {}", into.display())?
            }
            Ok(ReleaseOutcome::SourceExtracted { into }) => {
                writeln!(stdout, "Source code extracted to {}", into.display())?
            }
            Ok(ReleaseOutcome::Downloaded { file }) => {
                writeln!(stdout, "Release downloaded to {}", file.display())?
            }
            Err(e) => {
                warn!(%repo, error = %e, "release download failed");
                writeln!(stdout, "Error downloading release: {e}")?
            }
        }
        Ok(())
    }
}
