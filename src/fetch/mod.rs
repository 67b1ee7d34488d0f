//! Remote artifact fetching: resolve a GitHub reference, download the archive,
//! extract it and install the result into a working directory.
//!
//! Every operation runs `Resolving -> Downloading -> Extracting/Installing`.
//! Temporary files and staging directories are held by `tempfile` guards
//! created inside the working directory, so whichever way an operation
//! returns nothing it created in an earlier state is left behind.

pub mod archive;
pub mod http;
pub mod reference;
pub mod release;

use crate::config::{DEFAULT_BRANCH, LATEST_RELEASE, ShellConfig};
use crate::error::ShellError;
use archive::ArchiveKind;
use http::HttpClient;
use reference::RepoReference;
use release::{ReleaseAsset, ReleaseManifest, ReleaseTag, RepositoryManifest, select_asset};
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where a successful clone landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub installed_path: PathBuf,
}

/// What a release download left in the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// A published archive asset was unpacked into the directory.
    Extracted { into: PathBuf },
    /// No assets were published; the tag's source archive was unpacked.
    SourceExtracted { into: PathBuf },
    /// A non-archive asset was kept as is.
    Downloaded { file: PathBuf },
}

pub struct Fetcher {
    http: Box<dyn HttpClient>,
    api_base: String,
    web_base: String,
}

impl Fetcher {
    pub fn new(config: &ShellConfig, http: Box<dyn HttpClient>) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            web_base: config.web_base.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the branch archive of a repository and install it as
    /// `<workdir>/<repo>`, replacing whatever was there.
    ///
    /// The branch is taken from `branch`, else from a `/tree/<branch>` URL,
    /// else from the repository's default branch.
    pub fn clone_repository(
        &self,
        url: &str,
        branch: Option<&str>,
        workdir: &Path,
    ) -> Result<FetchResult, ShellError> {
        let reference = RepoReference::parse_url(url)?;
        let target = workdir.join(&reference.repo);

        let branch = match branch.or(reference.branch_or_tag.as_deref()) {
            Some(b) => b.to_string(),
            None => self.default_branch(&reference)?,
        };
        info!(repo = %reference.slug(), %branch, "cloning into '{}'", reference.repo);

        let archive_url = format!(
            "{}/{}/archive/refs/heads/{branch}.zip",
            self.web_base,
            reference.slug()
        );
        let mut download = temp_file_in(workdir, &format!(".{}-", reference.repo), ".zip")?;
        self.download(&archive_url, download.as_file_mut())?;

        let staging = staging_dir_in(workdir)?;
        archive::extract_zip(download.path(), staging.path())?;
        let root_name = format!("{}-{}", reference.repo, branch.replace('/', "-"));
        let extracted = locate_root(staging.path(), &root_name)?;
        install_dir(&extracted, &target, staging.path())?;

        info!(path = %target.display(), "clone installed");
        Ok(FetchResult {
            installed_path: target,
        })
    }

    /// Download a release of `slug` (`owner/repo[@tag]`) into `workdir`.
    ///
    /// `tag` of `None` or `"latest"` selects the most recent release.
    pub fn download_release(
        &self,
        slug: &str,
        tag: Option<&str>,
        workdir: &Path,
    ) -> Result<ReleaseOutcome, ShellError> {
        let reference = RepoReference::parse_slug(slug)?;
        let tag = match tag.or(reference.branch_or_tag.as_deref()) {
            None | Some(LATEST_RELEASE) => ReleaseTag::Latest,
            Some(t) => ReleaseTag::Tagged(t),
        };

        let manifest_url = format!(
            "{}/repos/{}/{}",
            self.api_base,
            reference.slug(),
            tag.endpoint()
        );
        let manifest: ReleaseManifest = self.fetch_json(&manifest_url)?;
        info!(repo = %reference.slug(), tag = %manifest.tag_name, assets = manifest.assets.len(), "release resolved");

        match select_asset(&manifest) {
            Some(asset) => self.install_asset(&asset, workdir),
            None => {
                let asset = ReleaseAsset::new(
                    format!("{}-{}.zip", reference.repo, manifest.tag_name.replace('/', "-")),
                    format!(
                        "{}/{}/archive/refs/tags/{}.zip",
                        self.web_base,
                        reference.slug(),
                        manifest.tag_name
                    ),
                );
                match self.install_asset(&asset, workdir)? {
                    ReleaseOutcome::Extracted { into } => Ok(ReleaseOutcome::SourceExtracted { into }),
                    other => Ok(other),
                }
            }
        }
    }

    fn install_asset(
        &self,
        asset: &ReleaseAsset,
        workdir: &Path,
    ) -> Result<ReleaseOutcome, ShellError> {
        asset.validate_name()?;
        info!(asset = %asset.name, kind = ?asset.kind, "downloading release asset");

        let mut download = temp_file_in(workdir, &format!(".{}.", asset.name), ".part")?;
        self.download(&asset.download_url, download.as_file_mut())?;

        if asset.kind == ArchiveKind::Other {
            let file = workdir.join(&asset.name);
            download.persist(&file).map_err(|e| ShellError::Io(e.error))?;
            return Ok(ReleaseOutcome::Downloaded { file });
        }

        let staging = staging_dir_in(workdir)?;
        let tree = staging.path().join("tree");
        let backup = staging.path().join("backup");
        fs::create_dir(&tree)?;
        fs::create_dir(&backup)?;
        archive::extract(asset.kind, download.path(), &tree)?;
        merge_tree(&tree, workdir, &backup)?;
        Ok(ReleaseOutcome::Extracted {
            into: workdir.to_path_buf(),
        })
    }

    fn default_branch(&self, reference: &RepoReference) -> Result<String, ShellError> {
        let url = format!("{}/repos/{}", self.api_base, reference.slug());
        let manifest: RepositoryManifest = self.fetch_json(&url)?;
        Ok(manifest
            .default_branch
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| {
                debug!("repository manifest has no default_branch, using {DEFAULT_BRANCH}");
                DEFAULT_BRANCH.to_string()
            }))
    }

    fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ShellError> {
        let mut body = Vec::new();
        self.http
            .get(url)?
            .read_to_end(&mut body)
            .map_err(|e| ShellError::network(url, e))?;
        serde_json::from_slice(&body).map_err(|source| ShellError::Manifest {
            url: url.to_string(),
            source,
        })
    }

    fn download(&self, url: &str, out: &mut File) -> Result<u64, ShellError> {
        let mut body = self.http.get_stream(url)?;
        let bytes = io::copy(&mut body, out).map_err(|e| ShellError::network(url, e))?;
        out.sync_all()?;
        debug!(%url, bytes, "download complete");
        Ok(bytes)
    }
}

fn temp_file_in(dir: &Path, prefix: &str, suffix: &str) -> Result<NamedTempFile, ShellError> {
    Ok(tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)?)
}

fn staging_dir_in(dir: &Path) -> Result<TempDir, ShellError> {
    Ok(tempfile::Builder::new().prefix(".winterm-staging-").tempdir_in(dir)?)
}

/// Find the archive's root directory inside `staging`.
///
/// GitHub names it `<repo>-<ref>`, but normalizes some refs (a leading `v`
/// on tags is dropped), so a lone top-level directory is accepted too.
fn locate_root(staging: &Path, expected: &str) -> Result<PathBuf, ShellError> {
    let candidate = staging.join(expected);
    if candidate.is_dir() {
        return Ok(candidate);
    }
    let dirs: Vec<PathBuf> = fs::read_dir(staging)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    match dirs.as_slice() {
        [only] => Ok(only.clone()),
        _ => Err(ShellError::NotFound(format!(
            "archive does not contain the expected directory '{expected}'"
        ))),
    }
}

/// Put `extracted` at `target`.
///
/// A previous `target` is first moved into `staging` so it disappears with
/// the staging guard; if the final rename fails it is moved back.
fn install_dir(extracted: &Path, target: &Path, staging: &Path) -> Result<(), ShellError> {
    install_dir_with(extracted, target, staging, |from, to| fs::rename(from, to))
}

fn install_dir_with(
    extracted: &Path,
    target: &Path,
    staging: &Path,
    rename: impl Fn(&Path, &Path) -> io::Result<()>,
) -> Result<(), ShellError> {
    let previous = staging.join(".previous");
    let had_previous = fs::symlink_metadata(target).is_ok();
    if had_previous {
        warn!(path = %target.display(), "replacing existing directory");
        rename(target, &previous)?;
    }
    if let Err(e) = rename(extracted, target) {
        if had_previous && rename(&previous, target).is_err() {
            warn!(path = %target.display(), "could not restore previous directory");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Merge the extracted `tree` into `dest` file by file.
///
/// Directories are merged, so entries of `dest` the archive does not name
/// are kept. Files the archive does name are replaced; the old versions are
/// parked in `backup` until the whole merge succeeds. A failure undoes every
/// step already taken, leaving `dest` as it was.
fn merge_tree(tree: &Path, dest: &Path, backup: &Path) -> Result<(), ShellError> {
    let mut merge = Merge {
        backup,
        journal: Vec::new(),
    };
    let result = merge.apply(tree, dest, |from, to| fs::rename(from, to));
    if result.is_err() {
        merge.rollback();
    }
    result
}

enum Step {
    CreatedDir(PathBuf),
    Placed {
        target: PathBuf,
        parked: Option<PathBuf>,
    },
}

struct Merge<'a> {
    backup: &'a Path,
    journal: Vec<Step>,
}

impl Merge<'_> {
    fn apply(
        &mut self,
        tree: &Path,
        dest: &Path,
        rename: impl Fn(&Path, &Path) -> io::Result<()>,
    ) -> Result<(), ShellError> {
        for entry in WalkDir::new(tree).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let Ok(rel) = entry.path().strip_prefix(tree) else {
                continue;
            };
            let target = dest.join(rel);
            let existing = fs::symlink_metadata(&target).ok();

            if entry.file_type().is_dir() {
                match existing {
                    Some(meta) if meta.is_dir() => {}
                    Some(_) => return Err(conflict(&target, "exists and is not a directory")),
                    None => {
                        fs::create_dir(&target)?;
                        self.journal.push(Step::CreatedDir(target));
                    }
                }
                continue;
            }

            let parked = match existing {
                Some(meta) if meta.is_dir() => {
                    return Err(conflict(&target, "is a directory"));
                }
                Some(_) => {
                    let parked = self.backup.join(self.journal.len().to_string());
                    rename(&target, &parked)?;
                    Some(parked)
                }
                None => None,
            };
            self.journal.push(Step::Placed {
                target: target.clone(),
                parked,
            });
            rename(entry.path(), &target)?;
            debug!(path = %target.display(), "installed");
        }
        Ok(())
    }

    fn rollback(&mut self) {
        while let Some(step) = self.journal.pop() {
            let undone = match &step {
                Step::CreatedDir(dir) => fs::remove_dir(dir),
                Step::Placed { target, parked } => {
                    match fs::remove_file(target) {
                        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                        _ => match parked {
                            Some(parked) => fs::rename(parked, target),
                            None => Ok(()),
                        },
                    }
                }
            };
            if let Err(e) = undone {
                let path = match &step {
                    Step::CreatedDir(p) | Step::Placed { target: p, .. } => p,
                };
                warn!(path = %path.display(), error = %e, "could not undo install step");
            }
        }
    }
}

fn conflict(target: &Path, what: &str) -> ShellError {
    ShellError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("cannot install '{}': {what}", target.display()),
    ))
}
