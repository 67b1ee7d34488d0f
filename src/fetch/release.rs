use crate::error::ShellError;
use crate::fetch::archive::ArchiveKind;
use serde::Deserialize;

/// Subset of `GET /repos/{owner}/{repo}` the fetcher needs.
#[derive(Deserialize, Debug, Clone)]
pub struct RepositoryManifest {
    pub default_branch: Option<String>,
}

/// GitHub release metadata
#[derive(Deserialize, Debug, Clone)]
pub struct ReleaseManifest {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<AssetManifest>,
}

/// GitHub release asset
#[derive(Deserialize, Debug, Clone)]
pub struct AssetManifest {
    pub name: String,
    pub browser_download_url: String,
}

/// Which release the manifest request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseTag<'a> {
    Latest,
    Tagged(&'a str),
}

impl ReleaseTag<'_> {
    /// API path below `/repos/{owner}/{repo}`.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Latest => "releases/latest".to_string(),
            Self::Tagged(tag) => format!("releases/tags/{tag}"),
        }
    }
}

/// An artifact picked for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    pub kind: ArchiveKind,
}

impl ReleaseAsset {
    pub fn new(name: impl Into<String>, download_url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: ArchiveKind::from_file_name(&name),
            name,
            download_url: download_url.into(),
        }
    }

    /// Asset names come from the network and become local file names.
    pub fn validate_name(&self) -> Result<(), ShellError> {
        let name = self.name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ShellError::InvalidArgument(format!(
                "refusing to write release asset with unsafe name '{name}'"
            )));
        }
        Ok(())
    }
}

/// Pick the asset to download, in order: the first whose name mentions
/// `source` or `src`, then the first listed. `None` when nothing is published.
pub fn select_asset(manifest: &ReleaseManifest) -> Option<ReleaseAsset> {
    manifest
        .assets
        .iter()
        .find(|a| {
            let lower = a.name.to_lowercase();
            lower.contains("source") || lower.contains("src")
        })
        .or_else(|| manifest.assets.first())
        .map(|a| ReleaseAsset::new(&a.name, &a.browser_download_url))
}
