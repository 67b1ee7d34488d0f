use crate::config::ShellConfig;
use crate::error::ShellError;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Streaming GET used for both manifests and archives.
pub trait HttpClient {
    /// Start a request for a small document, such as an API manifest, and
    /// hand back its body as a reader.
    ///
    /// Non-success statuses are errors; failures while reading the body
    /// surface as `io::Error` from the reader.
    fn get(&self, url: &str) -> Result<Box<dyn Read>, ShellError>;

    /// Like [`get`](Self::get), for archive bodies of arbitrary size.
    fn get_stream(&self, url: &str) -> Result<Box<dyn Read>, ShellError> {
        self.get(url)
    }
}

/// Blocking HTTP client for the GitHub API and archive hosts.
///
/// Connecting is bounded by the configured timeout for every request. The
/// whole exchange is bounded only for manifests; archive bodies stream for
/// as long as the server keeps sending.
#[derive(Debug, Clone)]
pub struct GithubHttp {
    api_base: String,
    token: Option<String>,
    timeout: Duration,
    client: Client,
}

impl GithubHttp {
    pub fn from_config(config: &ShellConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.http_timeout)
            .timeout(None)
            .build()?;
        Ok(Self {
            api_base: config.api_base.clone(),
            token: config.github_token.clone(),
            timeout: config.http_timeout,
            client,
        })
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let mut req = self.client.get(url);
        if url.starts_with(&self.api_base) {
            req = req.header("Accept", "application/vnd.github+json");
            if let Some(ref token) = self.token {
                req = req.bearer_auth(token);
            }
        }
        req
    }

    fn send(&self, url: &str, req: RequestBuilder) -> Result<Box<dyn Read>, ShellError> {
        let response = req.send().map_err(|e| ShellError::network(url, e))?;
        let status = response.status();
        debug!(%url, %status, "http response");
        match status {
            s if s.is_success() => Ok(Box::new(response)),
            StatusCode::NOT_FOUND => Err(ShellError::NotFound(format!("not found: {url}"))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ShellError::PermissionDenied(
                format!("access denied ({status}): {url}"),
            )),
            s => Err(ShellError::network(url, format!("unexpected status {s}"))),
        }
    }
}

impl HttpClient for GithubHttp {
    fn get(&self, url: &str) -> Result<Box<dyn Read>, ShellError> {
        self.send(url, self.request(url).timeout(self.timeout))
    }

    fn get_stream(&self, url: &str) -> Result<Box<dyn Read>, ShellError> {
        self.send(url, self.request(url))
    }
}
