use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::{Credentials, Endpoint};
use crate::config::Config;
use crate::error::MirrorError;

const USER_AGENT: &str = concat!("ghmirror/", env!("CARGO_PKG_VERSION"));

/// One repository as returned by the platform's listing endpoint
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RepoDescriptor {
    pub id: u64,
    /// Used verbatim as the mirror entry directory name
    pub name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: String,
    /// API resource URL; issues live under `{url}/issues`
    pub url: String,
    #[serde(default)]
    pub ssh_url: Option<String>,
    pub clone_url: String,
    #[serde(default)]
    pub has_wiki: bool,
    #[serde(default)]
    pub has_issues: bool,
    // Not mirrored yet
    #[serde(default)]
    pub has_projects: bool,
    #[serde(default)]
    pub has_downloads: bool,
    #[serde(default)]
    pub has_pages: bool,
}

impl RepoDescriptor {
    /// Clone URL of the repository's wiki: the `.git` suffix becomes `.wiki.git`
    pub fn wiki_clone_url(&self) -> String {
        match self.clone_url.strip_suffix(".git") {
            Some(stem) => format!("{}.wiki.git", stem),
            None => format!("{}.wiki.git", self.clone_url),
        }
    }

    pub fn issues_url(&self) -> String {
        format!("{}/issues", self.url.trim_end_matches('/'))
    }
}

/// Authenticated client for the platform's REST API
#[derive(Debug)]
pub struct DirectoryClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    credentials: Credentials,
    per_page: u32,
    max_pages: u32,
}

impl DirectoryClient {
    /// Create a client from the run configuration
    pub fn new(config: &Config) -> Result<Self, MirrorError> {
        let credentials = config.credentials()?;

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| MirrorError::directory_fetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            credentials,
            per_page: config.per_page.max(1),
            max_pages: config.max_pages.max(1),
        })
    }

    /// List every repository of the configured account.
    ///
    /// With `max_pages == 1` this is a single request; accounts with more
    /// repositories than `per_page` get a truncated list.
    pub async fn list_repositories(&self) -> Result<Vec<RepoDescriptor>, MirrorError> {
        if self.max_pages == 1 {
            let repositories = self.fetch_page(None).await?;
            if repositories.len() as u32 >= self.per_page {
                warn!(
                    "Listing returned a full page of {} repositories; the list may be truncated (raise max_pages to paginate)",
                    repositories.len()
                );
            }
            info!("Found {} repositories", repositories.len());
            return Ok(repositories);
        }

        let mut repositories = Vec::new();
        for page in 1..=self.max_pages {
            let items = self.fetch_page(Some(page)).await?;
            let count = items.len() as u32;
            repositories.extend(items);

            if count < self.per_page {
                break;
            }
            if page == self.max_pages {
                warn!("Reached max_pages ({}); the list may be truncated", self.max_pages);
            }
        }

        info!("Found {} repositories", repositories.len());
        Ok(repositories)
    }

    async fn fetch_page(&self, page: Option<u32>) -> Result<Vec<RepoDescriptor>, MirrorError> {
        let url = self.endpoint.repos_url();
        debug!("Fetching repository list: {} (page {:?})", url, page);

        let mut request = self
            .http
            .get(&url)
            .query(&[("per_page", self.per_page)]);
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }

        let response = self
            .credentials
            .authorize(request)
            .send()
            .await
            .map_err(|e| MirrorError::directory_fetch(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MirrorError::directory_fetch(format!("Failed to read response body: {}", e)))?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(MirrorError::Authentication { body });
        }
        if !status.is_success() {
            return Err(MirrorError::directory_fetch(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            MirrorError::directory_fetch(format!(
                "Received invalid response, check your parameters: {}",
                e
            ))
        })
    }

    /// Fetch the first page of a repository's issues as raw bytes
    pub async fn fetch_issues(&self, repo: &RepoDescriptor) -> Result<Vec<u8>> {
        let url = repo.issues_url();
        debug!("Fetching issues: {}", url);

        let response = self
            .credentials
            .authorize(self.http.get(&url))
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {}", url, status));
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read issues from {}", url))?;

        Ok(body.to_vec())
    }
}
