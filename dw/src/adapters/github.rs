//! GitHub pull requests via the REST API

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{AdapterError, GITHUB_PR_RE, InputAdapter, InputType};
use crate::request::ProcessedContent;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const TOKEN_ENV: &str = "GITHUB_TOKEN";
const MAX_FILES: usize = 100;

/// Owner, repo and number parsed from a pull request URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrRef {
    pub fn parse(url: &str) -> Option<Self> {
        let caps = GITHUB_PR_RE.captures(url.trim())?;
        Some(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            number: caps[3].parse().ok()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    merged: bool,
    user: Option<PrUser>,
}

#[derive(Debug, Deserialize)]
struct PrUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PrFile {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

/// Fetches PR title, description and changed files
pub struct GitHubPrAdapter {
    client: reqwest::Client,
    api_base: String,
}

impl GitHubPrAdapter {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Point at a different API host (GitHub Enterprise)
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        debug!(%api_base, "GitHubPrAdapter::with_api_base: called");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("docweaver/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, pr_url: &str) -> Result<T, AdapterError> {
        debug!(%url, "GitHubPrAdapter::get_json: called");
        let fetch_err = |message: String| AdapterError::Fetch {
            url: pr_url.to_string(),
            message,
        };

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.trim().is_empty()
        {
            request = request.bearer_auth(token.trim());
        }

        let response = request.send().await.map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fetch_err(format!("GitHub API {}: {}", status, body.trim())));
        }
        response.json::<T>().await.map_err(|e| fetch_err(e.to_string()))
    }
}

impl Default for GitHubPrAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputAdapter for GitHubPrAdapter {
    fn input_type(&self) -> InputType {
        InputType::GitHubPr
    }

    async fn process(&self, descriptor: &str) -> Result<ProcessedContent, AdapterError> {
        debug!(%descriptor, "GitHubPrAdapter::process: called");
        let pr = PrRef::parse(descriptor)
            .ok_or_else(|| AdapterError::InvalidDescriptor(format!("not a GitHub pull request URL: {}", descriptor)))?;

        let base = format!("{}/repos/{}/{}/pulls/{}", self.api_base, pr.owner, pr.repo, pr.number);
        let details: PullRequest = self.get_json(&base, descriptor).await?;
        let files: Vec<PrFile> = self
            .get_json(&format!("{}/files?per_page={}", base, MAX_FILES), descriptor)
            .await?;
        debug!(files = files.len(), "GitHubPrAdapter::process: fetched PR");

        let text = render_pr(&pr, &details, &files);
        Ok(ProcessedContent::new(descriptor, InputType::GitHubPr, text)
            .with_metadata("repository", format!("{}/{}", pr.owner, pr.repo))
            .with_metadata("number", pr.number.to_string())
            .with_metadata("files", files.len().to_string()))
    }
}

fn render_pr(pr: &PrRef, details: &PullRequest, files: &[PrFile]) -> String {
    let state = if details.merged { "merged" } else { details.state.as_str() };
    let author = details.user.as_ref().map(|u| u.login.as_str()).unwrap_or("unknown");
    let body = details
        .body
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or("(no description)");

    let mut out = format!(
        "# Pull request {}/{}#{}: {}\n\nAuthor: {}\nState: {}\n\n## Description\n\n{}\n\n## Changed files\n",
        pr.owner, pr.repo, pr.number, details.title, author, state, body
    );
    if files.is_empty() {
        out.push_str("\n(none)\n");
    }
    for f in files {
        out.push_str(&format!("- {} ({}, +{}/-{})\n", f.filename, f.status, f.additions, f.deletions));
    }
    out
}
