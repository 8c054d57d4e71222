//! Remote repository listing and raw content download.

use crate::config::RemoteConfig;
use crate::error::FetchError;
use crate::file_discovery::{ContentFetcher, SourceContent, SourceNode};
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
    pub branch: Option<String>,
}

impl FromStr for RepositoryRef {
    type Err = anyhow::Error;

    /// `owner/name`, `owner/name@branch`, or a github.com URL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("github.com/");

        let (path, branch) = match trimmed.split_once('@') {
            Some((path, branch)) if !branch.is_empty() => (path, Some(branch.to_string())),
            Some((path, _)) => (path, None),
            None => (trimmed, None),
        };
        let path = path.trim_end_matches('/').trim_end_matches(".git");

        let mut parts = path.split('/').filter(|p| !p.is_empty());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
                branch,
            }),
            _ => Err(anyhow!("expected owner/name[@branch], got '{}'", s)),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.branch {
            Some(branch) => write!(f, "{}/{}@{}", self.owner, self.name, branch),
            None => write!(f, "{}/{}", self.owner, self.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct TreeListing {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

/// Listing of one branch; file contents are fetched on demand.
#[derive(Debug, Clone)]
pub struct RemoteTree {
    pub branch: String,
    pub nodes: Vec<SourceNode>,
    pub truncated: bool,
}

/// Map a non-success status onto the fetch error taxonomy.
pub fn classify_status(status: StatusCode, path: &str) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound(path.to_string()),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited(path.to_string()),
        other => FetchError::Http {
            status: other.as_u16(),
            path: path.to_string(),
        },
    }
}

fn network_error(path: &str, err: reqwest::Error) -> FetchError {
    FetchError::Network {
        path: path.to_string(),
        message: err.to_string(),
    }
}

fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.header("Authorization", format!("Bearer {}", token)),
        None => request,
    }
}

pub struct RemoteClient {
    client: Client,
    config: RemoteConfig,
    repo: RepositoryRef,
}

impl RemoteClient {
    pub fn new(config: &RemoteConfig, repo: RepositoryRef) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("arch-mapper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            repo,
        })
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.repo
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str, what: &str) -> Result<T, FetchError> {
        debug!(url = %url, "GET");
        let response = with_token(self.client.get(url), self.config.token.as_deref())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| network_error(what, e))?;

        if !response.status().is_success() {
            return Err(classify_status(response.status(), what));
        }
        response.json::<T>().await.map_err(|e| network_error(what, e))
    }

    pub async fn default_branch(&self) -> Result<String, FetchError> {
        let url = format!("{}/repos/{}/{}", self.config.api_base_url, self.repo.owner, self.repo.name);
        let info: RepositoryInfo = self.get_json(&url, &format!("{}/{}", self.repo.owner, self.repo.name)).await?;
        Ok(info.default_branch)
    }

    /// List every file on the branch. Any failure here ends the run.
    pub async fn fetch_tree(&self) -> Result<RemoteTree, FetchError> {
        let branch = match &self.repo.branch {
            Some(branch) => branch.clone(),
            None => self.default_branch().await?,
        };

        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.config.api_base_url, self.repo.owner, self.repo.name, branch
        );
        let listing: TreeListing = self.get_json(&url, &format!("tree {}", branch)).await?;
        if listing.truncated {
            warn!(repo = %self.repo, "tree listing was truncated by the server, some files are missing");
        }

        let truncated = listing.truncated;
        let nodes = tree_nodes(listing);
        info!(repo = %self.repo, branch = %branch, files = nodes.len(), "listed remote tree");

        Ok(RemoteTree {
            branch,
            nodes,
            truncated,
        })
    }

    /// Fetcher for raw file contents on `branch`.
    pub fn content_fetcher(&self, branch: &str) -> RawContentFetcher {
        RawContentFetcher {
            client: self.client.clone(),
            base_url: format!(
                "{}/{}/{}/{}",
                self.config.raw_base_url, self.repo.owner, self.repo.name, branch
            ),
            token: self.config.token.clone(),
        }
    }
}

fn tree_nodes(listing: TreeListing) -> Vec<SourceNode> {
    listing
        .tree
        .into_iter()
        .filter(|entry| entry.kind == "blob")
        .map(|entry| SourceNode::File {
            path: entry.path,
            size: entry.size.unwrap_or(0),
            content: SourceContent::Deferred,
        })
        .collect()
}

pub struct RawContentFetcher {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[async_trait]
impl ContentFetcher for RawContentFetcher {
    async fn fetch(&self, path: &str) -> Result<String, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = with_token(self.client.get(&url), self.token.as_deref())
            .send()
            .await
            .map_err(|e| network_error(path, e))?;

        if !response.status().is_success() {
            return Err(classify_status(response.status(), path));
        }
        response.text().await.map_err(|e| network_error(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repository_references() {
        let repo: RepositoryRef = "rust-lang/cargo".parse().unwrap();
        assert_eq!(repo.owner, "rust-lang");
        assert_eq!(repo.name, "cargo");
        assert_eq!(repo.branch, None);

        let repo: RepositoryRef = "https://github.com/tokio-rs/tokio.git@v1.x".parse().unwrap();
        assert_eq!(repo.to_string(), "tokio-rs/tokio@v1.x");

        assert!("just-a-name".parse::<RepositoryRef>().is_err());
        assert!("a/b/c".parse::<RepositoryRef>().is_err());
    }

    #[test]
    fn status_codes_map_to_fetch_errors() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "a.ts"),
            FetchError::NotFound("a.ts".to_string())
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, "a.ts"),
            FetchError::RateLimited("a.ts".to_string())
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "a.ts"),
            FetchError::RateLimited("a.ts".to_string())
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, "a.ts"),
            FetchError::Http {
                status: 502,
                path: "a.ts".to_string()
            }
        );
    }

    #[test]
    fn tree_listing_keeps_blobs_as_deferred_files() {
        let listing: TreeListing = serde_json::from_str(
            r#"{"tree": [
                {"path": "src", "type": "tree"},
                {"path": "src/main.ts", "type": "blob", "size": 120},
                {"path": "vendored", "type": "commit"}
            ], "truncated": false}"#,
        )
        .unwrap();
        let nodes = tree_nodes(listing);
        assert_eq!(
            nodes,
            vec![SourceNode::File {
                path: "src/main.ts".to_string(),
                size: 120,
                content: SourceContent::Deferred,
            }]
        );
    }
}
