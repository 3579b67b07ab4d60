use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::repo::{RepoRef, RepoSource, TreeEntry};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Thin GitHub REST client.  Built through [`crate::Api`].
#[derive(Debug, Clone)]
pub struct GitHubClient {
    pub api_base: String,
    pub authenticated: bool,
    client: Client,
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Deserialize)]
struct BlobResponse {
    content: String,
    #[serde(default)]
    encoding: String,
}

impl GitHubClient {
    pub(crate) fn new(
        api_base: String,
        token: Option<String>,
        timeout: Duration,
        proxy: Option<String>,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        let authenticated = match token.as_deref().filter(|t| !t.is_empty()) {
            Some(t) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {t}")).map_err(|e| {
                    FetchError::InvalidResponse {
                        message: format!("GITHUB_TOKEN is not a valid header value: {e}"),
                    }
                })?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                true
            }
            None => false,
        };

        let mut builder = Client::builder()
            .user_agent(concat!("lmra-fetch/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout);

        if let Some(ref proxy_url) = proxy {
            match reqwest::Proxy::all(proxy_url) {
                Ok(p) => builder = builder.proxy(p),
                Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy URL"),
            }
        }

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_owned(),
            authenticated,
            client: builder.build()?,
        })
    }

    async fn get(&self, url: &str, what: &str) -> Result<Response, FetchError> {
        debug!(%url, "GitHub request");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let remaining = resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.text().await.unwrap_or_default();
        Err(classify_failure(status, remaining.as_deref(), what, body))
    }
}

/// Map a non-2xx GitHub answer onto [`FetchError`].
pub(crate) fn classify_failure(
    status: StatusCode,
    ratelimit_remaining: Option<&str>,
    what: &str,
    body: String,
) -> FetchError {
    let exhausted = ratelimit_remaining == Some("0");
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound(what.to_owned()),
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        StatusCode::FORBIDDEN if exhausted || body.contains("rate limit") => FetchError::RateLimited,
        _ => FetchError::Status {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        },
    }
}

/// Decode the `content` field of a blob response.
pub(crate) fn decode_blob(content: &str, encoding: &str) -> Result<String, FetchError> {
    match encoding {
        "base64" | "" => {
            // GitHub wraps the base64 payload at 60 columns.
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| FetchError::InvalidResponse {
                    message: format!("blob content is not valid base64: {e}"),
                })?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        "utf-8" => Ok(content.to_owned()),
        other => Err(FetchError::InvalidResponse {
            message: format!("unsupported blob encoding {other}"),
        }),
    }
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn default_branch(&self, repo: &RepoRef) -> Result<String, FetchError> {
        let url = format!("{}/repos/{}", self.api_base, repo.full_name());
        let info: RepoInfo = self
            .get(&url, &format!("repository {}", repo.full_name()))
            .await?
            .json()
            .await?;
        Ok(info.default_branch)
    }

    async fn list_tree(&self, repo: &RepoRef, branch: &str) -> Result<Vec<TreeEntry>, FetchError> {
        let url = format!(
            "{}/repos/{}/git/trees/{}?recursive=1",
            self.api_base,
            repo.full_name(),
            branch
        );
        let tree: TreeResponse = self
            .get(&url, &format!("branch {branch} of {}", repo.full_name()))
            .await?
            .json()
            .await?;

        if tree.truncated {
            warn!(repo = %repo.full_name(), branch, "tree listing truncated by GitHub");
        }

        Ok(tree
            .tree
            .into_iter()
            .filter(|item| item.kind == "blob")
            .map(|item| TreeEntry {
                path: item.path,
                sha: item.sha,
                size: item.size.unwrap_or(0),
            })
            .collect())
    }

    async fn fetch_blob(&self, repo: &RepoRef, entry: &TreeEntry) -> Result<String, FetchError> {
        let url = format!(
            "{}/repos/{}/git/blobs/{}",
            self.api_base,
            repo.full_name(),
            entry.sha
        );
        let blob: BlobResponse = self
            .get(&url, &format!("file {}", entry.path))
            .await?
            .json()
            .await?;
        decode_blob(&blob.content, &blob.encoding)
    }
}
