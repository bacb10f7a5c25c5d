//! Git hosting platform API client.
//!
//! Talks to a GitHub-shaped REST API to enumerate the repositories owned by
//! a user or organization. Pagination follows the `Link` response header
//! until no `rel="next"` link remains, so callers always get every
//! repository regardless of how many pages the platform needs.

use chrono::{DateTime, Utc};
use mirror_types::RepositoryDescriptor;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("owner '{0}' not found")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// The capability the sync engine enumerates repositories through.
///
/// A trait rather than a concrete struct so tests and alternate hosts can
/// substitute their own implementation without touching the engine.
#[async_trait::async_trait]
pub trait PlatformClient: Send + Sync {
    async fn list_user_repos(&self, login: &str, include_private: bool) -> Result<Vec<RepositoryDescriptor>, PlatformError>;
    async fn list_org_repos(&self, login: &str, include_private: bool) -> Result<Vec<RepositoryDescriptor>, PlatformError>;
    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryDescriptor, PlatformError>;
}

/// A `PlatformClient` backed by a real GitHub-shaped REST API over HTTPS.
pub struct GitHostClient {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl GitHostClient {
    pub fn new() -> Result<Self, PlatformError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gitmirror/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, PlatformError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    async fn list_repos(&self, path: &str, include_private: bool) -> Result<Vec<RepositoryDescriptor>, PlatformError> {
        let mut descriptors = Vec::new();
        let mut page = 1u32;

        loop {
            let paged_path = format!("{path}?per_page={PER_PAGE}&page={page}");
            let response = self.get(&paged_path).await?;
            let status = response.status();

            if status.as_u16() == 404 {
                return Err(PlatformError::NotFound(path.to_string()));
            }
            if status.as_u16() == 403 {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                return Err(PlatformError::RateLimited { retry_after_secs });
            }

            let has_next = response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok())
                .map(has_next_link)
                .unwrap_or(false);

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PlatformError::UnexpectedStatus {
                    status: status.as_u16(),
                    body,
                });
            }

            let batch: Vec<RawRepo> = response.json().await?;
            if batch.is_empty() {
                break;
            }

            for raw in batch {
                if raw.private && !include_private {
                    continue;
                }
                descriptors.push(raw.into_descriptor());
            }

            if !has_next {
                break;
            }
            page += 1;
        }

        Ok(descriptors)
    }
}

#[async_trait::async_trait]
impl PlatformClient for GitHostClient {
    async fn list_user_repos(&self, login: &str, include_private: bool) -> Result<Vec<RepositoryDescriptor>, PlatformError> {
        tracing::debug!(login, "listing user repositories");
        self.list_repos(&format!("/users/{login}/repos"), include_private).await
    }

    async fn list_org_repos(&self, login: &str, include_private: bool) -> Result<Vec<RepositoryDescriptor>, PlatformError> {
        tracing::debug!(login, "listing org repositories");
        self.list_repos(&format!("/orgs/{login}/repos"), include_private).await
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryDescriptor, PlatformError> {
        let response = self.get(&format!("/repos/{owner}/{name}")).await?;
        if response.status().as_u16() == 404 {
            return Err(PlatformError::NotFound(format!("{owner}/{name}")));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::UnexpectedStatus { status, body });
        }
        let raw: RawRepo = response.json().await?;
        Ok(raw.into_descriptor())
    }
}

/// Wire shape of one repository record, trimmed to the fields this tool uses.
#[derive(Debug, Deserialize)]
struct RawRepo {
    name: String,
    #[serde(default)]
    private: bool,
    clone_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    size: Option<u64>,
    owner: RawOwner,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

impl RawRepo {
    fn into_descriptor(self) -> RepositoryDescriptor {
        RepositoryDescriptor {
            owner: self.owner.login,
            name: self.name,
            clone_url: self.clone_url,
            default_branch: self.default_branch,
            is_private: self.private,
            pushed_at: self.pushed_at,
            is_fork: self.fork,
            is_archived_upstream: self.archived,
            size_kb: self.size,
        }
    }
}

/// Whether an HTTP `Link` header contains a `rel="next"` entry.
fn has_next_link(header_value: &str) -> bool {
    header_value
        .split(',')
        .any(|part| part.contains("rel=\"next\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_next_link_detects_next_rel() {
        let header = r#"<https://api.github.com/orgs/acme/repos?page=2>; rel="next", <https://api.github.com/orgs/acme/repos?page=5>; rel="last""#;
        assert!(has_next_link(header));
    }

    #[test]
    fn has_next_link_false_on_last_page() {
        let header = r#"<https://api.github.com/orgs/acme/repos?page=1>; rel="prev", <https://api.github.com/orgs/acme/repos?page=1>; rel="first""#;
        assert!(!has_next_link(header));
    }

    #[test]
    fn has_next_link_false_on_empty_header() {
        assert!(!has_next_link(""));
    }

    #[test]
    fn raw_repo_deserializes_and_maps_to_descriptor() {
        let body = r#"{
            "name": "tool",
            "private": false,
            "clone_url": "https://github.com/acme/tool.git",
            "default_branch": "main",
            "pushed_at": "2026-01-15T12:00:00Z",
            "fork": false,
            "archived": false,
            "size": 4096,
            "owner": { "login": "acme" }
        }"#;
        let raw: RawRepo = serde_json::from_str(body).unwrap();
        let descriptor = raw.into_descriptor();
        assert_eq!(descriptor.full_name(), "acme/tool");
        assert_eq!(descriptor.default_branch.as_deref(), Some("main"));
        assert_eq!(descriptor.size_kb, Some(4096));
        assert!(!descriptor.is_private);
    }

    #[test]
    fn raw_repo_tolerates_missing_optional_fields() {
        let body = r#"{
            "name": "tool",
            "clone_url": "https://github.com/acme/tool.git",
            "owner": { "login": "acme" }
        }"#;
        let raw: RawRepo = serde_json::from_str(body).unwrap();
        let descriptor = raw.into_descriptor();
        assert!(descriptor.pushed_at.is_none());
        assert!(descriptor.default_branch.is_none());
        assert!(!descriptor.is_fork);
    }

    #[test]
    fn private_repo_excluded_when_include_private_false() {
        let raw = RawRepo {
            name: "secret".into(),
            private: true,
            clone_url: "https://github.com/acme/secret.git".into(),
            default_branch: None,
            pushed_at: None,
            fork: false,
            archived: false,
            size: None,
            owner: RawOwner { login: "acme".into() },
        };
        assert!(raw.private);
        let _descriptor = raw.into_descriptor();
    }
}
