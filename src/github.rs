//! GitHub REST client: file contents, repository listings, webhooks, commit
//! statuses and commits.
//!
//! Calls are blocking (`ureq`). Discovery reaches the client through the
//! async [`RepoHost`] impl, which moves each call onto tokio's blocking pool.

use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use lru::LruCache;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::badge::display_value;
use crate::discovery::{Organization, RepoHost, RepoPage, RepoScope, RepositoryDescriptor, PAGE_SIZE};
use crate::error::{CvrError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Ref used when a caller does not name one.
pub const DEFAULT_REF: &str = "master";
pub const DEFAULT_COMMIT_CACHE: usize = 256;
/// Context string attached to posted commit statuses.
pub const STATUS_CONTEXT: &str = "cvr";

const USER_AGENT: &str = "cvr";
const API_VERSION: &str = "2022-11-28";
const HOOK_EVENTS: [&str; 2] = ["push", "pull_request"];

static PAGE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]page=(\d+)").expect("valid page regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

/// Body of a commit status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRequest {
    pub state: CommitState,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    pub context: String,
}

impl StatusRequest {
    /// Success when `percent` meets `threshold`, failure otherwise.
    pub fn for_coverage(percent: Option<f64>, threshold: f64, target_url: Option<String>) -> Self {
        let passed = percent.is_some_and(|p| p >= threshold);
        Self {
            state: if passed {
                CommitState::Success
            } else {
                CommitState::Failure
            },
            description: format!(
                "Coverage {} (threshold {threshold}%)",
                display_value(percent)
            ),
            target_url,
            context: STATUS_CONTEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Webhook {
    pub id: u64,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub config: HookConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HookConfig {
    pub url: Option<String>,
}

impl Webhook {
    pub fn url(&self) -> Option<&str> {
        self.config.url.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
}

/// Bounded memo of commits keyed by `owner/repo/sha`.
pub struct CommitCache {
    entries: LruCache<String, Commit>,
}

impl CommitCache {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Commit> {
        self.entries.get(key).cloned()
    }

    pub fn put(&mut self, key: String, commit: Commit) {
        self.entries.put(key, commit);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

// Wire shapes.

#[derive(Deserialize)]
struct RepoJson {
    id: u64,
    full_name: String,
    owner: OwnerJson,
}

#[derive(Deserialize)]
struct OwnerJson {
    login: String,
}

impl From<RepoJson> for RepositoryDescriptor {
    fn from(repo: RepoJson) -> Self {
        RepositoryDescriptor {
            id: repo.id,
            full_name: repo.full_name,
            owner_login: repo.owner.login,
        }
    }
}

#[derive(Deserialize)]
struct ContentJson {
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct CommitJson {
    sha: String,
    commit: CommitDetailJson,
}

#[derive(Deserialize)]
struct CommitDetailJson {
    message: String,
    committer: CommitterJson,
}

#[derive(Deserialize)]
struct CommitterJson {
    date: DateTime<Utc>,
}

/// Authenticated GitHub client. Clones share the commit cache.
#[derive(Clone)]
pub struct GitHubClient {
    agent: ureq::Agent,
    api_url: String,
    token: String,
    commits: Arc<Mutex<CommitCache>>,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            commits: Arc::new(Mutex::new(CommitCache::new(DEFAULT_COMMIT_CACHE))),
        }
    }

    /// Point the client at another API root (GitHub Enterprise, tests).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_commit_cache(mut self, capacity: usize) -> Self {
        self.commits = Arc::new(Mutex::new(CommitCache::new(capacity)));
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}{}", self.api_url, path))
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", API_VERSION)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let resp = self
            .request("GET", path)
            .call()
            .map_err(|e| transport(what, e))?;
        read_json(resp, what)
    }

    /// Decoded contents of `path` at `git_ref` (default [`DEFAULT_REF`]).
    pub fn file_content(
        &self,
        owner: &str,
        repo: &str,
        git_ref: Option<&str>,
        path: &str,
    ) -> Result<String> {
        let git_ref = git_ref.unwrap_or(DEFAULT_REF);
        log::debug!("fetching {owner}/{repo}/{path}@{git_ref}");
        let resp = self
            .request("GET", &format!("/repos/{owner}/{repo}/contents/{path}"))
            .query("ref", git_ref)
            .call()
            .map_err(|e| transport("Failed to fetch file content", e))?;
        let body: ContentJson = read_json(resp, "Failed to fetch file content")?;
        decode_content(body)
    }

    pub fn organizations(&self) -> Result<Vec<Organization>> {
        self.get_json(
            &format!("/user/orgs?per_page={PAGE_SIZE}"),
            "Failed to list organizations",
        )
    }

    /// One page of repositories for `scope`, with the last page number when
    /// the response carries a `Link` header.
    pub fn repository_page(&self, scope: &RepoScope, page: u32) -> Result<RepoPage> {
        let path = match scope {
            RepoScope::Owned => "/user/repos".to_string(),
            RepoScope::Organization(org) => format!("/orgs/{org}/repos"),
        };
        log::debug!("fetching {scope} repositories, page {page}");
        let resp = self
            .request("GET", &path)
            .query("per_page", &PAGE_SIZE.to_string())
            .query("page", &page.to_string())
            .call()
            .map_err(|e| transport("Failed to list repositories", e))?;

        let last_page = resp
            .header("Link")
            .map(|link| last_page_from_link(link).unwrap_or(page));
        let repos: Vec<RepoJson> = read_json(resp, "Failed to list repositories")?;
        Ok(RepoPage {
            repos: repos.into_iter().map(RepositoryDescriptor::from).collect(),
            last_page,
        })
    }

    pub fn hooks(&self, owner: &str, repo: &str) -> Result<Vec<Webhook>> {
        self.get_json(
            &format!("/repos/{owner}/{repo}/hooks?per_page={PAGE_SIZE}"),
            "Failed to list hooks",
        )
    }

    pub fn hook_by_url(&self, owner: &str, repo: &str, url: &str) -> Result<Option<Webhook>> {
        Ok(self
            .hooks(owner, repo)?
            .into_iter()
            .find(|hook| hook.url() == Some(url)))
    }

    /// Subscribe `url` to push and pull-request events. An existing hook
    /// for the same URL is returned unchanged.
    pub fn create_hook(&self, owner: &str, repo: &str, url: &str) -> Result<Webhook> {
        if let Some(existing) = self.hook_by_url(owner, repo, url)? {
            log::debug!("hook for {url} already exists on {owner}/{repo}");
            return Ok(existing);
        }
        let resp = self
            .request("POST", &format!("/repos/{owner}/{repo}/hooks"))
            .send_json(serde_json::json!({
                "name": "web",
                "active": true,
                "events": HOOK_EVENTS,
                "config": { "url": url, "content_type": "json" },
            }))
            .map_err(|e| transport("Failed to create hook", e))?;
        let hook: Webhook = read_json(resp, "Failed to create hook")?;
        log::info!("created hook {} on {owner}/{repo}", hook.id);
        Ok(hook)
    }

    pub fn delete_hook(&self, owner: &str, repo: &str, url: &str) -> Result<()> {
        let hook = self
            .hook_by_url(owner, repo, url)?
            .ok_or_else(|| CvrError::NotFound(format!("hook for {url} on {owner}/{repo}")))?;
        self.request("DELETE", &format!("/repos/{owner}/{repo}/hooks/{}", hook.id))
            .call()
            .map_err(|e| transport("Failed to delete hook", e))?;
        log::info!("deleted hook {} on {owner}/{repo}", hook.id);
        Ok(())
    }

    pub fn create_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &StatusRequest,
    ) -> Result<()> {
        let body = serde_json::to_value(status)
            .map_err(|e| CvrError::Transport(format!("Failed to encode status: {e}")))?;
        self.request("POST", &format!("/repos/{owner}/{repo}/statuses/{sha}"))
            .send_json(body)
            .map_err(|e| transport("Failed to create status", e))?;
        log::info!("posted {} status to {owner}/{repo}@{sha}", status.state.as_str());
        Ok(())
    }

    /// The commit `git_ref` resolves to. Lookups by full commit SHA are
    /// memoized; branch and tag names move, so they always hit the API.
    pub fn commit(&self, owner: &str, repo: &str, git_ref: &str) -> Result<Commit> {
        let key = is_commit_sha(git_ref).then(|| format!("{owner}/{repo}/{git_ref}"));
        if let Some(hit) = key.as_deref().and_then(|key| self.cache().get(key)) {
            log::debug!("commit cache hit for {owner}/{repo}@{git_ref}");
            return Ok(hit);
        }

        let body: CommitJson = self.get_json(
            &format!("/repos/{owner}/{repo}/commits/{git_ref}"),
            "Failed to fetch commit",
        )?;
        let commit = Commit {
            sha: body.sha,
            message: body.commit.message,
            committed_at: body.commit.committer.date,
        };
        if let Some(key) = key {
            self.cache().put(key, commit.clone());
        }
        Ok(commit)
    }

    pub fn cached_commits(&self) -> usize {
        self.cache().len()
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, CommitCache> {
        self.commits.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn list_organizations(&self) -> Result<Vec<Organization>> {
        let client = self.clone();
        blocking(move || client.organizations()).await
    }

    async fn list_repositories(&self, scope: &RepoScope, page: u32) -> Result<RepoPage> {
        let client = self.clone();
        let scope = scope.clone();
        blocking(move || client.repository_page(&scope, page)).await
    }
}

async fn blocking<T, F>(call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| CvrError::Transport(format!("request task failed: {e}")))?
}

/// A full 40-character hex object id. Anything else may be a moving ref.
fn is_commit_sha(git_ref: &str) -> bool {
    git_ref.len() == 40 && git_ref.bytes().all(|b| b.is_ascii_hexdigit())
}

fn transport(context: &str, err: ureq::Error) -> CvrError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            CvrError::Transport(format!("{context} (HTTP {code}): {body}"))
        }
        other => CvrError::Transport(format!("{context}: {other}")),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(resp: ureq::Response, context: &str) -> Result<T> {
    resp.into_json()
        .map_err(|e| CvrError::Transport(format!("{context}: invalid response body: {e}")))
}

fn decode_content(body: ContentJson) -> Result<String> {
    match body.encoding.as_deref() {
        Some("base64") | None => {}
        Some(other) => {
            return Err(CvrError::Transport(format!(
                "unsupported content encoding: {other}"
            )))
        }
    }
    let encoded: String = body
        .content
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| CvrError::Transport(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| CvrError::Transport(format!("file content is not UTF-8: {e}")))
}

/// Page number of the `rel="last"` entry of a `Link` header.
fn last_page_from_link(link: &str) -> Option<u32> {
    link.split(',')
        .find(|part| part.contains(r#"rel="last""#))
        .and_then(|part| PAGE_PARAM.captures(part))
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_commit_sha() {
        assert!(is_commit_sha("0123456789abcdef0123456789ABCDEF01234567"));
        assert!(!is_commit_sha("main"));
        assert!(!is_commit_sha("abc123"));
        assert!(!is_commit_sha("v1.2.3-0123456789abcdef0123456789abcdef0"));
    }

    #[test]
    fn test_last_page_from_link() {
        let link = r#"<https://api.github.com/user/repos?per_page=100&page=2>; rel="next", <https://api.github.com/user/repos?per_page=100&page=7>; rel="last""#;
        assert_eq!(last_page_from_link(link), Some(7));

        let last = r#"<https://api.github.com/user/repos?per_page=100&page=1>; rel="first", <https://api.github.com/user/repos?per_page=100&page=6>; rel="prev""#;
        assert_eq!(last_page_from_link(last), None);
    }

    #[test]
    fn test_decode_content_strips_newlines() {
        let body = ContentJson {
            content: Some("U0Y6YXBw\nLmpzCg==\n".to_string()),
            encoding: Some("base64".to_string()),
        };
        assert_eq!(decode_content(body).unwrap(), "SF:app.js\n");
    }

    #[test]
    fn test_decode_content_rejects_unknown_encoding() {
        let body = ContentJson {
            content: Some("x".to_string()),
            encoding: Some("utf-16".to_string()),
        };
        assert!(matches!(decode_content(body), Err(CvrError::Transport(_))));
    }

    #[test]
    fn test_commit_cache_is_bounded() {
        let mut cache = CommitCache::new(2);
        let commit = |sha: &str| Commit {
            sha: sha.to_string(),
            message: String::new(),
            committed_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        cache.put("o/r/a".into(), commit("a"));
        cache.put("o/r/b".into(), commit("b"));
        assert!(cache.get("o/r/a").is_some());
        cache.put("o/r/c".into(), commit("c"));
        // "b" was least recently used.
        assert!(cache.get("o/r/b").is_none());
        assert_eq!(cache.len(), 2);

        assert_eq!(CommitCache::new(0).capacity(), 1);
    }

    #[test]
    fn test_status_for_coverage() {
        let status = StatusRequest::for_coverage(Some(85.5), 80.0, None);
        assert_eq!(status.state, CommitState::Success);
        assert_eq!(status.description, "Coverage 85% (threshold 80%)");
        assert_eq!(status.context, "cvr");

        let status = StatusRequest::for_coverage(None, 80.0, Some("https://ci/1".into()));
        assert_eq!(status.state, CommitState::Failure);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failure");
        assert_eq!(json["target_url"], "https://ci/1");
    }
}
