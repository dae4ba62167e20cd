//! Repository discovery across the authenticated user and their
//! organizations.
//!
//! Every source (the user's own repositories, then one per organization) is
//! paginated independently. All requests of one discovery call share a single
//! admission limiter, so at most [`MAX_IN_FLIGHT`] are outstanding at any
//! time regardless of nesting. The first failure aborts the whole call.

use std::collections::HashSet;
use std::future::Future;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::{CvrError, Result};

/// Upper bound on concurrent page/source requests.
pub const MAX_IN_FLIGHT: usize = 5;
/// Items requested per page. A full page means there may be more.
pub const PAGE_SIZE: usize = 100;

/// A repository visible to the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDescriptor {
    pub id: u64,
    pub full_name: String,
    pub owner_login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    pub login: String,
}

/// Whose repositories a page lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RepoScope {
    Owned,
    Organization(String),
}

impl std::fmt::Display for RepoScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoScope::Owned => f.write_str("user"),
            RepoScope::Organization(login) => write!(f, "org {login}"),
        }
    }
}

/// One page of a repository listing.
#[derive(Debug, Clone, Default)]
pub struct RepoPage {
    pub repos: Vec<RepositoryDescriptor>,
    /// Last page number when the host states it (e.g. a `rel="last"` link).
    pub last_page: Option<u32>,
}

/// The hosting API calls discovery needs.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Organizations the user belongs to (one page, up to [`PAGE_SIZE`]).
    async fn list_organizations(&self) -> Result<Vec<Organization>>;

    /// Page `page` (1-based) of the repositories in `scope`.
    async fn list_repositories(&self, scope: &RepoScope, page: u32) -> Result<RepoPage>;
}

/// All repositories the user owns or reaches through an organization,
/// deduplicated by id and sorted by full name.
pub async fn discover_repositories<H: RepoHost + ?Sized>(
    host: &H,
) -> Result<Vec<RepositoryDescriptor>> {
    let limiter = Semaphore::new(MAX_IN_FLIGHT);

    let orgs = admitted(&limiter, host.list_organizations()).await?;
    log::debug!("discovering repositories for user and {} org(s)", orgs.len());

    let scopes: Vec<RepoScope> = std::iter::once(RepoScope::Owned)
        .chain(orgs.into_iter().map(|org| RepoScope::Organization(org.login)))
        .collect();

    let per_scope: Vec<Vec<RepositoryDescriptor>> = stream::iter(&scopes)
        .map(|scope| fetch_scope(host, scope, &limiter))
        .buffered(MAX_IN_FLIGHT)
        .try_collect()
        .await?;

    let repos = merge(per_scope);
    log::info!("discovered {} repositories", repos.len());
    Ok(repos)
}

/// Keep the first occurrence of each id, then order by full name.
fn merge(per_scope: Vec<Vec<RepositoryDescriptor>>) -> Vec<RepositoryDescriptor> {
    let mut seen = HashSet::new();
    let mut repos: Vec<RepositoryDescriptor> = per_scope
        .into_iter()
        .flatten()
        .filter(|repo| seen.insert(repo.id))
        .collect();
    repos.sort_by(|a, b| a.full_name.cmp(&b.full_name));
    repos
}

/// Every repository of one scope, in page order.
///
/// Page 1 decides how the rest is fetched: a stated last page fans out the
/// remaining pages; otherwise pages are walked one by one until a short page.
async fn fetch_scope<H: RepoHost + ?Sized>(
    host: &H,
    scope: &RepoScope,
    limiter: &Semaphore,
) -> Result<Vec<RepositoryDescriptor>> {
    let first = admitted(limiter, host.list_repositories(scope, 1)).await?;
    let mut repos = first.repos;

    match first.last_page {
        Some(last) if last > 1 => {
            log::debug!("{scope}: fetching pages 2..={last}");
            let pages: Vec<RepoPage> = stream::iter(2..=last)
                .map(|page| admitted(limiter, host.list_repositories(scope, page)))
                .buffered(MAX_IN_FLIGHT)
                .try_collect()
                .await?;
            repos.extend(pages.into_iter().flat_map(|p| p.repos));
        }
        Some(_) => {}
        None => {
            let mut page = 1;
            let mut page_len = repos.len();
            while page_len == PAGE_SIZE {
                page += 1;
                log::debug!("{scope}: page {} was full, fetching page {page}", page - 1);
                let next = admitted(limiter, host.list_repositories(scope, page)).await?;
                page_len = next.repos.len();
                repos.extend(next.repos);
            }
        }
    }

    Ok(repos)
}

/// Run `request` once a limiter slot is free.
async fn admitted<T>(
    limiter: &Semaphore,
    request: impl Future<Output = Result<T>>,
) -> Result<T> {
    let _permit = limiter
        .acquire()
        .await
        .map_err(|_| CvrError::Transport("request limiter closed".to_string()))?;
    request.await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(id: u64, full_name: &str) -> RepositoryDescriptor {
        let owner_login = full_name.split('/').next().unwrap_or_default().to_string();
        RepositoryDescriptor {
            id,
            full_name: full_name.to_string(),
            owner_login,
        }
    }

    #[test]
    fn test_merge_dedups_keeping_first_and_sorts() {
        let merged = merge(vec![
            vec![repo(2, "me/zeta"), repo(1, "me/alpha")],
            vec![repo(2, "acme/zeta-renamed"), repo(3, "acme/beta")],
        ]);
        let names: Vec<&str> = merged.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["acme/beta", "me/alpha", "me/zeta"]);
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(RepoScope::Owned.to_string(), "user");
        assert_eq!(
            RepoScope::Organization("acme".to_string()).to_string(),
            "org acme"
        );
    }
}
