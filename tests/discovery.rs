use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cvr::discovery::{
    discover_repositories, Organization, RepoHost, RepoPage, RepoScope, RepositoryDescriptor,
    MAX_IN_FLIGHT, PAGE_SIZE,
};
use cvr::error::{CvrError, Result};

fn repo(id: u64, full_name: &str) -> RepositoryDescriptor {
    RepositoryDescriptor {
        id,
        full_name: full_name.to_string(),
        owner_login: full_name.split('/').next().unwrap().to_string(),
    }
}

/// `count` repositories owned by `owner`, ids starting at `first_id`.
fn repos(owner: &str, first_id: u64, count: usize) -> Vec<RepositoryDescriptor> {
    (0..count as u64)
        .map(|i| repo(first_id + i, &format!("{owner}/repo-{:04}", first_id + i)))
        .collect()
}

/// In-memory host. Each scope maps to its pages; `with_last` controls
/// whether page 1 states the last page number.
#[derive(Default)]
struct FakeHost {
    orgs: Vec<String>,
    pages: HashMap<RepoScope, Vec<Vec<RepositoryDescriptor>>>,
    with_last: bool,
    fail_on: Option<(RepoScope, u32)>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(RepoScope, u32)>>,
}

impl FakeHost {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<(RepoScope, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepoHost for FakeHost {
    async fn list_organizations(&self) -> Result<Vec<Organization>> {
        Ok(self
            .orgs
            .iter()
            .map(|login| Organization {
                login: login.clone(),
            })
            .collect())
    }

    async fn list_repositories(&self, scope: &RepoScope, page: u32) -> Result<RepoPage> {
        self.enter();
        self.calls.lock().unwrap().push((scope.clone(), page));
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.leave();

        if self.fail_on.as_ref() == Some(&(scope.clone(), page)) {
            return Err(CvrError::Transport(format!("{scope} page {page} failed")));
        }

        let pages = self.pages.get(scope).cloned().unwrap_or_default();
        let repos = pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        let last_page = self.with_last.then(|| pages.len().max(1) as u32);
        Ok(RepoPage { repos, last_page })
    }
}

fn org(login: &str) -> RepoScope {
    RepoScope::Organization(login.to_string())
}

#[tokio::test]
async fn dedups_by_id_and_sorts_by_full_name() {
    let mut host = FakeHost {
        orgs: vec!["acme".into()],
        with_last: true,
        ..Default::default()
    };
    host.pages.insert(
        RepoScope::Owned,
        vec![vec![repo(3, "me/zeta"), repo(1, "acme/shared")]],
    );
    host.pages.insert(
        org("acme"),
        vec![vec![repo(1, "acme/shared"), repo(2, "acme/alpha")]],
    );

    let found = discover_repositories(&host).await.unwrap();
    let names: Vec<&str> = found.iter().map(|r| r.full_name.as_str()).collect();
    assert_eq!(names, vec!["acme/alpha", "acme/shared", "me/zeta"]);
}

#[tokio::test]
async fn link_header_fans_out_with_bounded_concurrency() {
    let mut host = FakeHost {
        orgs: (0..3).map(|i| format!("org{i}")).collect(),
        with_last: true,
        ..Default::default()
    };
    // 250 own repositories over 3 pages, 12 pages for each org.
    host.pages.insert(
        RepoScope::Owned,
        vec![repos("me", 1, 100), repos("me", 101, 100), repos("me", 201, 50)],
    );
    for i in 0..3u64 {
        let base = 10_000 * (i + 1);
        let pages = (0..12u64)
            .map(|p| repos(&format!("org{i}"), base + p * 100, PAGE_SIZE))
            .collect();
        host.pages.insert(org(&format!("org{i}")), pages);
    }

    let found = discover_repositories(&host).await.unwrap();
    assert_eq!(found.len(), 250 + 3 * 12 * PAGE_SIZE);
    assert!(found.windows(2).all(|w| w[0].full_name <= w[1].full_name));

    let max = host.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= MAX_IN_FLIGHT, "{max} requests were in flight");
    assert!(max > 1, "pages were fetched one at a time");

    // Every page requested exactly once.
    let calls = host.calls();
    assert_eq!(calls.len(), 3 + 3 * 12);
}

#[tokio::test]
async fn short_page_ends_pagination_without_link() {
    let mut host = FakeHost::default();
    host.pages.insert(
        RepoScope::Owned,
        vec![repos("me", 1, 100), repos("me", 101, 100), repos("me", 201, 7)],
    );

    let found = discover_repositories(&host).await.unwrap();
    assert_eq!(found.len(), 207);
    let pages: Vec<u32> = host.calls().into_iter().map(|(_, page)| page).collect();
    assert_eq!(pages, vec![1, 2, 3]);
}

#[tokio::test]
async fn exactly_full_last_page_probes_once_more() {
    let mut host = FakeHost::default();
    host.pages.insert(RepoScope::Owned, vec![repos("me", 1, 100)]);

    let found = discover_repositories(&host).await.unwrap();
    assert_eq!(found.len(), 100);
    assert_eq!(host.calls().len(), 2);
}

#[tokio::test]
async fn empty_user_is_empty() {
    let host = FakeHost::default();
    assert!(discover_repositories(&host).await.unwrap().is_empty());
}

#[tokio::test]
async fn page_failure_aborts_discovery() {
    let mut host = FakeHost {
        orgs: vec!["acme".into()],
        with_last: true,
        fail_on: Some((org("acme"), 2)),
        ..Default::default()
    };
    host.pages.insert(RepoScope::Owned, vec![repos("me", 1, 3)]);
    host.pages.insert(
        org("acme"),
        vec![repos("acme", 100, 100), repos("acme", 200, 100)],
    );

    let err = discover_repositories(&host).await.unwrap_err();
    assert!(matches!(err, CvrError::Transport(msg) if msg.contains("org acme page 2")));
}
