//! History store loading, lazy hydration and upstream failure handling.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use gittime_core::fakes::MemoryHosting;
use gittime_core::{
    ChangedFile, Commit, CommitId, CommitMeta, FileStatus, HistoryConfig, HistoryStore,
    HostingError, PipelineError, RateLimit, RepoRef, RetryPolicy, Tag,
};

fn repo() -> RepoRef {
    RepoRef::new("acme", "widgets")
}

fn commit(n: u32, path: &str) -> Commit {
    Commit::new(
        CommitMeta {
            id: CommitId::new(format!("{n:08}")),
            author: "dev".into(),
            timestamp: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::hours(n as i64),
            message: format!("commit {n}"),
        },
        vec![ChangedFile::new(path, FileStatus::Modified, n as u64, 0)],
    )
}

fn files(paths: &[&str]) -> BTreeSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

fn quick_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_base_ms: 100,
        max_backoff_ms: 1_000,
        ..RetryPolicy::default()
    }
}

#[tokio::test]
async fn test_load_paginates_and_orders_oldest_first() {
    let hosting = Arc::new(
        MemoryHosting::new(repo()).with_commits((1..=25).map(|n| commit(n, "src/lib.rs"))),
    );
    let config = HistoryConfig {
        per_page: 10,
        ..HistoryConfig::default()
    };

    let store = HistoryStore::load(hosting.clone(), repo(), config, RetryPolicy::default())
        .await
        .unwrap();

    assert_eq!(store.commits().len(), 25);
    assert_eq!(store.commits()[0].id.as_str(), "00000001");
    assert_eq!(store.commits()[24].id.as_str(), "00000025");
    assert_eq!(hosting.calls("list_commits"), 3);
    // Metadata only: no diff detail is fetched at load time.
    assert_eq!(hosting.calls("commit_diff"), 0);
}

#[tokio::test]
async fn test_window_keeps_newest_commits() {
    let hosting = Arc::new(
        MemoryHosting::new(repo()).with_commits((1..=30).map(|n| commit(n, "src/lib.rs"))),
    );
    let config = HistoryConfig {
        per_page: 10,
        max_commits: 15,
        ..HistoryConfig::default()
    };

    let store = HistoryStore::load(hosting, repo(), config, RetryPolicy::default())
        .await
        .unwrap();

    assert_eq!(store.commits().len(), 15);
    assert_eq!(store.commits()[0].id.as_str(), "00000016");
}

#[tokio::test]
async fn test_history_for_hydrates_only_candidates_once() {
    let hosting = Arc::new(MemoryHosting::new(repo()).with_commits(vec![
        commit(1, "a.rs"),
        commit(2, "b.rs"),
        commit(3, "a.rs"),
        commit(4, "c.rs"),
    ]));
    let store = HistoryStore::load(
        hosting.clone(),
        repo(),
        HistoryConfig::default(),
        RetryPolicy::default(),
    )
    .await
    .unwrap();

    let history = store.history_for(&files(&["a.rs"])).await.unwrap();
    let ids: Vec<_> = history.iter().map(|c| c.id().as_str()).collect();
    assert_eq!(ids, vec!["00000001", "00000003"]);
    assert_eq!(history[1].files[0].additions, 3);

    store.history_for(&files(&["a.rs", "b.rs"])).await.unwrap();
    assert_eq!(hosting.calls("commit_diff"), 3, "commit detail is memoized");
}

#[tokio::test]
async fn test_unmappable_entry_does_not_end_paging() {
    let hosting = Arc::new(
        MemoryHosting::new(repo())
            .with_commits((1..=5).map(|n| commit(n, "src/lib.rs")))
            .unmappable("00000004"),
    );
    let config = HistoryConfig {
        per_page: 2,
        ..HistoryConfig::default()
    };

    let store = HistoryStore::load(hosting.clone(), repo(), config, RetryPolicy::default())
        .await
        .unwrap();
    let ids: Vec<_> = store.commits().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["00000001", "00000002", "00000003", "00000005"]);

    let history = store.history_for(&files(&["src/lib.rs"])).await.unwrap();
    assert_eq!(history.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_path_listings_share_the_fetch_limit() {
    let paths: Vec<String> = (1..=12).map(|n| format!("src/mod{n}.rs")).collect();
    let hosting = Arc::new(
        MemoryHosting::new(repo())
            .with_commits(paths.iter().enumerate().map(|(i, p)| commit(i as u32 + 1, p)))
            .with_listing_latency(Duration::from_millis(50)),
    );
    let config = HistoryConfig {
        max_concurrent_fetches: 3,
        ..HistoryConfig::default()
    };
    let store = HistoryStore::load(hosting.clone(), repo(), config, RetryPolicy::default())
        .await
        .unwrap();

    let owned: BTreeSet<String> = paths.into_iter().collect();
    let candidates = store.candidates(&owned).await.unwrap();

    assert_eq!(candidates.len(), 12);
    assert_eq!(hosting.peak_listings(), 3);
}

#[tokio::test]
async fn test_missing_repository_is_not_found_without_retry() {
    let hosting = Arc::new(MemoryHosting::new(repo()).missing());
    let err = HistoryStore::load(
        hosting.clone(),
        repo(),
        HistoryConfig::default(),
        RetryPolicy::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::NotFound(_)));
    assert_eq!(hosting.calls("repository"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_quota_exhaustion_backs_off_then_surfaces() {
    let hosting = Arc::new(MemoryHosting::new(repo()).with_commits(vec![commit(1, "a.rs")]));
    hosting.fail(
        "list_commits",
        usize::MAX,
        HostingError::QuotaExhausted {
            reset_at: Some(Utc::now() + chrono::Duration::minutes(30)),
        },
    );

    let err = HistoryStore::load(hosting.clone(), repo(), HistoryConfig::default(), quick_retry(2))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::UpstreamUnavailable { attempts: 3, .. }
    ));
    assert_eq!(hosting.calls("list_commits"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_quota_exhaustion_recovers() {
    let hosting = Arc::new(MemoryHosting::new(repo()).with_commits(vec![commit(1, "a.rs")]));
    hosting.fail("list_commits", 1, HostingError::QuotaExhausted { reset_at: None });
    hosting.set_rate_limit(Some(RateLimit {
        remaining: 0,
        reset_at: Utc::now() + chrono::Duration::seconds(5),
    }));

    let store = HistoryStore::load(hosting.clone(), repo(), HistoryConfig::default(), quick_retry(2))
        .await
        .unwrap();

    assert_eq!(store.commits().len(), 1);
    assert_eq!(hosting.calls("list_commits"), 2);
}

#[tokio::test]
async fn test_auxiliary_failures_are_tolerated() {
    let hosting = Arc::new(
        MemoryHosting::new(repo())
            .with_commits(vec![commit(1, "a.rs")])
            .with_tags(vec![Tag {
                name: "v1".into(),
                commit: CommitId::new("00000001"),
            }])
            .with_readme("# Widgets"),
    );
    hosting.fail("releases", 1, HostingError::Decode("bad json".into()));
    hosting.fail(
        "tree",
        1,
        HostingError::NotFound {
            resource: "git/trees/main".into(),
        },
    );

    let store = HistoryStore::load(hosting, repo(), HistoryConfig::default(), quick_retry(0))
        .await
        .unwrap();
    assert!(store.releases().is_empty());
    assert_eq!(store.tags().len(), 1);

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.readme, "# Widgets");
    assert!(snapshot.tree_paths.is_empty());
    assert_eq!(snapshot.commits.len(), 1);
}
