//! GitHub REST client
//!
//! Implements [`HostingApi`] over `api.github.com`. Every response updates
//! the last-seen rate-limit headers so the pipeline can pause before the
//! quota runs dry.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gittime_core::collaborators::{CommitPage, CommitQuery, HostingApi, RateLimit, RepoInfo};
use gittime_core::{ChangedFile, CommitId, HostingResult, Release, RepoRef, Tag};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK, RETRY_AFTER};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::GitHubConfig;
use crate::error::{GitHubError, Result};
use crate::wire::{
    CommitDetail, CommitItem, ErrorBody, ReleaseBody, RepoBody, TagBody, TreeBody,
};

const JSON_MEDIA: &str = "application/vnd.github+json";
const RAW_MEDIA: &str = "application/vnd.github.raw+json";

/// Sentinel for "no rate-limit header seen yet".
const UNSEEN: i64 = -1;

/// GitHub pages commit files 300 at a time and stops at 3000.
const MAX_DIFF_PAGES: u32 = 10;

/// GitHub client for repository history
pub struct GitHubClient {
    config: GitHubConfig,
    http_client: reqwest::Client,
    /// Set after the first 401; later requests go out unauthenticated.
    token_dropped: AtomicBool,
    remaining: AtomicI64,
    reset_epoch: AtomicI64,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| GitHubError::Config(e.to_string()))?;

        Ok(GitHubClient {
            config,
            http_client,
            token_dropped: AtomicBool::new(false),
            remaining: AtomicI64::new(UNSEEN),
            reset_epoch: AtomicI64::new(UNSEEN),
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GitHubConfig::from_env())
    }

    pub fn is_authenticated(&self) -> bool {
        self.config.token.is_some() && !self.token_dropped.load(Ordering::SeqCst)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn send(&self, path: &str, query: &[(&str, String)], accept: &str) -> Result<Response> {
        let build = |with_token: bool| {
            let mut request = self
                .http_client
                .get(self.url(path))
                .header(ACCEPT, accept)
                .header("X-GitHub-Api-Version", "2022-11-28")
                .query(query);
            if with_token {
                if let Some(token) = &self.config.token {
                    request = request.header(AUTHORIZATION, format!("Bearer {token}"));
                }
            }
            request
        };

        let mut response = build(self.is_authenticated()).send().await?;
        self.record_rate_limit(response.headers());

        if response.status() == StatusCode::UNAUTHORIZED && self.is_authenticated() {
            // Bad token: public repositories still work without one.
            self.token_dropped.store(true, Ordering::SeqCst);
            warn!("GitHub rejected the token; retrying unauthenticated");
            response = build(false).send().await?;
            self.record_rate_limit(response.headers());
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let (remaining, reset_at) = parse_rate_headers(response.headers());
        let retry_at = parse_retry_after(response.headers()).map(|wait| Utc::now() + wait);
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(
            status.as_u16(),
            path,
            RateSignal {
                remaining,
                reset_at,
                retry_at,
            },
            &body,
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(path, query, JSON_MEDIA).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// One page of a commit's file list, plus the next page number if any.
    async fn commit_files_page(
        &self,
        path: &str,
        page: u32,
    ) -> Result<(Vec<ChangedFile>, Option<u32>)> {
        let response = self
            .send(path, &[("page", page.to_string())], JSON_MEDIA)
            .await?;
        let next = next_page(response.headers());
        let bytes = response.bytes().await?;
        let detail: CommitDetail = serde_json::from_slice(&bytes)?;
        Ok((detail.files.into_iter().map(Into::into).collect(), next))
    }

    fn record_rate_limit(&self, headers: &HeaderMap) {
        let (remaining, reset_at) = parse_rate_headers(headers);
        if let Some(remaining) = remaining {
            self.remaining.store(i64::from(remaining), Ordering::SeqCst);
        }
        if let Some(reset_at) = reset_at {
            self.reset_epoch.store(reset_at.timestamp(), Ordering::SeqCst);
        }
    }

    fn repo_path(repo: &RepoRef) -> String {
        format!("/repos/{}/{}", repo.owner, repo.name)
    }
}

/// `x-ratelimit-remaining` and `x-ratelimit-reset` (epoch seconds).
pub fn parse_rate_headers(headers: &HeaderMap) -> (Option<u32>, Option<DateTime<Utc>>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    };
    let remaining = header("x-ratelimit-remaining").and_then(|v| v.parse().ok());
    let reset_at = header("x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    (remaining, reset_at)
}

/// `retry-after` in seconds, as sent with secondary rate limits.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<chrono::Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(chrono::Duration::seconds)
}

/// Page number of the `rel="next"` entry of a `Link` header.
pub fn next_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',')
        .find(|part| part.contains(r#"rel="next""#))
        .and_then(|part| {
            let url = part.split(';').next()?.trim();
            Url::parse(url.trim_start_matches('<').trim_end_matches('>')).ok()
        })
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse().ok())
        })
}

/// Quota headers of a failed response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateSignal {
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
    /// Absolute time derived from `retry-after`.
    pub retry_at: Option<DateTime<Utc>>,
}

/// Map a failed response to a [`GitHubError`].
///
/// 403/429 is a rate limit when the primary quota is spent or GitHub asks
/// for a `retry-after` pause (secondary limits arrive with quota left). A
/// bare 403 (private repo, blocked token) is a plain status error.
pub fn classify_failure(status: u16, path: &str, signal: RateSignal, body: &str) -> GitHubError {
    match status {
        404 => GitHubError::NotFound(path.to_string()),
        403 | 429 if signal.remaining == Some(0) => GitHubError::RateLimited {
            reset_at: signal.reset_at,
        },
        403 | 429 if signal.retry_at.is_some() => GitHubError::RateLimited {
            reset_at: signal.retry_at,
        },
        429 => GitHubError::RateLimited { reset_at: None },
        _ => {
            let message = serde_json::from_str::<ErrorBody>(body)
                .map(|b| b.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            GitHubError::Status { status, message }
        }
    }
}

/// Map a listing page, counting entries that cannot be dated.
pub fn commit_page(items: Vec<CommitItem>) -> CommitPage {
    let listed = items.len();
    let commits: Vec<_> = items.into_iter().filter_map(CommitItem::into_meta).collect();
    if commits.len() < listed {
        warn!(skipped = listed - commits.len(), "dropped undated commits from listing");
    }
    CommitPage { commits, listed }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn repository(&self, repo: &RepoRef) -> HostingResult<RepoInfo> {
        let body: RepoBody = self.get_json(&Self::repo_path(repo), &[]).await?;
        Ok(body.into())
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        query: &CommitQuery,
    ) -> HostingResult<CommitPage> {
        let mut params = vec![
            ("per_page", query.per_page.to_string()),
            ("page", query.page.to_string()),
        ];
        if let Some(path) = &query.path {
            params.push(("path", path.clone()));
        }

        let items: Vec<CommitItem> = self
            .get_json(&format!("{}/commits", Self::repo_path(repo)), &params)
            .await?;
        debug!(repo = %repo, page = query.page, count = items.len(), "listed commits");
        Ok(commit_page(items))
    }

    async fn commit_diff(&self, repo: &RepoRef, sha: &CommitId) -> HostingResult<Vec<ChangedFile>> {
        let path = format!("{}/commits/{}", Self::repo_path(repo), sha);
        let mut files = Vec::new();
        let mut page = 1;
        loop {
            let (batch, next) = self.commit_files_page(&path, page).await?;
            files.extend(batch);
            match next {
                Some(next) if next > page && page < MAX_DIFF_PAGES => page = next,
                Some(_) => {
                    warn!(commit = %sha, files = files.len(), "commit file list truncated by GitHub");
                    break;
                }
                None => break,
            }
        }
        Ok(files)
    }

    async fn tags(&self, repo: &RepoRef) -> HostingResult<Vec<Tag>> {
        let tags: Vec<TagBody> = self
            .get_json(
                &format!("{}/tags", Self::repo_path(repo)),
                &[("per_page", "100".to_string())],
            )
            .await?;
        Ok(tags.into_iter().map(Into::into).collect())
    }

    async fn releases(&self, repo: &RepoRef) -> HostingResult<Vec<Release>> {
        let releases: Vec<ReleaseBody> = self
            .get_json(
                &format!("{}/releases", Self::repo_path(repo)),
                &[("per_page", "50".to_string())],
            )
            .await?;
        Ok(releases
            .into_iter()
            .filter(|r| !r.draft)
            .map(Into::into)
            .collect())
    }

    async fn readme(&self, repo: &RepoRef) -> HostingResult<String> {
        let path = format!("{}/readme", Self::repo_path(repo));
        match self.send(&path, &[], RAW_MEDIA).await {
            Ok(response) => Ok(response.text().await.map_err(GitHubError::from)?),
            Err(GitHubError::NotFound(_)) => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn tree(&self, repo: &RepoRef, branch: &str) -> HostingResult<Vec<String>> {
        let body: TreeBody = self
            .get_json(
                &format!("{}/git/trees/{}", Self::repo_path(repo), branch),
                &[("recursive", "1".to_string())],
            )
            .await?;
        if body.truncated {
            warn!(repo = %repo, "tree listing truncated by GitHub");
        }
        Ok(body.blob_paths())
    }

    fn rate_limit(&self) -> Option<RateLimit> {
        let remaining = self.remaining.load(Ordering::SeqCst);
        let reset = self.reset_epoch.load(Ordering::SeqCst);
        if remaining == UNSEEN || reset == UNSEEN {
            return None;
        }
        Some(RateLimit {
            remaining: u32::try_from(remaining).unwrap_or(0),
            reset_at: Utc.timestamp_opt(reset, 0).single()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gittime_core::HostingError;
    use reqwest::header::HeaderValue;

    fn headers(remaining: &str, reset: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert("x-ratelimit-remaining", HeaderValue::from_str(remaining).unwrap());
        map.insert("x-ratelimit-reset", HeaderValue::from_str(reset).unwrap());
        map
    }

    #[test]
    fn test_parse_rate_headers() {
        let (remaining, reset) = parse_rate_headers(&headers("42", "1700000000"));
        assert_eq!(remaining, Some(42));
        assert_eq!(reset.unwrap().timestamp(), 1_700_000_000);

        let (remaining, reset) = parse_rate_headers(&HeaderMap::new());
        assert_eq!((remaining, reset), (None, None));
    }

    fn quota(remaining: Option<u32>, reset_at: Option<DateTime<Utc>>) -> RateSignal {
        RateSignal {
            remaining,
            reset_at,
            retry_at: None,
        }
    }

    #[test]
    fn test_classify_rate_limit_vs_forbidden() {
        let reset = Utc.timestamp_opt(1_700_000_000, 0).single();
        assert_eq!(
            classify_failure(403, "/repos/a/b", quota(Some(0), reset), ""),
            GitHubError::RateLimited { reset_at: reset }
        );
        assert_eq!(
            classify_failure(429, "/repos/a/b", quota(Some(0), None), ""),
            GitHubError::RateLimited { reset_at: None }
        );
        assert_eq!(
            classify_failure(
                403,
                "/repos/a/b",
                quota(Some(4000), None),
                r#"{"message":"Repository access blocked"}"#
            ),
            GitHubError::Status {
                status: 403,
                message: "Repository access blocked".into()
            }
        );
        assert_eq!(
            classify_failure(404, "/repos/a/b", quota(Some(10), None), ""),
            GitHubError::NotFound("/repos/a/b".into())
        );
    }

    #[test]
    fn test_classify_keeps_plain_text_bodies() {
        let err = classify_failure(502, "/repos/a/b/commits", RateSignal::default(), "Bad Gateway");
        assert_eq!(
            err,
            GitHubError::Status {
                status: 502,
                message: "Bad Gateway".into()
            }
        );
    }

    #[test]
    fn test_secondary_rate_limit_waits_for_retry_after() {
        let mut map = headers("4000", "1700000000");
        map.insert(RETRY_AFTER, HeaderValue::from_static("60"));
        let wait = parse_retry_after(&map).unwrap();
        assert_eq!(wait, chrono::Duration::seconds(60));

        let retry_at = Utc.timestamp_opt(1_700_000_060, 0).single();
        let signal = RateSignal {
            remaining: Some(4000),
            reset_at: Utc.timestamp_opt(1_700_000_000, 0).single(),
            retry_at,
        };
        let body = r#"{"message":"You have exceeded a secondary rate limit"}"#;
        assert_eq!(
            classify_failure(403, "/repos/a/b/commits", signal, body),
            GitHubError::RateLimited { reset_at: retry_at }
        );
        assert!(matches!(
            HostingError::from(classify_failure(403, "/repos/a/b/commits", signal, body)),
            HostingError::QuotaExhausted { .. }
        ));
        assert_eq!(
            classify_failure(429, "/repos/a/b", RateSignal::default(), ""),
            GitHubError::RateLimited { reset_at: None }
        );
    }

    #[test]
    fn test_next_page_follows_link_header() {
        let mut map = HeaderMap::new();
        map.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/repositories/1/commits/abc?page=2>; rel=\"next\", \
                 <https://api.github.com/repositories/1/commits/abc?page=10>; rel=\"last\"",
            ),
        );
        assert_eq!(next_page(&map), Some(2));

        map.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/repositories/1/commits/abc?page=1>; rel=\"prev\"",
            ),
        );
        assert_eq!(next_page(&map), None);
        assert_eq!(next_page(&HeaderMap::new()), None);
    }

    #[test]
    fn test_commit_page_counts_undated_entries() {
        let items: Vec<CommitItem> = serde_json::from_value(serde_json::json!([
            {
                "sha": "aaa",
                "commit": {
                    "message": "dated",
                    "author": {"name": "Ada", "date": "2024-01-01T00:00:00Z"},
                    "committer": {"name": "Ada", "date": "2024-01-01T00:00:00Z"}
                }
            },
            {
                "sha": "bbb",
                "commit": {"message": "undated", "author": null, "committer": null}
            }
        ]))
        .unwrap();

        let page = commit_page(items);
        assert_eq!(page.listed, 2);
        assert_eq!(page.commits.len(), 1);
        assert!(!page.is_last(2));
    }

    #[test]
    fn test_rate_limit_unknown_until_seen() {
        let client = GitHubClient::new(GitHubConfig::new("https://api.github.com")).unwrap();
        assert!(client.rate_limit().is_none());
        assert!(!client.is_authenticated());

        client.record_rate_limit(&headers("3", "1700000000"));
        let limit = client.rate_limit().unwrap();
        assert_eq!(limit.remaining, 3);
        assert_eq!(limit.reset_at.timestamp(), 1_700_000_000);
    }
}
