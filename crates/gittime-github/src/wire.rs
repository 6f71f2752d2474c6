//! GitHub REST response shapes and their conversion to domain records.

use chrono::{DateTime, Utc};
use gittime_core::{ChangedFile, CommitId, CommitMeta, FileStatus, Release, Tag};
use gittime_core::collaborators::RepoInfo;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RepoBody {
    pub default_branch: String,
    pub description: Option<String>,
}

impl From<RepoBody> for RepoInfo {
    fn from(body: RepoBody) -> Self {
        RepoInfo {
            default_branch: body.default_branch,
            description: body.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Signature {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CommitBody {
    pub message: String,
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    pub login: String,
}

/// Item of `GET /repos/{o}/{r}/commits`; also the head of a commit detail.
#[derive(Debug, Deserialize)]
pub struct CommitItem {
    pub sha: String,
    pub commit: CommitBody,
    pub author: Option<Account>,
}

impl CommitItem {
    /// Committer date, falling back to the author date.
    pub fn into_meta(self) -> Option<CommitMeta> {
        let timestamp = self
            .commit
            .committer
            .as_ref()
            .and_then(|s| s.date)
            .or_else(|| self.commit.author.as_ref().and_then(|s| s.date))?;
        let author = self
            .commit
            .author
            .and_then(|s| s.name)
            .or_else(|| self.author.map(|a| a.login))
            .unwrap_or_else(|| "unknown".to_string());

        Some(CommitMeta {
            id: CommitId::new(self.sha),
            author,
            timestamp,
            message: self.commit.message,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct FileBody {
    pub filename: String,
    pub previous_filename: Option<String>,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    pub patch: Option<String>,
}

impl From<FileBody> for ChangedFile {
    fn from(body: FileBody) -> Self {
        ChangedFile {
            path: body.filename,
            previous_path: body.previous_filename,
            status: FileStatus::from_hosting(&body.status),
            additions: body.additions,
            deletions: body.deletions,
            patch: body.patch,
        }
    }
}

/// `GET /repos/{o}/{r}/commits/{sha}`
#[derive(Debug, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub files: Vec<FileBody>,
}

#[derive(Debug, Deserialize)]
pub struct TagTarget {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct TagBody {
    pub name: String,
    pub commit: TagTarget,
}

impl From<TagBody> for Tag {
    fn from(body: TagBody) -> Self {
        Tag {
            name: body.name,
            commit: CommitId::new(body.commit.sha),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReleaseBody {
    pub tag_name: String,
    pub name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

impl From<ReleaseBody> for Release {
    fn from(body: ReleaseBody) -> Self {
        Release {
            tag_name: body.tag_name,
            name: body.name.filter(|n| !n.is_empty()),
            published_at: body.published_at,
            body: body.body.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `GET /repos/{o}/{r}/git/trees/{branch}?recursive=1`
#[derive(Debug, Deserialize)]
pub struct TreeBody {
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

impl TreeBody {
    pub fn blob_paths(self) -> Vec<String> {
        self.tree
            .into_iter()
            .filter(|e| e.kind == "blob")
            .map(|e| e.path)
            .collect()
    }
}

/// Error payload GitHub attaches to most failures.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_item_uses_committer_date_and_author_name() {
        let item: CommitItem = serde_json::from_value(json!({
            "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
            "commit": {
                "message": "Fix all the bugs\n\nLong body",
                "author": {"name": "Monalisa Octocat", "date": "2011-04-14T16:00:49Z"},
                "committer": {"name": "GitHub", "date": "2011-04-15T10:00:00Z"}
            },
            "author": {"login": "octocat"}
        }))
        .unwrap();

        let meta = item.into_meta().unwrap();
        assert_eq!(meta.author, "Monalisa Octocat");
        assert_eq!(meta.timestamp.to_rfc3339(), "2011-04-15T10:00:00+00:00");
        assert_eq!(meta.headline(), "Fix all the bugs");
    }

    #[test]
    fn test_commit_item_without_dates_is_skipped() {
        let item: CommitItem = serde_json::from_value(json!({
            "sha": "abc",
            "commit": {"message": "x", "author": null, "committer": null},
            "author": null
        }))
        .unwrap();
        assert!(item.into_meta().is_none());
    }

    #[test]
    fn test_commit_detail_files_normalize_status() {
        let detail: CommitDetail = serde_json::from_value(json!({
            "sha": "abc",
            "files": [
                {"filename": "src/new.rs", "previous_filename": "src/old.rs",
                 "status": "renamed", "additions": 0, "deletions": 0},
                {"filename": "src/copy.rs", "status": "copied", "additions": 12, "deletions": 0,
                 "patch": "@@ -0,0 +1,12 @@"},
                {"filename": "assets/logo.png", "status": "modified"}
            ]
        }))
        .unwrap();

        let files: Vec<ChangedFile> = detail.files.into_iter().map(Into::into).collect();
        assert_eq!(files[0].status, FileStatus::Renamed);
        assert_eq!(files[0].previous_path.as_deref(), Some("src/old.rs"));
        assert_eq!(files[1].status, FileStatus::Added);
        assert!(files[1].patch.is_some());
        assert_eq!((files[2].additions, files[2].deletions), (0, 0));
        assert!(files[2].patch.is_none());
    }

    #[test]
    fn test_tree_keeps_blobs_only() {
        let tree: TreeBody = serde_json::from_value(json!({
            "sha": "t",
            "tree": [
                {"path": "src", "type": "tree"},
                {"path": "src/lib.rs", "type": "blob"},
                {"path": "vendor/dep", "type": "commit"}
            ],
            "truncated": false
        }))
        .unwrap();
        assert_eq!(tree.blob_paths(), vec!["src/lib.rs"]);
    }

    #[test]
    fn test_release_defaults() {
        let release: Release = serde_json::from_value::<ReleaseBody>(json!({
            "tag_name": "v1.0.0",
            "name": "",
            "published_at": null,
            "body": null,
            "draft": true
        }))
        .unwrap()
        .into();
        assert_eq!(release.name, None);
        assert_eq!(release.published_at, None);
        assert_eq!(release.body, "");
    }
}
