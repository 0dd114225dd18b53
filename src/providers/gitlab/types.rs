use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Commit pointer embedded in branch, tag and job payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabCommitRef {
    pub short_id: String,
}

/// A branch as listed by `/repository/branches`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabBranch {
    pub name: String,
    /// Absent on malformed references some instances return
    pub commit: Option<GitLabCommitRef>,
}

/// A tag as listed by `/repository/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabTag {
    pub name: String,
    pub commit: Option<GitLabCommitRef>,
}

/// A commit as listed by `/repository/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabCommit {
    pub short_id: String,
    pub created_at: DateTime<Utc>,
    pub authored_date: DateTime<Utc>,
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

/// A pipeline as listed by `/pipelines`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabPipeline {
    pub id: u64,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A job as listed by `/pipelines/:id/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabJob {
    pub id: u64,
    pub name: String,
    pub stage: String,
    pub status: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub web_url: Option<String>,
    pub commit: GitLabCommitRef,
}
