use chrono::{DateTime, Utc};

use super::core::GitLabClient;
use crate::error::Result;
use crate::providers::gitlab::types::{GitLabBranch, GitLabCommit, GitLabTag};
use crate::timeutil;

impl GitLabClient {
    /// List branches, optionally narrowed by GitLab's substring search.
    /// "*" means all branches.
    pub async fn fetch_branches(
        &self,
        project_path: &str,
        search: &str,
    ) -> Result<Vec<GitLabBranch>> {
        let mut url = self.project_url(project_path, "repository/branches")?;
        if search != "*" {
            url.query_pairs_mut().append_pair("search", search);
        }
        self.get_paged(url).await
    }

    pub async fn fetch_tags(&self, project_path: &str, search: &str) -> Result<Vec<GitLabTag>> {
        let mut url = self.project_url(project_path, "repository/tags")?;
        if search != "*" {
            url.query_pairs_mut().append_pair("search", search);
        }
        self.get_paged(url).await
    }

    /// List the commits reachable from one ref inside a time window.
    pub async fn fetch_commits(
        &self,
        project_path: &str,
        ref_name: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<GitLabCommit>> {
        let mut url = self.project_url(project_path, "repository/commits")?;
        url.query_pairs_mut()
            .append_pair("ref_name", ref_name)
            .append_pair("since", &timeutil::api_date_string(since))
            .append_pair("until", &timeutil::api_date_string(until))
            .append_pair("all", "true");
        self.get_paged(url).await
    }
}
