use log::info;

use super::core::GitLabProvider;
use crate::error::Result;
use crate::events::{ChangeEvent, ChangeReader, EventsQuery, Reference};
use crate::providers::gitlab::types::GitLabCommit;

impl ChangeReader for GitLabProvider {
    async fn load_tags(&self, pattern: &str) -> Result<Vec<Reference>> {
        let tags = self
            .client
            .fetch_tags(&self.project_path, pattern)
            .await?;
        Ok(tags
            .into_iter()
            .map(|tag| Reference {
                name: tag.name,
                commit: tag.commit.map(|c| c.short_id).unwrap_or_default(),
                qualified_name: None,
            })
            .collect())
    }

    async fn load_branches(&self, pattern: &str) -> Result<Vec<Reference>> {
        let branches = self
            .client
            .fetch_branches(&self.project_path, pattern)
            .await?;
        Ok(branches
            .into_iter()
            .map(|branch| Reference {
                name: branch.name,
                commit: branch.commit.map(|c| c.short_id).unwrap_or_default(),
                qualified_name: None,
            })
            .collect())
    }

    async fn load_commits_for_reference(
        &self,
        query: &EventsQuery,
        reference: &Reference,
    ) -> Result<Vec<ChangeEvent>> {
        let commits = self
            .client
            .fetch_commits(&self.project_path, &reference.name, query.since, query.until)
            .await?;
        info!(
            "Got {} commits from {} for {}",
            commits.len(),
            self.project_path,
            reference.name
        );
        Ok(commits.into_iter().map(commit_to_event).collect())
    }
}

fn commit_to_event(commit: GitLabCommit) -> ChangeEvent {
    ChangeEvent {
        revision: commit.short_id,
        timestamp: commit.created_at,
        author_timestamp: commit.authored_date,
        is_merge_commit: commit.parent_ids.len() > 1,
        ref_name: None,
        metrics: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn marks_commits_with_multiple_parents_as_merges() {
        let commit = GitLabCommit {
            short_id: "4b4e5264".to_string(),
            created_at: Utc.with_ymd_and_hms(2020, 1, 10, 17, 1, 21).unwrap(),
            authored_date: Utc.with_ymd_and_hms(2020, 1, 10, 16, 50, 0).unwrap(),
            parent_ids: vec!["a".to_string(), "b".to_string()],
        };
        let event = commit_to_event(commit);
        assert!(event.is_merge_commit);
        assert_eq!(event.revision, "4b4e5264");
        assert!(event.author_timestamp < event.timestamp);
    }

    #[test]
    fn single_parent_commits_are_not_merges() {
        let commit = GitLabCommit {
            short_id: "55cb3e2c".to_string(),
            created_at: Utc.with_ymd_and_hms(2020, 1, 10, 17, 1, 21).unwrap(),
            authored_date: Utc.with_ymd_and_hms(2020, 1, 10, 17, 1, 21).unwrap(),
            parent_ids: vec!["a".to_string()],
        };
        assert!(!commit_to_event(commit).is_merge_commit);
    }
}
