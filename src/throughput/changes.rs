use std::collections::HashSet;

use log::info;

use crate::error::Result;
use crate::events::{ChangeEvent, ChangeReader, EventsQuery, Reference};
use crate::throughput::refs::{RefKind, ReferenceResolver, MAINLINE_BRANCH};

/// Turns raw commits per resolved reference into ref-labeled change events.
///
/// For a single literal branch the commits are fetched directly. For a
/// branch pattern the main line is fetched unlabeled and every other
/// matched branch contributes only its branch-exclusive commits, labeled
/// with the branch name. Tag pointer commits override branch labels.
pub struct ChangeCorrelationService<'r, R> {
    reader: &'r R,
}

impl<'r, R: ChangeReader> ChangeCorrelationService<'r, R> {
    pub fn new(reader: &'r R) -> Self {
        Self { reader }
    }

    pub async fn load_changes(&self, query: &EventsQuery) -> Result<Vec<ChangeEvent>> {
        let resolver = ReferenceResolver::new(self.reader);

        let tags = match &query.tags {
            Some(pattern) => resolver.resolve(RefKind::Tag, pattern).await?,
            None => Vec::new(),
        };

        let mut changes = if query.branch_is_pattern() {
            self.load_changes_for_pattern(query, &resolver).await?
        } else {
            let branch = resolver.resolve_mainline(&query.branch).await?;
            let commits = self.reader.load_commits_for_reference(query, &branch).await?;
            info!(
                "Got {} commits from branch {}",
                commits.len(),
                branch.name
            );
            commits
        };

        apply_tag_labels(&mut changes, &tags);
        Ok(changes)
    }

    async fn load_changes_for_pattern(
        &self,
        query: &EventsQuery,
        resolver: &ReferenceResolver<'r, R>,
    ) -> Result<Vec<ChangeEvent>> {
        let branches = resolver.resolve(RefKind::Branch, &query.branch).await?;
        let mainline = resolver.resolve_mainline(MAINLINE_BRANCH).await?;

        let mainline_commits = self
            .reader
            .load_commits_for_reference(query, &mainline)
            .await?;
        let mainline_revisions: HashSet<String> = mainline_commits
            .iter()
            .map(|c| c.revision.clone())
            .collect();

        let mut merged = mainline_commits;
        for branch in branches.iter().filter(|b| b.name != mainline.name) {
            let commits = self.reader.load_commits_for_reference(query, branch).await?;
            let mut exclusive = branch_diff(commits, &mainline_revisions);
            info!(
                "Got {} commits exclusive to branch {}",
                exclusive.len(),
                branch.name
            );
            for commit in &mut exclusive {
                commit.ref_name = Some(branch.name.clone());
            }
            merged.extend(exclusive);
        }

        merged.sort_by_key(|c| c.timestamp);
        Ok(merged)
    }
}

/// The commits of `branch_commits` minus those already on the main line,
/// compared by revision id.
pub fn branch_diff(
    branch_commits: Vec<ChangeEvent>,
    mainline_revisions: &HashSet<String>,
) -> Vec<ChangeEvent> {
    branch_commits
        .into_iter()
        .filter(|c| !mainline_revisions.contains(&c.revision))
        .collect()
}

fn apply_tag_labels(changes: &mut [ChangeEvent], tags: &[Reference]) {
    for change in changes {
        if let Some(tag) = tags.iter().find(|t| t.commit == change.revision) {
            change.ref_name = Some(tag.name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::error::CdLensError;

    struct StubReader {
        branches: Vec<Reference>,
        tags: Vec<Reference>,
        /// Commits returned per reference name
        commits: Vec<(String, Vec<ChangeEvent>)>,
    }

    impl ChangeReader for StubReader {
        async fn load_tags(&self, _pattern: &str) -> Result<Vec<Reference>> {
            Ok(self.tags.clone())
        }

        async fn load_branches(&self, _pattern: &str) -> Result<Vec<Reference>> {
            Ok(self.branches.clone())
        }

        async fn load_commits_for_reference(
            &self,
            _query: &EventsQuery,
            reference: &Reference,
        ) -> Result<Vec<ChangeEvent>> {
            Ok(self
                .commits
                .iter()
                .find(|(name, _)| name == &reference.name)
                .map(|(_, commits)| commits.clone())
                .unwrap_or_default())
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 10, hour, minute, 0).unwrap()
    }

    fn commit(revision: &str, timestamp: DateTime<Utc>) -> ChangeEvent {
        ChangeEvent {
            revision: revision.to_string(),
            timestamp,
            author_timestamp: timestamp,
            is_merge_commit: false,
            ref_name: None,
            metrics: None,
        }
    }

    fn query(branch: &str, tags: Option<&str>) -> EventsQuery {
        EventsQuery {
            since: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            until: Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap(),
            branch: branch.to_string(),
            tags: tags.map(str::to_string),
            prod_deployment_job_names: vec!["deploy".to_string()],
        }
    }

    mod literal_branch {
        use super::*;

        #[tokio::test]
        async fn loads_commits_for_the_single_branch() {
            let reader = StubReader {
                branches: vec![Reference::new("master", "55cb3e2c")],
                tags: vec![],
                commits: vec![(
                    "master".to_string(),
                    vec![commit("4b4e5264", at(17, 1))],
                )],
            };
            let changes = ChangeCorrelationService::new(&reader)
                .load_changes(&query("master", None))
                .await
                .unwrap();

            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].revision, "4b4e5264");
            assert_eq!(changes[0].ref_name, None);
        }

        #[tokio::test]
        async fn ignores_branches_merely_containing_master() {
            let reader = StubReader {
                branches: vec![
                    Reference::new("master", "55cb3e2c"),
                    Reference::new("some-branch-with-master-in-the-name", "9999"),
                ],
                tags: vec![],
                commits: vec![
                    ("master".to_string(), vec![commit("4b4e5264", at(17, 1))]),
                    (
                        "some-branch-with-master-in-the-name".to_string(),
                        vec![commit("deadbeef", at(18, 0))],
                    ),
                ],
            };
            let changes = ChangeCorrelationService::new(&reader)
                .load_changes(&query("master", None))
                .await
                .unwrap();

            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].revision, "4b4e5264");
        }

        #[tokio::test]
        async fn fails_fatally_on_ambiguous_resolution() {
            let reader = StubReader {
                branches: vec![
                    Reference::new("release/7.41.0", "55cb3e2c"),
                    Reference::new("release/7.42.0", "4b4e5264"),
                ],
                tags: vec![],
                commits: vec![],
            };
            let result = ChangeCorrelationService::new(&reader)
                .load_changes(&query("release", None))
                .await;
            assert!(matches!(result, Err(CdLensError::AmbiguousMainline { .. })));
        }

        #[tokio::test]
        async fn labels_tag_pointer_commits() {
            let reader = StubReader {
                branches: vec![Reference::new("master", "55cb3e2c")],
                tags: vec![
                    Reference::new("1.2", "654321"),
                    Reference::new("1.3", "123456"),
                ],
                commits: vec![(
                    "master".to_string(),
                    vec![commit("654321", at(17, 1)), commit("123456", at(17, 2))],
                )],
            };
            let changes = ChangeCorrelationService::new(&reader)
                .load_changes(&query("master", Some("*")))
                .await
                .unwrap();

            assert_eq!(changes.len(), 2);
            assert_eq!(changes[0].ref_name.as_deref(), Some("1.2"));
            assert_eq!(changes[1].ref_name.as_deref(), Some("1.3"));
        }
    }

    mod pattern_branch {
        use super::*;

        fn multi_branch_reader() -> StubReader {
            StubReader {
                branches: vec![
                    Reference::new("master", "123456"),
                    Reference::new("release/1.2", "65fedcba"),
                ],
                tags: vec![],
                commits: vec![
                    (
                        "master".to_string(),
                        vec![commit("654321", at(10, 0)), commit("123456", at(11, 0))],
                    ),
                    (
                        "release/1.2".to_string(),
                        vec![
                            commit("654321", at(10, 0)),
                            commit("abcdef12", at(12, 0)),
                            commit("65fedcba", at(13, 0)),
                        ],
                    ),
                ],
            }
        }

        #[tokio::test]
        async fn labels_branch_exclusive_commits_only() {
            let reader = multi_branch_reader();
            let changes = ChangeCorrelationService::new(&reader)
                .load_changes(&query("^(master|release)", None))
                .await
                .unwrap();

            assert_eq!(changes.len(), 4);
            let labeled: Vec<(&str, Option<&str>)> = changes
                .iter()
                .map(|c| (c.revision.as_str(), c.ref_name.as_deref()))
                .collect();
            assert_eq!(
                labeled,
                vec![
                    ("654321", None),
                    ("123456", None),
                    ("abcdef12", Some("release/1.2")),
                    ("65fedcba", Some("release/1.2")),
                ]
            );
        }

        #[tokio::test]
        async fn result_is_sorted_by_timestamp() {
            let reader = multi_branch_reader();
            let changes = ChangeCorrelationService::new(&reader)
                .load_changes(&query("^(master|release)", None))
                .await
                .unwrap();
            let timestamps: Vec<_> = changes.iter().map(|c| c.timestamp).collect();
            let mut sorted = timestamps.clone();
            sorted.sort();
            assert_eq!(timestamps, sorted);
        }

        #[tokio::test]
        async fn tags_override_branch_labels() {
            let mut reader = multi_branch_reader();
            reader.tags = vec![Reference::new("4.5.0-1", "abcdef12")];
            let changes = ChangeCorrelationService::new(&reader)
                .load_changes(&query("^(master|release)", Some("*")))
                .await
                .unwrap();

            let tagged = changes.iter().find(|c| c.revision == "abcdef12").unwrap();
            assert_eq!(tagged.ref_name.as_deref(), Some("4.5.0-1"));
        }
    }

    mod branch_diff_fn {
        use super::*;

        #[test]
        fn never_contains_mainline_revisions() {
            let mainline: HashSet<String> =
                ["a".to_string(), "b".to_string()].into_iter().collect();
            let branch = vec![commit("a", at(10, 0)), commit("c", at(11, 0))];
            let diff = branch_diff(branch, &mainline);
            assert_eq!(diff.len(), 1);
            assert_eq!(diff[0].revision, "c");
        }

        #[test]
        fn identical_branches_yield_the_empty_set() {
            let mainline: HashSet<String> =
                ["a".to_string(), "b".to_string()].into_iter().collect();
            let branch = vec![commit("a", at(10, 0)), commit("b", at(11, 0))];
            assert!(branch_diff(branch, &mainline).is_empty());
        }
    }
}
