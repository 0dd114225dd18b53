use futures::stream::{self, StreamExt, TryStreamExt};
use log::{info, warn};

use super::core::{GitLabProvider, MAX_IN_FLIGHT_JOB_REQUESTS};
use crate::error::{CdLensError, Result};
use crate::events::{ChangeReader, DeploymentEvent, DeploymentReader, EventsQuery, RunResult};
use crate::providers::gitlab::progress_bar::fetch_progress;
use crate::providers::gitlab::types::{GitLabJob, GitLabPipeline};

impl DeploymentReader for GitLabProvider {
    async fn load_production_deployments(
        &self,
        query: &EventsQuery,
    ) -> Result<Vec<DeploymentEvent>> {
        let pipelines = self.pipelines_for_references(query).await?;

        let progress = fetch_progress(pipelines.len(), "Fetching jobs for pipelines");
        let progress = &progress;

        let candidates = &query.prod_deployment_job_names;
        let picked_jobs: Vec<Option<GitLabJob>> = stream::iter(pipelines)
            .map(|pipeline: GitLabPipeline| async move {
                let jobs = self
                    .client
                    .fetch_pipeline_jobs(&self.project_path, pipeline.id)
                    .await?;
                progress.inc(1);
                Ok::<_, CdLensError>(find_prod_deployment_job(jobs, pipeline.id, candidates))
            })
            .buffered(MAX_IN_FLIGHT_JOB_REQUESTS)
            .try_collect()
            .await?;
        progress.finish_and_clear();

        let deployments: Vec<DeploymentEvent> = picked_jobs
            .into_iter()
            .flatten()
            .filter_map(job_to_event)
            .collect();
        info!("Got and filtered {} deployment jobs", deployments.len());
        Ok(deployments)
    }
}

impl GitLabProvider {
    /// Pipeline runs on the refs the query targets: the matched tags when
    /// deployments are tag-triggered, the matched branches otherwise.
    async fn pipelines_for_references(&self, query: &EventsQuery) -> Result<Vec<GitLabPipeline>> {
        let references = match &query.tags {
            Some(pattern) => self.load_tags(pattern).await?,
            None => self.load_branches(&query.branch).await?,
        };

        let mut pipelines = Vec::new();
        for reference in &references {
            let batch = self
                .client
                .fetch_pipelines(&self.project_path, &reference.name, query.since, query.until)
                .await?;
            pipelines.extend(batch);
        }
        info!(
            "Got {} pipeline runs on {} reference(s)",
            pipelines.len(),
            references.len()
        );
        Ok(pipelines)
    }
}

/// Pick the production deployment job of one pipeline. One candidate must
/// be finished to count; among several, job-name priority order wins and
/// ties go to the most recently created run.
pub(crate) fn find_prod_deployment_job(
    all_jobs: Vec<GitLabJob>,
    pipeline_id: u64,
    candidate_names: &[String],
) -> Option<GitLabJob> {
    let all_names: Vec<String> = all_jobs.iter().map(|j| j.name.clone()).collect();
    let mut candidates: Vec<GitLabJob> = all_jobs
        .into_iter()
        .filter(|j| candidate_names.contains(&j.name))
        .collect();

    match candidates.len() {
        0 => {
            warn!(
                "Found no deployment jobs for pipeline {pipeline_id} among jobs named {all_names:?}"
            );
            None
        }
        1 => {
            let job = candidates.remove(0);
            if job.finished_at.is_some() {
                Some(job)
            } else {
                None
            }
        }
        n => {
            let selected = candidate_names
                .iter()
                .find_map(|name| most_recent_finished_run(&candidates, name));
            match &selected {
                Some(job) => warn!(
                    "Found {n} deployment jobs for pipeline {pipeline_id}, choosing '{}' run at {}",
                    job.name, job.created_at
                ),
                None => warn!(
                    "Found {n} deployment jobs for pipeline {pipeline_id}, could not determine which one to choose"
                ),
            }
            selected
        }
    }
}

fn most_recent_finished_run(candidates: &[GitLabJob], job_name: &str) -> Option<GitLabJob> {
    candidates
        .iter()
        .filter(|j| j.name == job_name && j.finished_at.is_some())
        .max_by_key(|j| j.created_at)
        .cloned()
}

fn job_to_event(job: GitLabJob) -> Option<DeploymentEvent> {
    let finished_at = job.finished_at?;
    Some(DeploymentEvent {
        revision: job.commit.short_id,
        timestamp: finished_at,
        result: RunResult::parse(&job.status),
        job_name: job.name,
        url: job.web_url,
        ref_name: Some(job.ref_),
        metrics: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::providers::gitlab::types::GitLabCommitRef;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 10, hour, minute, 0).unwrap()
    }

    fn job(name: &str, created_at: DateTime<Utc>, finished: bool) -> GitLabJob {
        GitLabJob {
            id: 56789,
            name: name.to_string(),
            stage: "deploy".to_string(),
            status: "success".to_string(),
            ref_: "master".to_string(),
            created_at,
            finished_at: finished.then(|| created_at + chrono::Duration::minutes(5)),
            web_url: Some("https://gitlab.example.com/group/app/-/jobs/56789".to_string()),
            commit: GitLabCommitRef {
                short_id: "4b4e5264".to_string(),
            },
        }
    }

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    mod find_prod_deployment_job {
        use super::*;

        #[test]
        fn picks_the_single_finished_candidate() {
            let jobs = vec![job("build", at(10, 0), true), job("deploy-prod", at(10, 5), true)];
            let picked =
                find_prod_deployment_job(jobs, 1, &candidates(&["deploy-prod"])).unwrap();
            assert_eq!(picked.name, "deploy-prod");
        }

        #[test]
        fn rejects_a_single_unfinished_candidate() {
            let jobs = vec![job("deploy-prod", at(10, 0), false)];
            assert!(find_prod_deployment_job(jobs, 1, &candidates(&["deploy-prod"])).is_none());
        }

        #[test]
        fn returns_nothing_when_no_job_name_matches() {
            let jobs = vec![job("build", at(10, 0), true), job("test", at(10, 5), true)];
            assert!(find_prod_deployment_job(jobs, 1, &candidates(&["deploy-prod"])).is_none());
        }

        #[test]
        fn prefers_earlier_candidate_names_over_later_ones() {
            let jobs = vec![
                job("deploy-fallback", at(11, 0), true),
                job("deploy-prod", at(10, 0), true),
            ];
            let picked = find_prod_deployment_job(
                jobs,
                1,
                &candidates(&["deploy-prod", "deploy-fallback"]),
            )
            .unwrap();
            assert_eq!(picked.name, "deploy-prod");
        }

        #[test]
        fn picks_the_most_recent_run_of_the_same_job() {
            let jobs = vec![
                job("deploy-prod", at(10, 0), true),
                job("deploy-prod", at(12, 0), true),
                job("deploy-prod", at(11, 0), true),
            ];
            let picked =
                find_prod_deployment_job(jobs, 1, &candidates(&["deploy-prod"])).unwrap();
            assert_eq!(picked.created_at, at(12, 0));
        }

        #[test]
        fn skips_unfinished_runs_when_prioritising() {
            let jobs = vec![
                job("deploy-prod", at(12, 0), false),
                job("deploy-fallback", at(10, 0), true),
            ];
            let picked = find_prod_deployment_job(
                jobs,
                1,
                &candidates(&["deploy-prod", "deploy-fallback"]),
            )
            .unwrap();
            assert_eq!(picked.name, "deploy-fallback");
        }
    }

    mod job_to_event {
        use super::*;

        #[test]
        fn uses_the_finish_time_as_the_event_timestamp() {
            let event = job_to_event(job("deploy-prod", at(10, 0), true)).unwrap();
            assert_eq!(event.timestamp, at(10, 5));
            assert_eq!(event.revision, "4b4e5264");
            assert_eq!(event.result, RunResult::Success);
            assert_eq!(event.ref_name.as_deref(), Some("master"));
        }

        #[test]
        fn unfinished_jobs_produce_no_event() {
            assert!(job_to_event(job("deploy-prod", at(10, 0), false)).is_none());
        }
    }
}
