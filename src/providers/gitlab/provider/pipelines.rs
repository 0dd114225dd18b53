use futures::stream::{self, StreamExt, TryStreamExt};
use log::info;

use super::core::{GitLabProvider, MAX_IN_FLIGHT_JOB_REQUESTS};
use crate::error::{CdLensError, Result};
use crate::events::RunResult;
use crate::providers::gitlab::progress_bar::fetch_progress;
use crate::providers::gitlab::types::GitLabJob;
use crate::stability::model::{JobRun, PipelineReader, PipelineRun, StabilityQuery};

impl PipelineReader for GitLabProvider {
    async fn load_pipelines(&self, query: &StabilityQuery) -> Result<Vec<PipelineRun>> {
        let pipelines = self
            .client
            .fetch_pipelines(&self.project_path, &query.branch, query.since, query.until)
            .await?;
        info!(
            "Got {} pipeline runs on {}",
            pipelines.len(),
            query.branch
        );

        let progress = fetch_progress(pipelines.len(), "Fetching jobs for pipelines");
        let progress = &progress;

        let runs: Vec<PipelineRun> = stream::iter(pipelines)
            .map(|pipeline| async move {
                let jobs = self
                    .client
                    .fetch_pipeline_jobs(&self.project_path, pipeline.id)
                    .await?;
                progress.inc(1);

                let job_runs: Vec<JobRun> = jobs.into_iter().map(job_to_run).collect();
                Ok::<_, CdLensError>(PipelineRun {
                    id: pipeline.id.to_string(),
                    pipeline_name: pipeline_name(&job_runs, &pipeline.ref_),
                    result: RunResult::parse(&pipeline.status),
                    timestamp: pipeline.created_at,
                    jobs: job_runs,
                })
            })
            .buffered(MAX_IN_FLIGHT_JOB_REQUESTS)
            .try_collect()
            .await?;
        progress.finish_and_clear();

        Ok(runs)
    }
}

fn job_to_run(job: GitLabJob) -> JobRun {
    JobRun {
        id: job.id.to_string(),
        job_name: job.name,
        stage_name: job.stage,
        result: RunResult::parse(&job.status),
        timestamp: job.finished_at.unwrap_or(job.created_at),
        ref_name: job.ref_,
    }
}

/// Runs of "the same pipeline" are grouped by the distinct stage names in
/// job order; a pipeline without jobs falls back to its ref.
fn pipeline_name(jobs: &[JobRun], ref_name: &str) -> String {
    let mut stages: Vec<&str> = Vec::new();
    for job in jobs {
        if !stages.contains(&job.stage_name.as_str()) {
            stages.push(&job.stage_name);
        }
    }
    if stages.is_empty() {
        ref_name.to_string()
    } else {
        stages.join(":")
    }
}
