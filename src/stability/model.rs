use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::events::RunResult;

/// One CI/CD pipeline execution with its job runs.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub id: String,
    /// Groups runs of the same pipeline across time, derived from the
    /// pipeline's distinct stage names (or the ref when stages are
    /// unavailable)
    pub pipeline_name: String,
    pub result: RunResult,
    pub timestamp: DateTime<Utc>,
    pub jobs: Vec<JobRun>,
}

/// A single job execution inside a pipeline run.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub id: String,
    pub job_name: String,
    pub stage_name: String,
    pub result: RunResult,
    pub timestamp: DateTime<Utc>,
    pub ref_name: String,
}

impl JobRun {
    /// Grouping key for job-level failure rates.
    pub fn key(&self) -> String {
        format!("{}::{}", self.stage_name, self.job_name)
    }
}

/// Failure percentage over a set of terminal runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRate {
    /// 0 to 100, rounded to two decimals; 0 when no terminal runs exist
    pub failure_rate: f64,
    pub number_of_success: usize,
    pub number_of_failed: usize,
    pub name: Option<String>,
}

fn opt_duration_seconds<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match duration {
        Some(d) => serializer.serialize_some(&d.num_seconds()),
        None => serializer.serialize_none(),
    }
}

/// Mean time to restore for one pipeline grouping. When no restore can be
/// measured, `mttr` is absent and `comment` says why.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MttrRecord {
    pub pipeline_name: String,
    #[serde(rename = "mttrSeconds", serialize_with = "opt_duration_seconds")]
    pub mttr: Option<Duration>,
    pub number_of_runs: usize,
    pub comment: Option<String>,
}

/// Parameters for one stability computation over `[since, until)`.
#[derive(Debug, Clone)]
pub struct StabilityQuery {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    /// Branch whose pipeline runs are inspected
    pub branch: String,
}

/// Source of pipeline runs with their jobs.
pub trait PipelineReader {
    async fn load_pipelines(&self, query: &StabilityQuery) -> Result<Vec<PipelineRun>>;
}
