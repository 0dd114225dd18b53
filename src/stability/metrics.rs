use chrono::Duration;
use indexmap::IndexMap;
use log::info;
use serde::Serialize;

use crate::events::RunResult;
use crate::stability::model::{FailureRate, JobRun, MttrRecord, PipelineRun};

/// Failure rates and restore times computed from one set of pipeline runs.
///
/// Only terminal results (success/failed) enter any of the math; running,
/// canceled and other in-between states are excluded entirely.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityData {
    pub pipeline_failure_rate: FailureRate,
    /// Per `stage::job` key, sorted from highest rate to lowest
    pub job_failure_rates: Vec<FailureRate>,
    /// One record per pipeline name
    pub pipeline_mttrs: Vec<MttrRecord>,
}

impl StabilityData {
    pub fn from_runs(runs: Vec<PipelineRun>) -> Self {
        let pipeline_failure_rate = failure_rate(runs.iter().map(|r| &r.result), None);
        info!(
            "Overall failure rate is {} over {} pipeline run(s)",
            pipeline_failure_rate.failure_rate,
            runs.len()
        );

        let job_failure_rates = job_failure_rates(&runs);
        let pipeline_mttrs = pipeline_mttrs(&runs);

        Self {
            pipeline_failure_rate,
            job_failure_rates,
            pipeline_mttrs,
        }
    }
}

/// `failed / (failed + success) * 100`, rounded to two decimals. Zero
/// terminal runs report a rate of 0.
pub fn failure_rate<'a, I>(results: I, name: Option<String>) -> FailureRate
where
    I: IntoIterator<Item = &'a RunResult>,
{
    let mut number_of_failed = 0;
    let mut number_of_success = 0;
    for result in results {
        match result {
            RunResult::Failed => number_of_failed += 1,
            RunResult::Success => number_of_success += 1,
            RunResult::Other(_) => {}
        }
    }

    let rate = if number_of_failed + number_of_success == 0 {
        0.0
    } else {
        round2(number_of_failed as f64 / (number_of_failed + number_of_success) as f64 * 100.0)
    };

    FailureRate {
        failure_rate: rate,
        number_of_success,
        number_of_failed,
        name,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn job_failure_rates(runs: &[PipelineRun]) -> Vec<FailureRate> {
    let mut groups: IndexMap<String, Vec<&JobRun>> = IndexMap::new();
    for job in runs.iter().flat_map(|r| &r.jobs) {
        groups.entry(job.key()).or_default().push(job);
    }

    let mut rates: Vec<FailureRate> = groups
        .into_iter()
        .map(|(key, jobs)| failure_rate(jobs.iter().map(|j| &j.result), Some(key)))
        .collect();
    rates.sort_by(|a, b| b.failure_rate.total_cmp(&a.failure_rate));
    rates
}

fn pipeline_mttrs(runs: &[PipelineRun]) -> Vec<MttrRecord> {
    let mut groups: IndexMap<&str, Vec<&PipelineRun>> = IndexMap::new();
    for run in runs.iter().filter(|r| r.result.is_terminal()) {
        groups
            .entry(run.pipeline_name.as_str())
            .or_default()
            .push(run);
    }

    groups
        .into_iter()
        .map(|(pipeline_name, mut group)| {
            group.sort_by_key(|r| r.timestamp);
            mttr_for_group(pipeline_name, &group)
        })
        .collect()
}

/// Scan one pipeline's terminal runs in time order. A failure opens an
/// outage; further failures inside it do not move the outage start; the
/// next success closes it and contributes one restore duration.
fn mttr_for_group(pipeline_name: &str, runs: &[&PipelineRun]) -> MttrRecord {
    let mut restore_durations: Vec<Duration> = Vec::new();
    let mut active_failure: Option<&PipelineRun> = None;
    let mut failed = 0;
    let mut succeeded = 0;

    for run in runs {
        match run.result {
            RunResult::Failed => {
                failed += 1;
                if active_failure.is_none() {
                    active_failure = Some(run);
                }
            }
            RunResult::Success => {
                succeeded += 1;
                if let Some(failure) = active_failure.take() {
                    restore_durations.push(run.timestamp - failure.timestamp);
                }
            }
            RunResult::Other(_) => {}
        }
    }

    let number_of_runs = runs.len();
    if restore_durations.is_empty() {
        let comment = if failed == 0 {
            format!("All {number_of_runs} run(s) succeeded, nothing was restored")
        } else if succeeded == 0 {
            format!("All {number_of_runs} run(s) failed, nothing was restored")
        } else {
            // Terminal runs exist but no success ever followed a failure
            // inside the window (e.g. successes only before the failures).
            format!("{failed} run(s) failed and {succeeded} run(s) succeeded, but no restore happened")
        };
        return MttrRecord {
            pipeline_name: pipeline_name.to_string(),
            mttr: None,
            number_of_runs,
            comment: Some(comment),
        };
    }

    let total: Duration = restore_durations
        .iter()
        .fold(Duration::zero(), |acc, d| acc + *d);
    let mean = total / restore_durations.len() as i32;
    MttrRecord {
        pipeline_name: pipeline_name.to_string(),
        mttr: Some(mean),
        number_of_runs,
        comment: None,
    }
}
