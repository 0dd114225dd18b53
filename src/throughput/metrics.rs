use chrono::{DateTime, Duration, Utc};

use crate::events::{ChangeEvent, DeploymentEvent, DeploymentMetrics, ChangeMetrics, Event, RunResult};
use crate::timeutil::floor_to_day;

const SECONDS_PER_DAY: i64 = 86_400;

/// The two event streams of one computation, kept separate so metrics can
/// be windowed per kind (changes against changes, deployments against
/// deployments).
#[derive(Debug, Default)]
pub struct EventSeries {
    pub changes: Vec<ChangeEvent>,
    pub deployments: Vec<DeploymentEvent>,
}

impl EventSeries {
    pub fn new(changes: Vec<ChangeEvent>, deployments: Vec<DeploymentEvent>) -> Self {
        Self {
            changes,
            deployments,
        }
    }

    pub fn from_timeline(events: Vec<Event>) -> Self {
        let mut series = Self::default();
        for event in events {
            match event {
                Event::Change(c) => series.changes.push(c),
                Event::Deployment(d) => series.deployments.push(d),
            }
        }
        series
    }

    /// Attribute each change to the earliest successful deployment
    /// strictly after it. Matched changes get a cycle time measured from
    /// their authoring time; the matching deployment's change-set size
    /// grows by one. A change with no qualifying deployment carries no
    /// metrics: it is not yet delivered, not an error.
    ///
    /// Matching is purely temporal and result-based; it does not require
    /// the deployment and change to share a ref.
    pub fn add_throughput_metrics(&mut self) {
        let assignments: Vec<Option<usize>> = self
            .changes
            .iter()
            .map(|change| self.next_successful_deployment(change.timestamp))
            .collect();

        for (change_idx, deployment_idx) in assignments.into_iter().enumerate() {
            let Some(deployment_idx) = deployment_idx else {
                continue;
            };
            let mut delivered_by = self.deployments[deployment_idx].clone();
            delivered_by.metrics = None;

            let change = &mut self.changes[change_idx];
            change.metrics = Some(ChangeMetrics {
                cycle_time: delivered_by.timestamp - change.author_timestamp,
                deployment: delivered_by,
                cycle_time_rolling_average: None,
            });

            self.deployments[deployment_idx]
                .metrics
                .get_or_insert_with(DeploymentMetrics::default)
                .change_set_size += 1;
        }
    }

    fn next_successful_deployment(&self, after: DateTime<Utc>) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, deployment) in self.deployments.iter().enumerate() {
            if deployment.result != RunResult::Success || deployment.timestamp <= after {
                continue;
            }
            if best.is_none_or(|b| deployment.timestamp < self.deployments[b].timestamp) {
                best = Some(idx);
            }
        }
        best
    }

    /// Compute rolling averages over a symmetric window around each
    /// event: half the window on either side, boundaries floored to day
    /// granularity, peers strictly inside. Changes average cycle time in
    /// minutes; deployments average change-set size. Events without
    /// metrics contribute nothing and receive nothing.
    pub fn add_rolling_averages(&mut self, window_in_days: i64) {
        let half_window = Duration::seconds(window_in_days * SECONDS_PER_DAY / 2);

        let cycle_times: Vec<(DateTime<Utc>, f64)> = self
            .changes
            .iter()
            .filter_map(|c| {
                c.metrics
                    .as_ref()
                    .map(|m| (c.timestamp, m.cycle_time.num_seconds() as f64 / 60.0))
            })
            .collect();
        for change in &mut self.changes {
            let Some(metrics) = change.metrics.as_mut() else {
                continue;
            };
            if let Some(mean) = windowed_mean(&cycle_times, change.timestamp, half_window) {
                metrics.cycle_time_rolling_average =
                    Some(Duration::seconds((mean * 60.0).round() as i64));
            }
        }

        let change_set_sizes: Vec<(DateTime<Utc>, f64)> = self
            .deployments
            .iter()
            .filter_map(|d| {
                d.metrics
                    .as_ref()
                    .map(|m| (d.timestamp, m.change_set_size as f64))
            })
            .collect();
        for deployment in &mut self.deployments {
            let Some(metrics) = deployment.metrics.as_mut() else {
                continue;
            };
            if let Some(mean) = windowed_mean(&change_set_sizes, deployment.timestamp, half_window)
            {
                metrics.change_set_rolling_average = Some(mean);
            }
        }
    }
}

fn windowed_mean(
    peers: &[(DateTime<Utc>, f64)],
    center: DateTime<Utc>,
    half_window: Duration,
) -> Option<f64> {
    let start = floor_to_day(center - half_window);
    let end = floor_to_day(center + half_window);
    let inside: Vec<f64> = peers
        .iter()
        .filter(|(t, _)| *t > start && *t < end)
        .map(|(_, value)| *value)
        .collect();
    if inside.is_empty() {
        return None;
    }
    Some(inside.iter().sum::<f64>() / inside.len() as f64)
}
