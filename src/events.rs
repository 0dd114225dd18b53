use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use crate::error::Result;

/// A named pointer into source history (branch or tag) resolving to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Display name (e.g., "master", "release/2.58.0", "4.3.0")
    pub name: String,
    /// Revision the reference points at
    pub commit: String,
    /// Remote-tracking form distinct from the display name, when the
    /// underlying source reports one (e.g., "refs/remotes/origin/master")
    pub qualified_name: Option<String>,
}

impl Reference {
    pub fn new(name: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit: commit.into(),
            qualified_name: None,
        }
    }
}

/// Outcome of a CI/CD run. Only `Success` and `Failed` are terminal and
/// participate in rate math; everything else (running, canceled, skipped)
/// is carried as `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Success,
    Failed,
    Other(String),
}

impl Serialize for RunResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl RunResult {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Other(raw) => raw,
        }
    }
}

fn duration_seconds<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_i64(duration.num_seconds())
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

/// Throughput metrics attached to a change once its delivering deployment
/// is known.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetrics {
    /// The earliest successful deployment that shipped this change
    pub deployment: DeploymentEvent,
    /// Deployment completion time minus the change's authoring time
    #[serde(rename = "cycleTimeSeconds", serialize_with = "duration_seconds")]
    pub cycle_time: Duration,
    #[serde(
        rename = "cycleTimeRollingAverageSeconds",
        serialize_with = "opt_duration_seconds"
    )]
    pub cycle_time_rolling_average: Option<Duration>,
}

/// Metrics attached to a deployment once changes have been attributed to it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMetrics {
    /// Number of changes this deployment shipped
    pub change_set_size: usize,
    pub change_set_rolling_average: Option<f64>,
}

/// A single commit, normalized from whatever source produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Revision id, unique within one source fetch
    pub revision: String,
    /// Commit/record time
    pub timestamp: DateTime<Utc>,
    /// Authoring time (cycle time is measured from here)
    pub author_timestamp: DateTime<Utc>,
    pub is_merge_commit: bool,
    /// Branch or tag label assigned during correlation, at most one per pass
    pub ref_name: Option<String>,
    pub metrics: Option<ChangeMetrics>,
}

/// A completed CI/CD job run that deployed to production.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEvent {
    pub revision: String,
    /// Job completion time
    pub timestamp: DateTime<Utc>,
    pub result: RunResult,
    pub job_name: String,
    pub url: Option<String>,
    pub ref_name: Option<String>,
    pub metrics: Option<DeploymentMetrics>,
}

/// A timeline entry: either a code change or a production deployment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "eventType", rename_all = "lowercase")]
pub enum Event {
    Change(ChangeEvent),
    Deployment(DeploymentEvent),
}

impl Event {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Change(c) => c.timestamp,
            Self::Deployment(d) => d.timestamp,
        }
    }

    pub fn revision(&self) -> &str {
        match self {
            Self::Change(c) => &c.revision,
            Self::Deployment(d) => &d.revision,
        }
    }

    /// Reference label, with empty strings treated as unlabeled.
    pub fn ref_label(&self) -> Option<&str> {
        let label = match self {
            Self::Change(c) => c.ref_name.as_deref(),
            Self::Deployment(d) => d.ref_name.as_deref(),
        };
        label.filter(|l| !l.is_empty())
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Change(_) => "change",
            Self::Deployment(_) => "deployment",
        }
    }
}

/// Parameters of one metrics computation over the half-open interval
/// `[since, until)`.
#[derive(Debug, Clone)]
pub struct EventsQuery {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    /// A literal branch name or a search pattern
    pub branch: String,
    /// If production deployments are triggered by tags, a search pattern
    /// for those tags
    pub tags: Option<String>,
    /// Names of jobs that deploy to production, in disambiguation
    /// priority order
    pub prod_deployment_job_names: Vec<String>,
}

impl EventsQuery {
    /// Whether `branch` denotes a search pattern rather than a single
    /// literal name. Wildcards and regex anchors mark a pattern.
    pub fn branch_is_pattern(&self) -> bool {
        self.branch.contains(['*', '^'])
    }
}

/// Source of commits and branch/tag references.
pub trait ChangeReader {
    async fn load_tags(&self, pattern: &str) -> Result<Vec<Reference>>;
    async fn load_branches(&self, pattern: &str) -> Result<Vec<Reference>>;
    async fn load_commits_for_reference(
        &self,
        query: &EventsQuery,
        reference: &Reference,
    ) -> Result<Vec<ChangeEvent>>;
}

/// Source of production deployment events.
pub trait DeploymentReader {
    async fn load_production_deployments(
        &self,
        query: &EventsQuery,
    ) -> Result<Vec<DeploymentEvent>>;
}
