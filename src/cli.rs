use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{Config, OutputFormat};
use crate::events::{DeploymentReader, EventsQuery};
use crate::output;
use crate::providers::GitLabProvider;
use crate::stability::metrics::StabilityData;
use crate::stability::model::{PipelineReader, StabilityQuery};
use crate::throughput::changes::ChangeCorrelationService;
use crate::throughput::metrics::EventSeries;
use crate::throughput::timeline::{self, TimelinePolicy};
use crate::timeutil;

#[derive(Parser)]
#[command(name = "cdlens")]
#[command(author, version, about = "Software delivery metrics from commits and CI/CD runs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write results to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Pretty-print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List change and production deployment events as one timeline, with
    /// cycle times and rolling averages
    Events {
        #[arg(short, long, env = "GITLAB_TOKEN")]
        token: Option<String>,

        #[arg(short, long, env = "GITLAB_URL")]
        url: Option<String>,

        /// Project path (e.g., 'group/project')
        #[arg(short = 'P', long)]
        project: Option<String>,

        /// Branch that releases to production, or a pattern matching the
        /// release branches
        #[arg(short, long)]
        branch: Option<String>,

        /// Search pattern for release tags, when production deployments
        /// are triggered by tags
        #[arg(long)]
        tags: Option<String>,

        /// Names of jobs that deploy to production, prioritised in order
        #[arg(short = 'j', long = "deployment-job")]
        deployment_jobs: Vec<String>,

        /// Start of the time frame (YYYY-MM-DD)
        #[arg(short, long)]
        since: String,

        /// End of the time frame (YYYY-MM-DD or 'today')
        #[arg(short = 'u', long, default_value = "today")]
        until: String,

        /// Window for rolling averages, in days
        #[arg(short = 'w', long)]
        rolling_window_days: Option<i64>,
    },

    /// Failure rates and mean time to restore for pipeline runs
    Stability {
        #[arg(short, long, env = "GITLAB_TOKEN")]
        token: Option<String>,

        #[arg(short, long, env = "GITLAB_URL")]
        url: Option<String>,

        /// Project path (e.g., 'group/project')
        #[arg(short = 'P', long)]
        project: Option<String>,

        /// Branch whose pipeline runs are inspected
        #[arg(short, long)]
        branch: Option<String>,

        /// Start of the time frame (YYYY-MM-DD)
        #[arg(short, long)]
        since: String,

        /// End of the time frame (YYYY-MM-DD or 'today')
        #[arg(short = 'u', long, default_value = "today")]
        until: String,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Events {
                token,
                url,
                project,
                branch,
                tags,
                deployment_jobs,
                since,
                until,
                rolling_window_days,
            } => {
                let provider = build_provider(&config, token, url, project)?;
                let query = EventsQuery {
                    since: timeutil::parse_day(since)?,
                    until: parse_until(until)?,
                    branch: branch
                        .clone()
                        .unwrap_or_else(|| config.throughput.branch.clone()),
                    tags: tags.clone().or_else(|| config.throughput.tags.clone()),
                    prod_deployment_job_names: if deployment_jobs.is_empty() {
                        config.throughput.deployment_jobs.clone()
                    } else {
                        deployment_jobs.clone()
                    },
                };
                if query.prod_deployment_job_names.is_empty() {
                    bail!("No production deployment job names given; pass --deployment-job or set throughput.deployment-jobs in the config file");
                }
                let window = rolling_window_days.unwrap_or(config.throughput.rolling_window_days);

                self.execute_events(&provider, &query, window, &config)
                    .await
            }
            Commands::Stability {
                token,
                url,
                project,
                branch,
                since,
                until,
            } => {
                let provider = build_provider(&config, token, url, project)?;
                let query = StabilityQuery {
                    since: timeutil::parse_day(since)?,
                    until: parse_until(until)?,
                    branch: branch
                        .clone()
                        .unwrap_or_else(|| config.throughput.branch.clone()),
                };

                self.execute_stability(&provider, &query, &config).await
            }
        }
    }

    async fn execute_events(
        &self,
        provider: &GitLabProvider,
        query: &EventsQuery,
        rolling_window_days: i64,
        config: &Config,
    ) -> Result<()> {
        eprintln!(
            "Getting changes and deployments for project {}, focusing on {} and considering jobs named {} production deployments",
            output::cyan(&provider.project_path),
            output::cyan(query.tags.as_deref().unwrap_or(&query.branch)),
            output::cyan(format!("{:?}", query.prod_deployment_job_names)),
        );

        let changes = ChangeCorrelationService::new(provider)
            .load_changes(query)
            .await?;
        info!("Determined {} change events", changes.len());

        let deployments = provider.load_production_deployments(query).await?;
        info!(
            "Determined {} production deployment events",
            deployments.len()
        );

        let policy = TimelinePolicy::for_query(query);
        let events = timeline::build(changes, deployments, policy);

        let mut series = EventSeries::from_timeline(events);
        series.add_throughput_metrics();
        series.add_rolling_averages(rolling_window_days);

        let changes: Vec<_> = series.changes.into_iter().map(crate::events::Event::Change).collect();
        let deployments: Vec<_> = series
            .deployments
            .into_iter()
            .map(crate::events::Event::Deployment)
            .collect();
        let events = timeline::rebuild(
            changes.into_iter().chain(deployments).collect(),
            policy,
        );

        let rendered = match self.effective_format(config) {
            OutputFormat::Text => output::timeline_lines(&events).join("\n"),
            OutputFormat::Json => self.to_json(&events, config)?,
        };
        self.write_result(&rendered)
    }

    async fn execute_stability(
        &self,
        provider: &GitLabProvider,
        query: &StabilityQuery,
        config: &Config,
    ) -> Result<()> {
        let runs = provider.load_pipelines(query).await?;
        if runs.is_empty() {
            eprintln!(
                "{}",
                output::bright_yellow(format!(
                    "No pipeline runs found on {} in the given time frame",
                    query.branch
                ))
            );
        }

        let data = StabilityData::from_runs(runs);

        let rendered = match self.effective_format(config) {
            OutputFormat::Text => format!(
                "{}\n{}",
                output::failure_rate_table(&data),
                output::mttr_table(&data.pipeline_mttrs)
            ),
            OutputFormat::Json => self.to_json(&data, config)?,
        };
        self.write_result(&rendered)
    }

    fn effective_format(&self, config: &Config) -> OutputFormat {
        self.format.unwrap_or(config.output.format)
    }

    fn to_json<T: serde::Serialize>(&self, value: &T, config: &Config) -> Result<String> {
        let json = if self.pretty || config.output.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }

    fn write_result(&self, rendered: &str) -> Result<()> {
        if let Some(output_path) = &self.output {
            std::fs::write(output_path, rendered)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Results written to: {}", output_path.display());
        } else {
            println!("{rendered}");
        }
        Ok(())
    }
}

fn build_provider(
    config: &Config,
    token: &Option<String>,
    url: &Option<String>,
    project: &Option<String>,
) -> Result<GitLabProvider> {
    let token = token
        .clone()
        .or_else(|| config.gitlab.token.clone())
        .map(Token::from);
    let url = url.clone().unwrap_or_else(|| config.gitlab.base_url.clone());
    let Some(project) = project.clone().or_else(|| config.gitlab.project_path.clone()) else {
        bail!("No project given; pass --project or set gitlab.project-path in the config file");
    };

    Ok(GitLabProvider::new(&url, project, token)?)
}

fn parse_until(raw: &str) -> Result<chrono::DateTime<Utc>> {
    if raw == "today" {
        Ok(Utc::now())
    } else {
        Ok(timeutil::parse_day(raw)?)
    }
}
