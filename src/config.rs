use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure for `CdLens`.
///
/// Lets users save connection and analysis settings and reuse them across
/// runs. Files are loaded from an explicit path, the current directory, or
/// the user configuration directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitLab connection settings
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// Change/deployment correlation settings
    #[serde(default)]
    pub throughput: ThroughputConfig,

    /// Output preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab personal access token
    pub token: Option<String>,

    /// GitLab instance base URL
    #[serde(default = "default_gitlab_base_url")]
    pub base_url: String,

    /// GitLab project path (e.g., 'group/project')
    pub project_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThroughputConfig {
    /// Branch that releases to production, or a search pattern for
    /// release branches
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Search pattern for release tags, when deployments are triggered
    /// by tags
    pub tags: Option<String>,

    /// Names of jobs that deploy to production, in priority order
    #[serde(default)]
    pub deployment_jobs: Vec<String>,

    /// Window for rolling averages, in days
    #[serde(default = "default_rolling_window_days")]
    pub rolling_window_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab-separated timeline lines / terminal tables
    #[default]
    Text,
    Json,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_gitlab_base_url(),
            project_path: None,
        }
    }
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            tags: None,
            deployment_jobs: Vec::new(),
            rolling_window_days: default_rolling_window_days(),
        }
    }
}

fn default_gitlab_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_rolling_window_days() -> i64 {
    30
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches in this order:
    /// 1. Specified path (must exist)
    /// 2. ./cdlens.{toml,json,yaml,yml}
    /// 3. <user config dir>/cdlens/cdlens.toml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["cdlens.toml", "cdlens.json", "cdlens.yaml", "cdlens.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = Self::user_config_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cdlens").join("cdlens.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Save configuration to a file, choosing the format by extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
