use crate::auth::Token;
use crate::error::Result;
use crate::providers::gitlab::client::GitLabClient;

/// GitLab-backed source of change and deployment events.
///
/// Implements the reader traits on top of the GitLab REST API for one
/// project.
pub struct GitLabProvider {
    pub client: GitLabClient,
    pub project_path: String,
}

/// Upper bound on concurrent per-pipeline job listings.
pub(super) const MAX_IN_FLIGHT_JOB_REQUESTS: usize = 50;

impl GitLabProvider {
    pub fn new(base_url: &str, project_path: String, token: Option<Token>) -> Result<Self> {
        let client = GitLabClient::new(base_url, token)?;

        Ok(Self {
            client,
            project_path,
        })
    }
}
