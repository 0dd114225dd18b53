use chrono::{DateTime, Utc};

use super::core::GitLabClient;
use crate::error::Result;
use crate::providers::gitlab::types::{GitLabJob, GitLabPipeline};
use crate::timeutil;

impl GitLabClient {
    /// List pipeline runs of one ref whose activity falls inside the time
    /// window.
    pub async fn fetch_pipelines(
        &self,
        project_path: &str,
        ref_name: &str,
        updated_after: DateTime<Utc>,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<GitLabPipeline>> {
        let mut url = self.project_url(project_path, "pipelines")?;
        url.query_pairs_mut()
            .append_pair("ref", ref_name)
            .append_pair("updated_after", &timeutil::api_date_string(updated_after))
            .append_pair("updated_before", &timeutil::api_date_string(updated_before));
        self.get_paged(url).await
    }

    pub async fn fetch_pipeline_jobs(
        &self,
        project_path: &str,
        pipeline_id: u64,
    ) -> Result<Vec<GitLabJob>> {
        let url = self.project_url(project_path, &format!("pipelines/{pipeline_id}/jobs"))?;
        self.get_paged(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Server;

    #[tokio::test]
    async fn fetches_pipelines_for_a_ref_within_the_window() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v4/projects/group%2Fapp/pipelines")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("ref".into(), "master".into()),
                mockito::Matcher::UrlEncoded(
                    "updated_after".into(),
                    "2020-01-01T00:00:00.000+00:00".into(),
                ),
                mockito::Matcher::UrlEncoded(
                    "updated_before".into(),
                    "2020-01-31T00:00:00.000+00:00".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{
                    "id": 12345,
                    "sha": "4b4e5264",
                    "ref": "master",
                    "status": "success",
                    "created_at": "2020-01-10T17:01:21.000+00:00"
                }]"#,
            )
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), None).unwrap();
        let pipelines = client
            .fetch_pipelines(
                "group/app",
                "master",
                Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2020, 1, 31, 9, 0, 0).unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].id, 12345);
        assert_eq!(pipelines[0].status, "success");
    }

    #[tokio::test]
    async fn fetches_jobs_of_one_pipeline() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v4/projects/group%2Fapp/pipelines/12345/jobs")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{
                    "id": 56789,
                    "name": "deploy-to-prod",
                    "stage": "deploy",
                    "status": "success",
                    "ref": "master",
                    "created_at": "2020-01-10T17:05:00.000+00:00",
                    "finished_at": "2020-01-10T17:10:00.000+00:00",
                    "web_url": "https://gitlab.example.com/group/app/-/jobs/56789",
                    "commit": {"short_id": "4b4e5264"}
                }]"#,
            )
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), None).unwrap();
        let jobs = client.fetch_pipeline_jobs("group/app", 12345).await.unwrap();

        mock.assert_async().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "deploy-to-prod");
        assert_eq!(jobs[0].commit.short_id, "4b4e5264");
        assert!(jobs[0].finished_at.is_some());
    }
}
