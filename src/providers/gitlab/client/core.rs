use std::sync::Arc;
use std::time::Duration;

use log::warn;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::error::{CdLensError, Result};

const MAX_RETRIES: u32 = 30;
const RETRY_DELAY_SECONDS: u64 = 10;
const MAX_CONCURRENT_REQUESTS: usize = 50;
pub(super) const PAGE_SIZE: usize = 100;

pub struct GitLabClient {
    pub client: Client,
    pub api_url: Url,
    pub token: Option<Token>,
    semaphore: Arc<Semaphore>,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("cdlens/0.3.0")
            .build()
            .map_err(|e| CdLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| CdLensError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| CdLensError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        })
    }

    pub fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Construct a project-scoped API URL; the project path's slashes must
    /// arrive at GitLab percent-encoded.
    pub fn project_url(&self, project_path: &str, resource: &str) -> Result<Url> {
        self.api_url
            .join(&format!(
                "projects/{}/{resource}",
                project_path.replace('/', "%2F")
            ))
            .map_err(|e| CdLensError::Config(format!("Invalid project URL: {e}")))
    }

    /// Issue one GET with automatic retry on network errors, rate limits
    /// and server errors, and parse the JSON body.
    pub(super) async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        // One permit per logical request caps total in-flight requests
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CdLensError::Config("HTTP request limiter was closed".to_string()))?;

        let mut retry_count = 0;
        loop {
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    if retry_count >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({}), retrying in {}s ({}/{})...",
                        e,
                        RETRY_DELAY_SECONDS,
                        retry_count + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECONDS)).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == 429 || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(CdLensError::ApiAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_RETRIES,
                    });
                }

                warn!(
                    "GitLab API error (status {status}). Waiting {RETRY_DELAY_SECONDS} seconds before retry {}/{}...",
                    retry_count + 1,
                    MAX_RETRIES
                );

                tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECONDS)).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(CdLensError::Api {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            return Ok(response.json().await?);
        }
    }

    /// Fetch every page of a list endpoint. A page shorter than the page
    /// size marks the end.
    pub(super) async fn get_paged<T>(&self, url: Url) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut all_items = Vec::new();
        let mut page = 1usize;

        loop {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let items: Vec<T> = self.get_json(page_url).await?;
            let fetched = items.len();
            all_items.extend(items);

            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(all_items)
    }
}
