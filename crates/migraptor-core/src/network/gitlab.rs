//! GitLab REST API client.
//!
//! Provides:
//! - Group, project and container registry endpoints used by the migration
//! - Page-by-page listing until a short page is returned; a listing that
//!   outgrows the page cap is an error, never a partial result
//! - Retries with backoff for idempotent reads

use crate::config::NetworkConfig;
use crate::models::{Group, Project, RegistryRepository, RegistryTag, User};
use crate::network::client::HttpClient;
use crate::network::retry::{retry_async, RetryConfig};
use crate::network::traits::SourceControl;
use crate::{MigraptorError, Result};
use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// GitLab API client for a single instance.
pub struct GitLabClient {
    http: Arc<HttpClient>,
    retry: RetryConfig,
    per_page: u32,
}

impl GitLabClient {
    /// Create a client for `instance` (e.g. `gitlab.com`).
    pub fn new(instance: &str, token: &str) -> Result<Self> {
        Self::with_base_url(format!("https://{}/api/v4", instance), token)
    }

    /// Create a client against an explicit API base URL.
    pub fn with_base_url(base_url: impl Into<String>, token: &str) -> Result<Self> {
        let http = HttpClient::new(base_url, token)?;
        Ok(Self {
            http: Arc::new(http),
            retry: RetryConfig::backoff(
                NetworkConfig::MAX_RETRIES,
                NetworkConfig::RETRY_BASE_DELAY,
                NetworkConfig::RETRY_MAX_DELAY,
            ),
            per_page: NetworkConfig::PER_PAGE,
        })
    }

    /// Override the retry policy for reads.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override the page size used for list endpoints.
    pub fn with_page_size(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Verify the token by fetching the current user.
    pub async fn check_connection(&self) -> Result<User> {
        let user = self.current_user().await?;
        info!("Connected to {} as {}", self.http.base_url(), user.username);
        Ok(user)
    }

    // Internal methods

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let http = self.http.clone();

        let (result, stats) = retry_async(
            &self.retry,
            || {
                let http = http.clone();
                let query = query.to_vec();
                async move {
                    let response = http.get(path, &query).await?;
                    let response = expect_success(response, path)?;
                    response.json::<T>().await.map_err(|e| MigraptorError::Json {
                        message: format!("Failed to parse response from {}: {}", path, e),
                        source: None,
                    })
                }
            },
            |e: &MigraptorError| e.is_retryable(),
        )
        .await;

        if stats.attempts > 1 {
            debug!("GET {} finished after {} attempts", path, stats.attempts);
        }
        result
    }

    async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();

        for page in 1..=NetworkConfig::MAX_PAGES {
            let query = [
                ("per_page", self.per_page.to_string()),
                ("page", page.to_string()),
            ];
            let batch: Vec<T> = self.get_json(path, &query).await?;
            let count = batch.len();
            items.extend(batch);

            if count < self.per_page as usize {
                return Ok(items);
            }
        }

        Err(MigraptorError::Truncated {
            endpoint: path.to_string(),
            pages: NetworkConfig::MAX_PAGES,
        })
    }
}

fn expect_success(response: Response, endpoint: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(MigraptorError::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl SourceControl for GitLabClient {
    async fn current_user(&self) -> Result<User> {
        self.get_json("/user", &[]).await
    }

    async fn search_group(&self, full_path: &str) -> Result<Option<Group>> {
        let path = format!(
            "/groups/{}",
            urlencoding::encode(full_path.trim_matches('/'))
        );
        match self.get_json::<Group>(&path, &[]).await {
            Ok(group) => Ok(Some(group)),
            Err(MigraptorError::UnexpectedStatus { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>> {
        self.get_all_pages(&format!("/groups/{}/subgroups", group_id))
            .await
    }

    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>> {
        self.get_all_pages(&format!("/groups/{}/projects", group_id))
            .await
    }

    async fn create_group(&self, name: &str, parent_id: u64) -> Result<Group> {
        let body = json!({ "name": name, "path": name, "parent_id": parent_id });
        let response = self.http.post_json("/groups", &body).await?;
        let response = expect_success(response, "/groups")?;
        Ok(response.json::<Group>().await?)
    }

    async fn transfer_group(&self, group_id: u64, destination_id: u64) -> Result<u16> {
        let path = format!("/groups/{}/transfer", group_id);
        let response = self
            .http
            .post_json(&path, &json!({ "group_id": destination_id }))
            .await?;
        Ok(response.status().as_u16())
    }

    async fn transfer_project(&self, project_id: u64, destination_id: u64) -> Result<u16> {
        let path = format!("/projects/{}/transfer", project_id);
        let response = self
            .http
            .put_json(&path, &json!({ "namespace": destination_id }))
            .await?;
        Ok(response.status().as_u16())
    }

    async fn archive_project(&self, project_id: u64) -> Result<u16> {
        let response = self
            .http
            .post(&format!("/projects/{}/archive", project_id))
            .await?;
        Ok(response.status().as_u16())
    }

    async fn unarchive_project(&self, project_id: u64) -> Result<u16> {
        let response = self
            .http
            .post(&format!("/projects/{}/unarchive", project_id))
            .await?;
        Ok(response.status().as_u16())
    }

    async fn list_registry_repositories(
        &self,
        project_id: u64,
    ) -> Result<Vec<RegistryRepository>> {
        self.get_all_pages(&format!("/projects/{}/registry/repositories", project_id))
            .await
    }

    async fn list_repository_tags(
        &self,
        project_id: u64,
        repository_id: u64,
    ) -> Result<Vec<RegistryTag>> {
        self.get_all_pages(&format!(
            "/projects/{}/registry/repositories/{}/tags",
            project_id, repository_id
        ))
        .await
    }

    async fn delete_repository(&self, project_id: u64, repository_id: u64) -> Result<()> {
        let path = format!(
            "/projects/{}/registry/repositories/{}",
            project_id, repository_id
        );
        let response = self.http.delete(&path).await?;
        expect_success(response, &path)?;
        Ok(())
    }

    async fn delete_repository_tag(
        &self,
        project_id: u64,
        repository_id: u64,
        tag: &str,
    ) -> Result<()> {
        let path = format!(
            "/projects/{}/registry/repositories/{}/tags/{}",
            project_id,
            repository_id,
            urlencoding::encode(tag)
        );
        let response = self.http.delete(&path).await?;
        expect_success(response, &path)?;
        Ok(())
    }
}
