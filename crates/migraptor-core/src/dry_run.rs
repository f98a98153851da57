//! Dry-run decorators.
//!
//! `DryRunSource` and `DryRunEngine` wrap the real collaborators: reads go
//! through untouched, every state-changing call is logged and answered with
//! the status the real call would return on success.

use crate::engine::ContainerEngine;
use crate::error::Result;
use crate::models::{Group, Project, RegistryRepository, RegistryTag, User};
use crate::network::SourceControl;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Source-control decorator that never mutates the platform.
pub struct DryRunSource {
    inner: Arc<dyn SourceControl>,
}

impl DryRunSource {
    pub fn new(inner: Arc<dyn SourceControl>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SourceControl for DryRunSource {
    async fn current_user(&self) -> Result<User> {
        self.inner.current_user().await
    }

    async fn search_group(&self, full_path: &str) -> Result<Option<Group>> {
        self.inner.search_group(full_path).await
    }

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>> {
        self.inner.list_subgroups(group_id).await
    }

    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>> {
        self.inner.list_projects(group_id).await
    }

    async fn create_group(&self, name: &str, parent_id: u64) -> Result<Group> {
        info!("DRY RUN: would create group {} under group {}", name, parent_id);
        Ok(Group {
            id: 0,
            path: name.to_string(),
            full_path: name.to_string(),
            parent_id: Some(parent_id),
        })
    }

    async fn transfer_group(&self, group_id: u64, destination_id: u64) -> Result<u16> {
        info!(
            "DRY RUN: would transfer group {} to group {}",
            group_id, destination_id
        );
        Ok(201)
    }

    async fn transfer_project(&self, project_id: u64, destination_id: u64) -> Result<u16> {
        info!(
            "DRY RUN: would transfer project {} to group {}",
            project_id, destination_id
        );
        Ok(200)
    }

    async fn archive_project(&self, project_id: u64) -> Result<u16> {
        info!("DRY RUN: would archive project {}", project_id);
        Ok(200)
    }

    async fn unarchive_project(&self, project_id: u64) -> Result<u16> {
        info!("DRY RUN: would unarchive project {}", project_id);
        Ok(200)
    }

    async fn list_registry_repositories(
        &self,
        project_id: u64,
    ) -> Result<Vec<RegistryRepository>> {
        self.inner.list_registry_repositories(project_id).await
    }

    async fn list_repository_tags(
        &self,
        project_id: u64,
        repository_id: u64,
    ) -> Result<Vec<RegistryTag>> {
        self.inner
            .list_repository_tags(project_id, repository_id)
            .await
    }

    async fn delete_repository(&self, project_id: u64, repository_id: u64) -> Result<()> {
        info!(
            "DRY RUN: would delete registry repository {} of project {}",
            repository_id, project_id
        );
        Ok(())
    }

    async fn delete_repository_tag(
        &self,
        project_id: u64,
        repository_id: u64,
        tag: &str,
    ) -> Result<()> {
        info!(
            "DRY RUN: would delete tag {} from repository {} of project {}",
            tag, repository_id, project_id
        );
        Ok(())
    }
}

/// Container engine decorator that only logs.
pub struct DryRunEngine {
    inner: Arc<dyn ContainerEngine>,
}

impl DryRunEngine {
    pub fn new(inner: Arc<dyn ContainerEngine>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ContainerEngine for DryRunEngine {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn pull(&self, reference: &str) -> Result<()> {
        info!("DRY RUN: would pull image {}", reference);
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        info!("DRY RUN: would tag {} as {}", source, target);
        Ok(())
    }

    async fn push(&self, reference: &str) -> Result<()> {
        info!("DRY RUN: would push {}", reference);
        Ok(())
    }
}
