//! Source-control platform trait.

use crate::error::Result;
use crate::models::{Group, Project, RegistryRepository, RegistryTag, User};
use async_trait::async_trait;

/// Operations the migration needs from the source-control platform.
///
/// Status-returning calls hand back the raw HTTP status so each caller can
/// apply its own success contract.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// The user owning the API token.
    async fn current_user(&self) -> Result<User>;

    /// Look a group up by full path. `Ok(None)` when it does not exist.
    async fn search_group(&self, full_path: &str) -> Result<Option<Group>>;

    /// Direct subgroups of a group.
    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>>;

    /// Projects directly inside a group.
    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>>;

    /// Create a group named `name` under `parent_id`.
    async fn create_group(&self, name: &str, parent_id: u64) -> Result<Group>;

    /// Move a group under another group.
    async fn transfer_group(&self, group_id: u64, destination_id: u64) -> Result<u16>;

    /// Move a project into another namespace.
    async fn transfer_project(&self, project_id: u64, destination_id: u64) -> Result<u16>;

    async fn archive_project(&self, project_id: u64) -> Result<u16>;

    async fn unarchive_project(&self, project_id: u64) -> Result<u16>;

    async fn list_registry_repositories(&self, project_id: u64)
        -> Result<Vec<RegistryRepository>>;

    async fn list_repository_tags(
        &self,
        project_id: u64,
        repository_id: u64,
    ) -> Result<Vec<RegistryTag>>;

    async fn delete_repository(&self, project_id: u64, repository_id: u64) -> Result<()>;

    async fn delete_repository_tag(
        &self,
        project_id: u64,
        repository_id: u64,
        tag: &str,
    ) -> Result<()>;
}
