//! Group and project transfer.

use crate::config::{MigrationConfig, MigrationTimings};
use crate::error::{MigraptorError, Result};
use crate::models::{Group, Project};
use crate::network::SourceControl;
use serde::Serialize;
use tracing::{debug, info, warn};

/// How the selected projects reach the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPlan {
    /// Reparent the whole root group under the destination.
    WholeGroup,
    /// Move the selected projects into a same-named subgroup of the destination.
    IntoSubgroup,
    /// Move every selected project straight into the destination.
    Flatten,
}

impl TransferPlan {
    pub fn choose(preserve_hierarchy: bool, project_filter: &[String]) -> Self {
        match (preserve_hierarchy, project_filter.is_empty()) {
            (true, true) => TransferPlan::WholeGroup,
            (true, false) => TransferPlan::IntoSubgroup,
            (false, _) => TransferPlan::Flatten,
        }
    }

    /// Whether projects are moved one by one.
    pub fn is_individual(&self) -> bool {
        !matches!(self, TransferPlan::WholeGroup)
    }

    /// Namespace prefix the project's images currently live under.
    ///
    /// A whole-group move keeps the relative layout, so the root's full path
    /// is replaced. Individual moves lift each project out of its own
    /// namespace, wherever it sits in the tree.
    pub fn old_root(&self, root: &Group, project: &Project) -> String {
        match self {
            TransferPlan::WholeGroup => root.full_path.clone(),
            TransferPlan::IntoSubgroup | TransferPlan::Flatten => {
                match project.namespace_path() {
                    "" => root.full_path.clone(),
                    namespace => namespace.to_string(),
                }
            }
        }
    }

    /// Namespace prefix the project's images are republished under.
    pub fn new_root(&self, root: &Group, destination_path: &str) -> String {
        match self {
            TransferPlan::WholeGroup | TransferPlan::IntoSubgroup => {
                format!("{}/{}", destination_path, root.path)
            }
            TransferPlan::Flatten => destination_path.to_string(),
        }
    }
}

/// Moves groups and projects, enforcing each call's success contract.
pub struct TransferEngine<'a> {
    source: &'a dyn SourceControl,
    timings: &'a MigrationTimings,
    dry_run: bool,
}

impl<'a> TransferEngine<'a> {
    pub fn new(source: &'a dyn SourceControl, timings: &'a MigrationTimings, dry_run: bool) -> Self {
        Self {
            source,
            timings,
            dry_run,
        }
    }

    /// Reparent `root` under `destination`. Only 201 counts as success.
    pub async fn transfer_group(&self, root: &Group, destination: &Group) -> Result<()> {
        info!(
            "Transferring group {} to {}",
            root.full_path, destination.full_path
        );
        let status = self
            .source
            .transfer_group(root.id, destination.id)
            .await
            .map_err(|e| MigraptorError::in_group(root.id, e))?;

        if status != MigrationConfig::GROUP_TRANSFER_SUCCESS {
            warn!("Cannot move group {}, GitLab answered {}", root.full_path, status);
            return Err(MigraptorError::GroupTransferFailed {
                group_id: root.id,
                status,
            });
        }

        info!("Group moved (status {})", status);
        self.settle().await;
        Ok(())
    }

    /// Find `<destination>/<root.path>`, creating it when missing.
    pub async fn locate_or_create_subgroup(
        &self,
        root: &Group,
        destination: &Group,
        destination_path: &str,
    ) -> Result<Group> {
        if root.full_path.split('/').count() > 2 {
            warn!(
                "Source group {} is nested more than one level deep, only its last segment '{}' names the destination subgroup",
                root.full_path, root.path
            );
        }

        let target_path = format!("{}/{}", destination_path, root.path);
        let existing = self
            .source
            .search_group(&target_path)
            .await
            .map_err(|e| MigraptorError::in_group(destination.id, e))?;

        match existing {
            Some(group) => {
                info!("New group {} already exists, using it", target_path);
                Ok(group)
            }
            None => {
                info!("New group {} does not exist yet, creating it", target_path);
                self.source
                    .create_group(&root.path, destination.id)
                    .await
                    .map_err(|e| MigraptorError::in_group(destination.id, e))
            }
        }
    }

    /// Move one project into `target`. Any 2xx status is accepted.
    pub async fn transfer_project(&self, project: &Project, target: &Group) -> Result<()> {
        info!(
            "Transferring project {} to group {}",
            project.path, target.id
        );
        let status = self
            .source
            .transfer_project(project.id, target.id)
            .await
            .map_err(|e| MigraptorError::ProjectTransferFailed {
                project: project.path.clone(),
                message: e.to_string(),
            })?;

        if !(200..300).contains(&status) {
            return Err(MigraptorError::ProjectTransferFailed {
                project: project.path.clone(),
                message: format!("unexpected status {}", status),
            });
        }

        debug!("Project {} moved (status {})", project.path, status);
        self.settle().await;
        Ok(())
    }

    async fn settle(&self) {
        let delay = self.timings.settle_after_transfer;
        if self.dry_run || delay.is_zero() {
            return;
        }
        debug!("Sleeping {:?} while GitLab processes the transfer", delay);
        tokio::time::sleep(delay).await;
    }
}
