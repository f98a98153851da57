//! The migration pipeline.
//!
//! Phases run strictly one after another over every selected project:
//!
//! 1. discover the source subtree and select projects
//! 2. unarchive and back up every registry image
//! 3. delete the source registries and wait for GitLab to catch up
//! 4. transfer the group or the individual projects
//! 5. restore images under the destination path and re-archive
//!
//! Nothing runs concurrently. An image that cannot be pulled stops the run
//! before any registry is deleted.

use super::archive::ArchivalPreserver;
use super::backup::{BackupOutcome, ImageBackup};
use super::discovery::GroupDiscoverer;
use super::eviction::RegistryEviction;
use super::report::{MigrationReport, ProjectReport, TransferOutcome};
use super::restore::ImageRestore;
use super::transfer::{TransferEngine, TransferPlan};
use crate::config::MigrationSettings;
use crate::dry_run::{DryRunEngine, DryRunSource};
use crate::engine::ContainerEngine;
use crate::error::{MigraptorError, Result};
use crate::models::{Group, Project};
use crate::network::SourceControl;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs a migration against a source-control platform and a container engine.
pub struct Migrator {
    source: Arc<dyn SourceControl>,
    engine: Arc<dyn ContainerEngine>,
    settings: MigrationSettings,
}

impl Migrator {
    /// Build a migrator. In a dry run both collaborators are wrapped so no
    /// mutating call can reach them.
    pub fn new(
        source: Arc<dyn SourceControl>,
        engine: Arc<dyn ContainerEngine>,
        settings: MigrationSettings,
    ) -> Self {
        let (source, engine): (Arc<dyn SourceControl>, Arc<dyn ContainerEngine>) =
            if settings.dry_run {
                (
                    Arc::new(DryRunSource::new(source)),
                    Arc::new(DryRunEngine::new(engine)),
                )
            } else {
                (source, engine)
            };

        Self {
            source,
            engine,
            settings,
        }
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    /// Resolve the source group. A failed lookup counts as not found.
    pub async fn locate_source(&self) -> Result<Group> {
        let path = &self.settings.source_group;
        info!("Searching for source group {}", path);
        match self.source.search_group(path).await {
            Ok(Some(group)) => {
                info!("Found group {} with id {}", group.full_path, group.id);
                Ok(group)
            }
            Ok(None) => Err(MigraptorError::SourceGroupNotFound { path: path.clone() }),
            Err(e) => {
                error!("Failed to search for group {}: {}", path, e);
                Err(MigraptorError::SourceGroupNotFound { path: path.clone() })
            }
        }
    }

    pub async fn locate_destination(&self) -> Result<Group> {
        let path = self.settings.destination_path();
        info!("Migrating group to new path {}", path);
        self.source
            .search_group(path)
            .await?
            .ok_or_else(|| MigraptorError::DestinationGroupNotFound {
                path: path.to_string(),
            })
    }

    /// Execute the whole migration and return its report.
    ///
    /// Returns `Err` only for run-level failures: missing groups, nothing to
    /// migrate, a failed backup, a failed group-level move, or a project that
    /// cannot be unarchived when the whole group is moving. Projects
    /// unarchived before such a failure are archived again first.
    pub async fn run(&self) -> Result<MigrationReport> {
        let settings = &self.settings;
        let source = self.source.as_ref();
        let engine = self.engine.as_ref();
        let dry_run = settings.dry_run;
        let destination_path = settings.destination_path().to_string();

        let root = self.locate_source().await?;
        let destination = self.locate_destination().await?;

        let discovery = GroupDiscoverer::new(
            source,
            &settings.project_filter,
            settings.preserve_hierarchy,
        )
        .discover(root.id)
        .await?;
        if discovery.projects.is_empty() {
            warn!("No projects found to migrate in {}", root.full_path);
            return Err(MigraptorError::NoProjectsFound {
                group: root.full_path.clone(),
            });
        }
        info!(
            "Discovered {} subgroups and {} projects to migrate",
            discovery.subgroups.len(),
            discovery.projects.len()
        );

        let plan = TransferPlan::choose(settings.preserve_hierarchy, &settings.project_filter);
        let mut report = MigrationReport::new(&root.full_path, &destination_path, plan, dry_run);
        report.discovery_failures = discovery.failures;
        let mut projects: Vec<Project> = discovery.projects.into_values().collect();
        for project in &projects {
            report
                .projects
                .push(ProjectReport::new(project.id, &project.path, project.archived));
        }

        let archival = ArchivalPreserver::new(source);
        let mut unarchived: Vec<u64> = Vec::new();
        let mut skipped: BTreeSet<u64> = BTreeSet::new();
        let mut backups: BTreeMap<u64, BackupOutcome> = BTreeMap::new();

        // Backup
        let backup = ImageBackup::new(source, engine);
        for index in 0..projects.len() {
            let project = &projects[index];
            info!("==> Backup of {}", project.path);

            if project.archived {
                if let Err(e) = archival.unarchive(project).await {
                    // The group move would carry this project along with its
                    // registry still populated, so nothing may be evicted.
                    if plan == TransferPlan::WholeGroup {
                        error!("Cannot move {} with its group: {}", root.full_path, e);
                        self.rearchive_all(&archival, &projects_by_id(&projects, &unarchived))
                            .await;
                        return Err(e);
                    }
                    if let Some(entry) = report.project_mut(project.id) {
                        entry.transfer = TransferOutcome::Skipped(e.to_string());
                        entry.manual_actions.push(format!("unarchive {} and re-run", project.path));
                    }
                    skipped.insert(project.id);
                    continue;
                }
                unarchived.push(project.id);
            }

            if !project.container_registry_enabled {
                continue;
            }

            match backup.backup(project, &settings.tag_filter).await {
                Ok(outcome) => {
                    let project_id = project.id;
                    if let Some(entry) = report.project_mut(project_id) {
                        entry.backed_up = outcome.references.clone();
                    }
                    projects[index].registry_repository_ids =
                        outcome.repositories.iter().map(|r| r.id).collect();
                    backups.insert(project_id, outcome);
                }
                Err(e) => {
                    error!("Failed to backup images: {}", e);
                    self.rearchive_all(&archival, &projects_by_id(&projects, &unarchived))
                        .await;
                    return Err(e);
                }
            }
        }

        // Eviction
        let eviction = RegistryEviction::new(source, &settings.timings, dry_run);
        for project in &projects {
            if project.registry_repository_ids.is_empty() {
                continue;
            }
            let evicted = eviction.evict(project).await;
            if let Some(entry) = report.project_mut(project.id) {
                entry.repositories_deleted = evicted.deleted.len();
                entry.repositories_not_deleted = evicted.failed.len();
            }
        }
        if !backups.is_empty() {
            let evicted: Vec<&Project> = projects
                .iter()
                .filter(|p| backups.contains_key(&p.id))
                .collect();
            for (project_id, _) in eviction.await_eviction(&evicted).await {
                if let Some(entry) = report.project_mut(project_id) {
                    entry.eviction_timed_out = true;
                }
            }
        }

        // Transfer
        let transfer = TransferEngine::new(source, &settings.timings, dry_run);
        let target = match plan {
            TransferPlan::WholeGroup => {
                if let Err(e) = transfer.transfer_group(&root, &destination).await {
                    error!("Failed to transfer group: {}", e);
                    self.rearchive_all(&archival, &projects_by_id(&projects, &unarchived))
                        .await;
                    return Err(e);
                }
                destination.clone()
            }
            TransferPlan::IntoSubgroup => {
                match transfer
                    .locate_or_create_subgroup(&root, &destination, &destination_path)
                    .await
                {
                    Ok(group) => group,
                    Err(e) => {
                        error!("Failed to create new group: {}", e);
                        self.rearchive_all(&archival, &projects_by_id(&projects, &unarchived))
                            .await;
                        return Err(e);
                    }
                }
            }
            TransferPlan::Flatten => destination.clone(),
        };

        let mut moved: BTreeSet<u64> = BTreeSet::new();
        for project in &projects {
            if skipped.contains(&project.id) {
                continue;
            }
            let outcome = if plan.is_individual() {
                match transfer.transfer_project(project, &target).await {
                    Ok(()) => {
                        moved.insert(project.id);
                        TransferOutcome::Moved
                    }
                    Err(e) => {
                        error!("Failed to transfer project: {}", e);
                        TransferOutcome::Failed(e.to_string())
                    }
                }
            } else {
                moved.insert(project.id);
                TransferOutcome::MovedWithGroup
            };
            if let Some(entry) = report.project_mut(project.id) {
                entry.transfer = outcome;
            }
        }

        // Restore and re-archive
        let restore = ImageRestore::new(engine);
        let new_root = plan.new_root(&root, &destination_path);
        for project in &projects {
            info!("==> Restore of {}", project.path);

            if moved.contains(&project.id) {
                if let Some(outcome) = backups.get(&project.id) {
                    let old_root = plan.old_root(&root, project);
                    let restored = restore
                        .restore(&outcome.references, &old_root, &new_root)
                        .await;
                    if let Some(entry) = report.project_mut(project.id) {
                        entry.restored = restored.restored;
                        entry.failed = restored.failed;
                    }
                }
            }

            if unarchived.contains(&project.id) {
                if let Err(e) = archival.rearchive(project).await {
                    if let Some(entry) = report.project_mut(project.id) {
                        entry.manual_actions.push(e.to_string());
                    }
                }
            }

            if moved.contains(&project.id) {
                info!("Migration of {} complete", project.path);
            }
        }

        if dry_run {
            info!("DRY RUN finished, nothing was changed");
        }
        report.finish();
        Ok(report)
    }

    async fn rearchive_all(&self, archival: &ArchivalPreserver<'_>, projects: &[&Project]) {
        for project in projects {
            if let Err(e) = archival.rearchive(project).await {
                warn!("{}", e);
            }
        }
    }
}

fn projects_by_id<'p>(projects: &'p [Project], ids: &[u64]) -> Vec<&'p Project> {
    projects.iter().filter(|p| ids.contains(&p.id)).collect()
}
