//! Source registry eviction and the consistency wait that follows it.
//!
//! GitLab deletes registry repositories asynchronously, and a project whose
//! registry still holds images cannot be moved. Deletion is best effort since
//! the images are already safe locally; the wait only ever re-reads.

use crate::config::MigrationTimings;
use crate::error::{MigraptorError, Result};
use crate::models::Project;
use crate::network::{retry_async, RetryConfig, SourceControl};
use tracing::{debug, info, warn};

/// Result of deleting a project's repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    pub deleted: Vec<u64>,
    pub failed: Vec<(u64, String)>,
}

/// Deletes source repositories and waits for the deletion to show.
pub struct RegistryEviction<'a> {
    source: &'a dyn SourceControl,
    timings: &'a MigrationTimings,
    dry_run: bool,
}

impl<'a> RegistryEviction<'a> {
    pub fn new(source: &'a dyn SourceControl, timings: &'a MigrationTimings, dry_run: bool) -> Self {
        Self {
            source,
            timings,
            dry_run,
        }
    }

    /// Delete every repository recorded in `project.registry_repository_ids`,
    /// one call each.
    ///
    /// Failures are logged and collected, never returned.
    pub async fn evict(&self, project: &Project) -> EvictionOutcome {
        let mut outcome = EvictionOutcome::default();

        for &repository_id in &project.registry_repository_ids {
            match self.source.delete_repository(project.id, repository_id).await {
                Ok(()) => {
                    debug!("Removed registry {} on project {}", repository_id, project.id);
                    outcome.deleted.push(repository_id);
                }
                Err(e) => {
                    warn!(
                        "Failed to delete registry repository {} of project {}: {}",
                        repository_id, project.path, e
                    );
                    outcome.failed.push((repository_id, e.to_string()));
                }
            }

            if !self.dry_run {
                self.pause().await;
            }
        }

        outcome
    }

    /// Poll each registry-enabled project until its registry reads empty.
    ///
    /// Returns the projects that ran out of attempts, keyed by project id.
    /// Skipped entirely in a dry run, where nothing was deleted.
    pub async fn await_eviction(&self, projects: &[&Project]) -> Vec<(u64, MigraptorError)> {
        if self.dry_run {
            info!("DRY RUN: would wait for registries to be emptied");
            return Vec::new();
        }

        info!("Waiting for images to be deleted from registry...");
        let mut timeouts = Vec::new();
        for project in projects.iter().filter(|p| p.container_registry_enabled) {
            if let Err(e) = self.await_project(project).await {
                warn!("{}. Continuing...", e);
                timeouts.push((project.id, e));
            }
        }
        timeouts
    }

    /// Poll a single project's registry until it is empty.
    pub async fn await_project(&self, project: &Project) -> Result<()> {
        info!("Waiting for images to be deleted from project {}", project.path);
        let config = RetryConfig::fixed(
            self.timings.eviction_poll_interval,
            self.timings.eviction_max_attempts,
        );

        let (result, stats) = retry_async(
            &config,
            || async {
                // A failed read counts as "not yet empty".
                let remaining = self
                    .source
                    .list_registry_repositories(project.id)
                    .await
                    .map(|repositories| repositories.len())
                    .unwrap_or(usize::MAX);
                if remaining == 0 {
                    Ok(())
                } else {
                    debug!(
                        "Registry of {} not empty yet (probably deletion delay on the instance)",
                        project.path
                    );
                    Err(remaining)
                }
            },
            |_: &usize| true,
        )
        .await;

        match result {
            Ok(()) => {
                info!("All registries deleted for project {}", project.path);
                Ok(())
            }
            Err(remaining) => Err(MigraptorError::ConsistencyTimeout {
                project: project.path.clone(),
                remaining: if remaining == usize::MAX { 0 } else { remaining },
                attempts: stats.attempts,
            }),
        }
    }

    async fn pause(&self) {
        let delay = self.timings.pause_after_delete;
        if !delay.is_zero() {
            debug!("Sleeping {:?} to let the registry catch up", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
