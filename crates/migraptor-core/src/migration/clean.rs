//! Tag cleanup across every registry of a group.

use super::discovery::GroupDiscoverer;
use crate::error::{MigraptorError, Result};
use crate::models::Group;
use crate::network::SourceControl;
use serde::Serialize;
use tracing::{info, warn};

/// Result of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// `<repository path>:<tag>` for every deleted tag.
    pub deleted: Vec<String>,
    /// Tags whose deletion failed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Deletes a fixed list of tags from every registry below a group.
pub struct RegistryCleaner<'a> {
    source: &'a dyn SourceControl,
    tags: &'a [String],
}

impl<'a> RegistryCleaner<'a> {
    /// An empty tag list is rejected: it would match nothing useful and is
    /// most likely a missing `--tags`.
    pub fn new(source: &'a dyn SourceControl, tags: &'a [String]) -> Result<Self> {
        if tags.is_empty() {
            return Err(MigraptorError::Config {
                message: "clean needs at least one tag to delete".into(),
            });
        }
        Ok(Self { source, tags })
    }

    pub async fn clean(&self, group: &Group) -> Result<CleanReport> {
        let discovery = GroupDiscoverer::new(self.source, &[], true)
            .discover(group.id)
            .await?;
        for failure in &discovery.failures {
            warn!("Subgroup {} not cleaned: {}", failure.group_id, failure.message);
        }

        let mut report = CleanReport::default();
        for project in discovery.projects.values() {
            if !project.container_registry_enabled {
                continue;
            }
            let repositories = match self.source.list_registry_repositories(project.id).await {
                Ok(repositories) => repositories,
                Err(e) => {
                    warn!("Cannot list registries of {}: {}", project.path, e);
                    continue;
                }
            };

            for repository in &repositories {
                for tag in self.tags {
                    let name = format!("{}:{}", repository.path, tag);
                    match self
                        .source
                        .delete_repository_tag(project.id, repository.id, tag)
                        .await
                    {
                        Ok(()) => {
                            info!("Deleted {}", name);
                            report.deleted.push(name);
                        }
                        Err(e) => {
                            warn!("Failed to delete {}: {}", name, e);
                            report.failed.push((name, e.to_string()));
                        }
                    }
                }
            }
        }
        Ok(report)
    }
}
