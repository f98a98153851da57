//! Container image backup.
//!
//! Every retained image of a project is pulled into the local engine before
//! anything touches the source registry. A failed pull stops the whole run:
//! once the registry is deleted there is nothing left to restore from.

use crate::engine::ContainerEngine;
use crate::error::{MigraptorError, Result};
use crate::models::{ImageReference, Project, RegistryRepository, RegistryTag};
use crate::network::SourceControl;
use tracing::{debug, info};

/// Images pulled for one project and the repositories they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupOutcome {
    /// Fully qualified references, in pull order.
    pub references: Vec<String>,
    /// Every repository of the project, including ones with no retained tag.
    pub repositories: Vec<RegistryRepository>,
}

/// Keep the tags named in `filter`, or all of them when it is empty.
pub fn retain_tags(tags: Vec<RegistryTag>, filter: &[String]) -> Vec<ImageReference> {
    tags.into_iter()
        .filter(|tag| filter.is_empty() || filter.iter().any(|f| f == &tag.name))
        .map(ImageReference::from)
        .collect()
}

/// Pulls a project's registry images into the local engine.
pub struct ImageBackup<'a> {
    source: &'a dyn SourceControl,
    engine: &'a dyn ContainerEngine,
}

impl<'a> ImageBackup<'a> {
    pub fn new(source: &'a dyn SourceControl, engine: &'a dyn ContainerEngine) -> Self {
        Self { source, engine }
    }

    /// Back up the images of `project` whose tag passes `tag_filter`.
    pub async fn backup(&self, project: &Project, tag_filter: &[String]) -> Result<BackupOutcome> {
        let repositories = self
            .source
            .list_registry_repositories(project.id)
            .await
            .map_err(|e| MigraptorError::in_project(project.id, e))?;

        info!(
            "Found {} registries in project {}",
            repositories.len(),
            project.path
        );
        if repositories.is_empty() {
            info!("No registry found for project {}", project.path);
            return Ok(BackupOutcome::default());
        }

        let mut references = Vec::new();
        for repository in &repositories {
            debug!(
                "Working on repository {} ({}) of project {}",
                repository.id, repository.path, project.id
            );

            let tags = self
                .source
                .list_repository_tags(project.id, repository.id)
                .await
                .map_err(|e| {
                    MigraptorError::in_project(
                        project.id,
                        MigraptorError::in_repository(repository.id, e),
                    )
                })?;

            let images = retain_tags(tags, tag_filter);
            if images.is_empty() {
                info!(
                    "No images left after tag filter in repository {} of project {}",
                    repository.path, project.path
                );
                continue;
            }

            for image in images {
                debug!("{}\t{}\t{}", image.name, image.path, image.location);
                info!("Pulling image {}", image.location);
                self.engine.pull(&image.location).await.map_err(|e| {
                    MigraptorError::in_project(
                        project.id,
                        MigraptorError::BackupFailed {
                            image: image.location.clone(),
                            message: e.to_string(),
                        },
                    )
                })?;
                references.push(image.location);
            }
        }

        Ok(BackupOutcome {
            references,
            repositories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> RegistryTag {
        RegistryTag {
            name: name.to_string(),
            path: format!("eng/app:{}", name),
            location: format!("registry.gitlab.com/eng/app:{}", name),
        }
    }

    #[test]
    fn test_retain_all_without_filter() {
        let kept = retain_tags(vec![tag("latest"), tag("v1")], &[]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_retain_only_listed_tags() {
        let kept = retain_tags(
            vec![tag("latest"), tag("v1"), tag("v2")],
            &["v2".to_string(), "v9".to_string()],
        );
        let names: Vec<&str> = kept.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["v2"]);
    }
}
