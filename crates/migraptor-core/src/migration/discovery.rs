//! Group subtree discovery.

use super::selector::should_migrate;
use crate::error::{MigraptorError, Result};
use crate::models::{Group, Project};
use crate::network::SourceControl;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A subgroup branch that could not be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    pub group_id: u64,
    pub message: String,
}

/// Everything found below a root group.
///
/// Maps are keyed by the platform id, so merging two branches is a plain
/// union.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Descendant subgroups, excluding the root itself.
    pub subgroups: BTreeMap<u64, Group>,
    /// Projects that passed the selection filter.
    pub projects: BTreeMap<u64, Project>,
    /// Branches that failed; their siblings are still included.
    pub failures: Vec<BranchFailure>,
}

impl Discovery {
    fn merge(&mut self, other: Discovery) {
        self.subgroups.extend(other.subgroups);
        self.projects.extend(other.projects);
        self.failures.extend(other.failures);
    }
}

/// Recursively resolves a group into its subgroups and eligible projects.
pub struct GroupDiscoverer<'a> {
    source: &'a dyn SourceControl,
    filter: &'a [String],
    preserve_hierarchy: bool,
}

impl<'a> GroupDiscoverer<'a> {
    pub fn new(source: &'a dyn SourceControl, filter: &'a [String], preserve_hierarchy: bool) -> Self {
        Self {
            source,
            filter,
            preserve_hierarchy,
        }
    }

    /// Discover the subtree under `root_group_id`.
    ///
    /// A failure listing the root itself is returned as an error. A failure
    /// in a subgroup only drops that branch and is recorded in
    /// [`Discovery::failures`].
    pub async fn discover(&self, root_group_id: u64) -> Result<Discovery> {
        self.discover_branch(root_group_id).await
    }

    fn discover_branch(&self, group_id: u64) -> BoxFuture<'_, Result<Discovery>> {
        async move {
            let mut found = Discovery::default();

            let projects = self
                .source
                .list_projects(group_id)
                .await
                .map_err(|e| MigraptorError::in_group(group_id, e))?;
            for project in projects {
                if should_migrate(&project, self.filter, self.preserve_hierarchy) {
                    found.projects.insert(project.id, project);
                } else {
                    debug!("Not migrating {}, not in filter list", project.path);
                }
            }

            let subgroups = self
                .source
                .list_subgroups(group_id)
                .await
                .map_err(|e| MigraptorError::in_group(group_id, e))?;
            for subgroup in subgroups {
                let subgroup_id = subgroup.id;
                debug!("Descending into subgroup {}", subgroup.full_path);
                found.subgroups.insert(subgroup_id, subgroup);

                match self.discover_branch(subgroup_id).await {
                    Ok(branch) => found.merge(branch),
                    Err(e) => {
                        warn!("Skipping subgroup {}: {}", subgroup_id, e);
                        found.failures.push(BranchFailure {
                            group_id: subgroup_id,
                            message: e.to_string(),
                        });
                    }
                }
            }

            Ok(found)
        }
        .boxed()
    }
}
