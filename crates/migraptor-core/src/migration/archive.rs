//! Archival state preservation.
//!
//! GitLab refuses most changes on archived projects, so they are unarchived
//! before the pipeline touches them and archived again at the end.

use crate::error::{MigraptorError, Result};
use crate::models::Project;
use crate::network::SourceControl;
use tracing::{error, info};

fn accepted(status: u16) -> bool {
    matches!(status, 200 | 201)
}

pub struct ArchivalPreserver<'a> {
    source: &'a dyn SourceControl,
}

impl<'a> ArchivalPreserver<'a> {
    pub fn new(source: &'a dyn SourceControl) -> Self {
        Self { source }
    }

    pub async fn unarchive(&self, project: &Project) -> Result<()> {
        info!("Project {} is archived, unarchiving it for the migration", project.path);
        let result = self.source.unarchive_project(project.id).await;
        check(project, "unarchive", result)
    }

    pub async fn rearchive(&self, project: &Project) -> Result<()> {
        info!("Archiving project {} again", project.path);
        let result = self.source.archive_project(project.id).await;
        check(project, "archive", result)
    }
}

fn check(project: &Project, action: &'static str, result: Result<u16>) -> Result<()> {
    let failure = match result {
        Ok(status) if accepted(status) => return Ok(()),
        Ok(status) => format!("unexpected status {}", status),
        Err(e) => e.to_string(),
    };

    error!(
        "Unable to {} project {}, need to do it by hand",
        action, project.path
    );
    Err(MigraptorError::ArchivalFailed {
        project: project.path.clone(),
        action,
        message: failure,
    })
}
