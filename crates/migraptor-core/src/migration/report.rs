//! Run summary.

use super::discovery::BranchFailure;
use super::restore::FailedImage;
use super::transfer::TransferPlan;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// What happened to a project's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum TransferOutcome {
    /// Not reached, usually because the run aborted earlier.
    Pending,
    /// Moved along with the root group.
    MovedWithGroup,
    /// Moved on its own into the destination.
    Moved,
    Failed(String),
    /// Left out because of an earlier failure on the same project.
    Skipped(String),
}

/// Everything the run did to one project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub project_id: u64,
    pub path: String,
    pub archived: bool,
    pub backed_up: Vec<String>,
    pub restored: Vec<String>,
    pub failed: Vec<FailedImage>,
    pub repositories_deleted: usize,
    pub repositories_not_deleted: usize,
    pub eviction_timed_out: bool,
    pub transfer: TransferOutcome,
    /// Steps an operator has to finish by hand.
    pub manual_actions: Vec<String>,
}

impl ProjectReport {
    pub fn new(project_id: u64, path: impl Into<String>, archived: bool) -> Self {
        Self {
            project_id,
            path: path.into(),
            archived,
            backed_up: Vec::new(),
            restored: Vec::new(),
            failed: Vec::new(),
            repositories_deleted: 0,
            repositories_not_deleted: 0,
            eviction_timed_out: false,
            transfer: TransferOutcome::Pending,
            manual_actions: Vec::new(),
        }
    }

    /// True when the project made it across without leftovers.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.transfer,
            TransferOutcome::Moved | TransferOutcome::MovedWithGroup
        ) && self.failed.is_empty()
            && self.manual_actions.is_empty()
    }
}

/// Summary of one migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub source_group: String,
    pub destination_group: String,
    pub plan: TransferPlan,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub projects: Vec<ProjectReport>,
    pub discovery_failures: Vec<BranchFailure>,
}

impl MigrationReport {
    pub fn new(
        source_group: impl Into<String>,
        destination_group: impl Into<String>,
        plan: TransferPlan,
        dry_run: bool,
    ) -> Self {
        Self {
            source_group: source_group.into(),
            destination_group: destination_group.into(),
            plan,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            projects: Vec::new(),
            discovery_failures: Vec::new(),
        }
    }

    pub fn project(&self, project_id: u64) -> Option<&ProjectReport> {
        self.projects.iter().find(|p| p.project_id == project_id)
    }

    pub fn project_mut(&mut self, project_id: u64) -> Option<&mut ProjectReport> {
        self.projects.iter_mut().find(|p| p.project_id == project_id)
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Whether every project finished and no branch was lost in discovery.
    pub fn is_clean(&self) -> bool {
        self.discovery_failures.is_empty() && self.projects.iter().all(ProjectReport::is_complete)
    }

    /// Whether any project failed to move.
    pub fn has_transfer_failures(&self) -> bool {
        self.projects
            .iter()
            .any(|p| matches!(p.transfer, TransferOutcome::Failed(_)))
    }

    /// Plain-text summary for the console.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };
        let _ = writeln!(
            out,
            "Migration of {} to {}{}",
            self.source_group, self.destination_group, mode
        );
        let _ = writeln!(out, "Strategy: {:?}", self.plan);
        if let Some(finished) = self.finished_at {
            let elapsed = finished - self.started_at;
            let _ = writeln!(out, "Duration: {}s", elapsed.num_seconds());
        }

        for project in &self.projects {
            let _ = writeln!(out);
            let archived = if project.archived { " [archived]" } else { "" };
            let _ = writeln!(out, "{}{}", project.path, archived);
            let _ = writeln!(out, "  transfer: {}", describe(&project.transfer));
            let _ = writeln!(
                out,
                "  images: {} backed up, {} restored, {} failed",
                project.backed_up.len(),
                project.restored.len(),
                project.failed.len()
            );
            if project.repositories_not_deleted > 0 {
                let _ = writeln!(
                    out,
                    "  registries: {} deleted, {} left in source",
                    project.repositories_deleted, project.repositories_not_deleted
                );
            }
            if project.eviction_timed_out {
                let _ = writeln!(out, "  warning: source registry was still populated when transfer started");
            }
            for image in &project.failed {
                let _ = writeln!(out, "  failed: {} ({})", image.reference, image.reason);
            }
            for action in &project.manual_actions {
                let _ = writeln!(out, "  manual action: {}", action);
            }
        }

        if !self.discovery_failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Subgroups skipped during discovery:");
            for failure in &self.discovery_failures {
                let _ = writeln!(out, "  group {}: {}", failure.group_id, failure.message);
            }
        }

        out
    }
}

fn describe(outcome: &TransferOutcome) -> String {
    match outcome {
        TransferOutcome::Pending => "not attempted".to_string(),
        TransferOutcome::MovedWithGroup => "moved with group".to_string(),
        TransferOutcome::Moved => "moved".to_string(),
        TransferOutcome::Failed(reason) => format!("FAILED ({})", reason),
        TransferOutcome::Skipped(reason) => format!("skipped ({})", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_failures_and_manual_actions() {
        let mut report = MigrationReport::new("eng", "platform", TransferPlan::Flatten, false);
        let mut project = ProjectReport::new(1, "a", true);
        project.transfer = TransferOutcome::Moved;
        project.backed_up.push("registry.example.com/eng/a:latest".into());
        project.failed.push(FailedImage {
            reference: "registry.example.com/eng/a:latest".into(),
            reason: "push denied".into(),
        });
        project.manual_actions.push("archive project a".into());
        report.projects.push(project);
        report.finish();

        let text = report.render();
        assert!(text.contains("a [archived]"));
        assert!(text.contains("1 backed up, 0 restored, 1 failed"));
        assert!(text.contains("push denied"));
        assert!(text.contains("manual action: archive project a"));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_complete_project_is_clean() {
        let mut report = MigrationReport::new("eng", "platform", TransferPlan::WholeGroup, true);
        let mut project = ProjectReport::new(2, "b", false);
        project.transfer = TransferOutcome::MovedWithGroup;
        report.projects.push(project);
        assert!(report.is_clean());
        assert!(report.render().contains("(dry run)"));
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(TransferOutcome::Failed("409".into())).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["detail"], "409");
    }
}
