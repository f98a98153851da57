//! Republishing backed-up images under the destination namespace.

use crate::engine::ContainerEngine;
use crate::models::rewrite_reference;
use serde::Serialize;
use tracing::{debug, error, info};

/// An image that could not be republished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedImage {
    pub reference: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    /// Destination references that were tagged and pushed.
    pub restored: Vec<String>,
    pub failed: Vec<FailedImage>,
}

/// Tags local images under their new path and pushes them.
pub struct ImageRestore<'a> {
    engine: &'a dyn ContainerEngine,
}

impl<'a> ImageRestore<'a> {
    pub fn new(engine: &'a dyn ContainerEngine) -> Self {
        Self { engine }
    }

    /// Restore `references`, moving them from `old_root` to `new_root`.
    ///
    /// Each image is independent: a failure is logged, recorded and the next
    /// image is attempted.
    pub async fn restore(&self, references: &[String], old_root: &str, new_root: &str) -> RestoreOutcome {
        let mut outcome = RestoreOutcome::default();
        if references.is_empty() {
            return outcome;
        }

        info!("Tagging and pushing {} images", references.len());
        for reference in references {
            let Some(target) = rewrite_reference(reference, old_root, new_root) else {
                error!(
                    "Image {} is not under {}, leaving it out",
                    reference, old_root
                );
                outcome.failed.push(FailedImage {
                    reference: reference.clone(),
                    reason: format!("not under {}", old_root),
                });
                continue;
            };
            debug!(
                "new image is {} based on {} and {}",
                target, old_root, new_root
            );

            if let Err(e) = self.engine.tag(reference, &target).await {
                error!("Failed to tag image {} as {}: {}", reference, target, e);
                outcome.failed.push(FailedImage {
                    reference: reference.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            info!("Pushing image {}", target);
            if let Err(e) = self.engine.push(&target).await {
                error!("Failed to push image {}: {}", target, e);
                outcome.failed.push(FailedImage {
                    reference: reference.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            outcome.restored.push(target);
        }
        outcome
    }
}
