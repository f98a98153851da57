//! Centralized configuration for Migraptor.
//!
//! Tuning constants for network access and the migration pipeline, plus the
//! validated settings a single run is executed with.

use crate::error::{MigraptorError, Result};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Migraptor";
    pub const USER_AGENT: &'static str = "Migraptor/0.3";
    pub const DEFAULT_INSTANCE: &'static str = "gitlab.com";
    pub const CONFIG_FILE_STEM: &'static str = "gitlab-migraptor";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const PER_PAGE: u32 = 100;
    pub const MAX_PAGES: u32 = 50;
    pub const THROTTLE_DELAY: Duration = Duration::from_millis(500);
}

/// Pipeline pacing used to wait out GitLab's asynchronous processing.
pub struct MigrationConfig;

impl MigrationConfig {
    pub const SETTLE_AFTER_TRANSFER: Duration = Duration::from_secs(10);
    pub const PAUSE_AFTER_DELETE: Duration = Duration::from_secs(10);
    pub const EVICTION_POLL_INTERVAL: Duration = Duration::from_secs(20);
    pub const EVICTION_MAX_ATTEMPTS: u32 = 30;
    /// GitLab answers a successful group transfer with 201 Created.
    pub const GROUP_TRANSFER_SUCCESS: u16 = 201;
}

/// Pauses and retry budgets applied during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTimings {
    pub settle_after_transfer: Duration,
    pub pause_after_delete: Duration,
    pub eviction_poll_interval: Duration,
    pub eviction_max_attempts: u32,
}

impl Default for MigrationTimings {
    fn default() -> Self {
        Self {
            settle_after_transfer: MigrationConfig::SETTLE_AFTER_TRANSFER,
            pause_after_delete: MigrationConfig::PAUSE_AFTER_DELETE,
            eviction_poll_interval: MigrationConfig::EVICTION_POLL_INTERVAL,
            eviction_max_attempts: MigrationConfig::EVICTION_MAX_ATTEMPTS,
        }
    }
}

impl MigrationTimings {
    /// Timings with every pause removed, keeping the retry budget.
    pub fn immediate() -> Self {
        Self {
            settle_after_transfer: Duration::ZERO,
            pause_after_delete: Duration::ZERO,
            eviction_poll_interval: Duration::ZERO,
            eviction_max_attempts: MigrationConfig::EVICTION_MAX_ATTEMPTS,
        }
    }
}

/// Settings for one migration run.
///
/// Built once by the front end and treated as immutable by the pipeline.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// Full path of the group being migrated.
    pub source_group: String,
    /// Full path of the group receiving it.
    pub destination_group: String,
    /// GitLab host, e.g. `gitlab.com`.
    pub instance: String,
    /// Container registry host, e.g. `registry.gitlab.com`.
    pub registry: String,
    /// Project paths to migrate. Empty means every project.
    pub project_filter: Vec<String>,
    /// Image tags to carry over. Empty means every tag.
    pub tag_filter: Vec<String>,
    /// Move the source group as a unit instead of flattening its projects.
    pub preserve_hierarchy: bool,
    /// Log every mutating call instead of performing it.
    pub dry_run: bool,
    pub timings: MigrationTimings,
}

impl MigrationSettings {
    /// Create settings with defaults for everything but the two group paths.
    pub fn new(source_group: impl Into<String>, destination_group: impl Into<String>) -> Self {
        let instance = AppConfig::DEFAULT_INSTANCE.to_string();
        Self {
            source_group: source_group.into(),
            destination_group: destination_group.into(),
            registry: default_registry(&instance),
            instance,
            project_filter: Vec::new(),
            tag_filter: Vec::new(),
            preserve_hierarchy: true,
            dry_run: false,
            timings: MigrationTimings::default(),
        }
    }

    pub fn with_project_filter(mut self, filter: Vec<String>) -> Self {
        self.project_filter = filter;
        self
    }

    pub fn with_tag_filter(mut self, filter: Vec<String>) -> Self {
        self.tag_filter = filter;
        self
    }

    pub fn with_preserve_hierarchy(mut self, preserve: bool) -> Self {
        self.preserve_hierarchy = preserve;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_timings(mut self, timings: MigrationTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Destination path without a leading slash.
    pub fn destination_path(&self) -> &str {
        self.destination_group.trim_start_matches('/')
    }

    /// Check that the mandatory values are present.
    pub fn validate(&self) -> Result<()> {
        if self.source_group.trim().is_empty() {
            return Err(MigraptorError::Validation {
                field: "old-group".into(),
                message: "source group is required".into(),
            });
        }
        if self.destination_path().trim().is_empty() {
            return Err(MigraptorError::Validation {
                field: "new-group".into(),
                message: "destination group is required".into(),
            });
        }
        if self.instance.trim().is_empty() {
            return Err(MigraptorError::Validation {
                field: "instance".into(),
                message: "GitLab instance is required".into(),
            });
        }
        Ok(())
    }
}

/// Registry host GitLab uses by default for an instance.
pub fn default_registry(instance: &str) -> String {
    format!("registry.{}", instance)
}
