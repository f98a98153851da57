//! Error types for Migraptor.
//!
//! Errors raised deep inside a component are wrapped with the group, project
//! or repository they concern before they travel upward, so the top-level
//! pipeline can decide between continuing and aborting without losing the
//! identifying context.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the migration engine.
#[derive(Debug, Error)]
pub enum MigraptorError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("GitLab API returned {status} for {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Listing {endpoint} still had more after {pages} pages")]
    Truncated { endpoint: String, pages: u32 },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Lookup errors
    #[error("Source group not found: {path}")]
    SourceGroupNotFound { path: String },

    #[error("Destination group not found: {path}")]
    DestinationGroupNotFound { path: String },

    #[error("No projects found to migrate in {group}")]
    NoProjectsFound { group: String },

    // Entity context wrappers
    #[error("group {group_id}: {source}")]
    InGroup {
        group_id: u64,
        #[source]
        source: Box<MigraptorError>,
    },

    #[error("project {project_id}: {source}")]
    InProject {
        project_id: u64,
        #[source]
        source: Box<MigraptorError>,
    },

    #[error("repository {repository_id}: {source}")]
    InRepository {
        repository_id: u64,
        #[source]
        source: Box<MigraptorError>,
    },

    // Pipeline phase errors
    #[error("Backup of {image} failed: {message}")]
    BackupFailed { image: String, message: String },

    #[error("Transfer of group {group_id} failed with status {status}")]
    GroupTransferFailed { group_id: u64, status: u16 },

    #[error("Transfer of project {project} failed: {message}")]
    ProjectTransferFailed { project: String, message: String },

    #[error("Unable to {action} project {project}: {message}")]
    ArchivalFailed {
        project: String,
        action: &'static str,
        message: String,
    },

    #[error("Registry of project {project} still has {remaining} repositories after {attempts} checks")]
    ConsistencyTimeout {
        project: String,
        remaining: usize,
        attempts: u32,
    },

    // Container engine errors
    #[error("Container engine error: {message}")]
    Engine { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Migraptor operations.
pub type Result<T> = std::result::Result<T, MigraptorError>;

impl From<serde_json::Error> for MigraptorError {
    fn from(err: serde_json::Error) -> Self {
        MigraptorError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for MigraptorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MigraptorError::Timeout(Duration::from_secs(0))
        } else {
            MigraptorError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl From<bollard::errors::Error> for MigraptorError {
    fn from(err: bollard::errors::Error) -> Self {
        MigraptorError::Engine {
            message: err.to_string(),
        }
    }
}

impl MigraptorError {
    /// Wrap an error with the group it concerns.
    pub fn in_group(group_id: u64, err: MigraptorError) -> Self {
        MigraptorError::InGroup {
            group_id,
            source: Box::new(err),
        }
    }

    /// Wrap an error with the project it concerns.
    pub fn in_project(project_id: u64, err: MigraptorError) -> Self {
        MigraptorError::InProject {
            project_id,
            source: Box::new(err),
        }
    }

    /// Wrap an error with the registry repository it concerns.
    pub fn in_repository(repository_id: u64, err: MigraptorError) -> Self {
        MigraptorError::InRepository {
            repository_id,
            source: Box::new(err),
        }
    }

    /// Strip entity wrappers and return the underlying error.
    pub fn root(&self) -> &MigraptorError {
        match self {
            MigraptorError::InGroup { source, .. }
            | MigraptorError::InProject { source, .. }
            | MigraptorError::InRepository { source, .. } => source.root(),
            other => other,
        }
    }

    /// Process exit code for this error.
    ///
    /// - 321: source group not found
    /// - 1: nothing to migrate, or invalid configuration
    /// - 99: failure while backing up, transferring or restoring
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            MigraptorError::SourceGroupNotFound { .. } => 321,

            MigraptorError::NoProjectsFound { .. }
            | MigraptorError::Config { .. }
            | MigraptorError::Validation { .. } => 1,

            _ => 99,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            MigraptorError::Network { .. }
            | MigraptorError::Timeout(_)
            | MigraptorError::RateLimited { .. } => true,
            MigraptorError::UnexpectedStatus { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}
