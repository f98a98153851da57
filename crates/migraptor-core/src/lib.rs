//! Migraptor Core - headless engine for moving GitLab groups between namespaces.
//!
//! GitLab refuses to move a project whose container registry holds images.
//! This crate works around it: images are pulled locally, the source
//! registries are emptied, the group or its projects are transferred, and the
//! images are pushed again under their new path. Archived projects are
//! unarchived for the duration and archived again afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use migraptor_core::{DockerEngine, GitLabClient, MigrationSettings, Migrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> migraptor_core::Result<()> {
//!     let gitlab = GitLabClient::new("gitlab.com", "glpat-...")?;
//!     let docker = DockerEngine::connect()?;
//!     let settings = MigrationSettings::new("eng/team", "platform").with_dry_run(true);
//!
//!     let report = Migrator::new(Arc::new(gitlab), Arc::new(docker), settings)
//!         .run()
//!         .await?;
//!     println!("{}", report.render());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dry_run;
pub mod engine;
pub mod error;
pub mod migration;
pub mod models;
pub mod network;

pub use config::{AppConfig, MigrationSettings, MigrationTimings};
pub use dry_run::{DryRunEngine, DryRunSource};
pub use engine::{ContainerEngine, DockerEngine, RegistryCredentials, RegistryLogin};
pub use error::{MigraptorError, Result};
pub use migration::{
    CleanReport, MigrationReport, Migrator, ProjectReport, RegistryCleaner, TransferOutcome,
    TransferPlan,
};
pub use models::{Group, ImageReference, Project, RegistryRepository, RegistryTag, User};
pub use network::{GitLabClient, SourceControl};
