//! Migration orchestration.
//!
//! Each component covers one step of the run and borrows its collaborators;
//! [`Migrator`] owns them and drives the phases in order.

mod archive;
mod backup;
mod clean;
mod discovery;
mod eviction;
mod pipeline;
mod report;
mod restore;
mod selector;
mod transfer;

pub use archive::ArchivalPreserver;
pub use backup::{retain_tags, BackupOutcome, ImageBackup};
pub use clean::{CleanReport, RegistryCleaner};
pub use discovery::{BranchFailure, Discovery, GroupDiscoverer};
pub use eviction::{EvictionOutcome, RegistryEviction};
pub use pipeline::Migrator;
pub use report::{MigrationReport, ProjectReport, TransferOutcome};
pub use restore::{FailedImage, ImageRestore, RestoreOutcome};
pub use selector::should_migrate;
pub use transfer::{TransferEngine, TransferPlan};
