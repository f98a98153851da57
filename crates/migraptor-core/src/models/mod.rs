//! Data models for Migraptor.
//!
//! The GitLab types deserialize straight from the REST API responses; only
//! the fields the migration needs are kept.

mod gitlab;
mod image;

pub use gitlab::*;
pub use image::*;
