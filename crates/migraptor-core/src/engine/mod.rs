//! Local container engine access.
//!
//! Images are pulled into the local daemon before the source registry is
//! destroyed, then re-tagged and pushed under their new path.

mod docker;
mod registry;
mod traits;

pub use docker::{DockerEngine, RegistryCredentials};
pub use registry::RegistryLogin;
pub use traits::ContainerEngine;
