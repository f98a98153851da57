//! Container engine trait.

use crate::error::Result;
use async_trait::async_trait;

/// Image operations against a local container engine.
///
/// References are fully qualified, e.g. `registry.gitlab.com/eng/app:v1`.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Check that the engine is reachable.
    async fn ping(&self) -> Result<()>;

    /// Pull `reference` into local storage.
    async fn pull(&self, reference: &str) -> Result<()>;

    /// Add `target` as another name for the local image `source`.
    async fn tag(&self, source: &str, target: &str) -> Result<()>;

    /// Push the local image `reference` to its registry.
    async fn push(&self, reference: &str) -> Result<()>;
}
