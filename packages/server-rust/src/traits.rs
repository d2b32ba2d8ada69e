use std::sync::Arc;

use async_trait::async_trait;

use crate::storage::{LoadedProject, ProjectError};

/// Resolves the `MAP` request parameter to a loaded project.
/// Implemented by [`FsProjectStore`](crate::storage::FsProjectStore), a
/// filesystem store with a modification-time cache.
#[async_trait]
pub trait ProjectProvider: Send + Sync {
    /// Load the project named by `map`, reusing a cached copy when it is
    /// still current.
    async fn load(&self, map: &str) -> Result<Arc<LoadedProject>, ProjectError>;
}
