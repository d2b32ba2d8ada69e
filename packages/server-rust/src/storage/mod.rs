//! Project storage for the Lizmap server.
//!
//! A [`LoadedProject`] pairs the layer catalogue of a `.qgs` file with its
//! optional Lizmap CFG. Loaded projects are immutable and shared through
//! `Arc`; a reload builds a new value and swaps the cache entry.

pub mod project_store;

pub use project_store::FsProjectStore;

use std::path::PathBuf;

use lizmap_core::qgs::QgsError;
use lizmap_core::{LizmapConfig, Project};

/// A project and the CFG published next to it.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub project: Project,
    pub cfg: Option<LizmapConfig>,
}

impl LoadedProject {
    #[must_use]
    pub fn new(project: Project, cfg: Option<LizmapConfig>) -> Self {
        Self { project, cfg }
    }
}

/// Errors while resolving or loading a project.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("empty MAP parameter")]
    EmptyMap,
    #[error("project {map} is outside the project root")]
    OutsideRoot { map: String },
    #[error("project {map} not found")]
    NotFound { map: String },
    /// The configured project root cannot be read.
    #[error("project root {path} is not accessible: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The project exists but cannot be read (permissions, I/O failure).
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Qgs(#[from] QgsError),
    #[error("project loading task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ProjectError {
    /// Whether the error is caused by the `MAP` value sent by the client.
    ///
    /// Unreadable roots and files are host problems, as is a failed
    /// loading task.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::EmptyMap | Self::OutsideRoot { .. } | Self::NotFound { .. } => true,
            Self::Qgs(e) => !matches!(e, QgsError::Io { .. }),
            Self::Root { .. } | Self::Io { .. } | Self::Join(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;

    use super::*;

    fn io_error(kind: io::ErrorKind) -> io::Error {
        io::Error::new(kind, "test")
    }

    #[test]
    fn client_and_host_errors() {
        assert!(ProjectError::EmptyMap.is_client_error());
        assert!(ProjectError::NotFound { map: "a.qgs".into() }.is_client_error());
        assert!(ProjectError::Qgs(QgsError::UnsupportedFormat {
            path: PathBuf::from("a.qgz")
        })
        .is_client_error());

        assert!(!ProjectError::Root {
            path: PathBuf::from("/srv"),
            source: io_error(io::ErrorKind::NotFound),
        }
        .is_client_error());
        assert!(!ProjectError::Io {
            path: PathBuf::from("/srv/a.qgs"),
            source: io_error(io::ErrorKind::PermissionDenied),
        }
        .is_client_error());
        assert!(!ProjectError::Qgs(QgsError::Io {
            path: Path::new("/srv/a.qgs").to_path_buf(),
            source: io_error(io::ErrorKind::PermissionDenied),
        })
        .is_client_error());
    }
}
