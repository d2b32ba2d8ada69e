//! Filesystem project store.
//!
//! `MAP` values are resolved under a configured root directory. Anything
//! resolving outside of it (`..` components, absolute paths elsewhere,
//! symlinks pointing out) is rejected. Loaded projects are cached by
//! canonical path and reloaded when the `.qgs` or its CFG changes on disk.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use lizmap_core::cfg::{cfg_path_for, get_lizmap_config};
use lizmap_core::qgs::read_project;
use tracing::{debug, info};

use super::{LoadedProject, ProjectError};
use crate::traits::ProjectProvider;

#[derive(Debug)]
struct CacheEntry {
    project_modified: Option<SystemTime>,
    cfg_modified: Option<SystemTime>,
    loaded: Arc<LoadedProject>,
}

/// [`ProjectProvider`] reading `.qgs` files below a root directory.
#[derive(Debug)]
pub struct FsProjectStore {
    root: PathBuf,
    cache: DashMap<PathBuf, CacheEntry>,
}

impl FsProjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: DashMap::new(),
        }
    }

    /// Number of cached projects.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Lexical resolution of `map` under the root.
    ///
    /// # Errors
    ///
    /// [`ProjectError::EmptyMap`] for a blank value,
    /// [`ProjectError::OutsideRoot`] for `..` components or absolute paths
    /// outside the root.
    pub fn resolve(&self, map: &str) -> Result<PathBuf, ProjectError> {
        let map = map.trim();
        if map.is_empty() {
            return Err(ProjectError::EmptyMap);
        }

        let requested = Path::new(map);
        if requested
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ProjectError::OutsideRoot {
                map: map.to_string(),
            });
        }

        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        if !candidate.starts_with(&self.root) {
            return Err(ProjectError::OutsideRoot {
                map: map.to_string(),
            });
        }
        Ok(candidate)
    }

    async fn canonical(&self, map: &str, candidate: &Path) -> Result<PathBuf, ProjectError> {
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|source| ProjectError::Root {
                path: self.root.clone(),
                source,
            })?;
        let real = match tokio::fs::canonicalize(candidate).await {
            Ok(real) => real,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ProjectError::NotFound {
                    map: map.to_string(),
                })
            }
            Err(source) => {
                return Err(ProjectError::Io {
                    path: candidate.to_path_buf(),
                    source,
                })
            }
        };
        if !real.starts_with(&root) {
            return Err(ProjectError::OutsideRoot {
                map: map.to_string(),
            });
        }
        Ok(real)
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

#[async_trait]
impl ProjectProvider for FsProjectStore {
    async fn load(&self, map: &str) -> Result<Arc<LoadedProject>, ProjectError> {
        let candidate = self.resolve(map)?;
        let path = self.canonical(map, &candidate).await?;

        let project_modified = modified(&path).await;
        let cfg_modified = modified(&cfg_path_for(&path)).await;

        if let Some(entry) = self.cache.get(&path) {
            if entry.project_modified == project_modified && entry.cfg_modified == cfg_modified {
                debug!(path = %path.display(), "project served from cache");
                return Ok(Arc::clone(&entry.loaded));
            }
        }

        let source = path.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            let project = read_project(&source)?;
            let cfg = get_lizmap_config(&source);
            Ok::<_, ProjectError>(LoadedProject::new(project, cfg))
        })
        .await??;
        let loaded = Arc::new(loaded);

        info!(
            path = %path.display(),
            layers = loaded.project.layers().len(),
            has_cfg = loaded.cfg.is_some(),
            "project loaded"
        );
        self.cache.insert(
            path,
            CacheEntry {
                project_modified,
                cfg_modified,
                loaded: Arc::clone(&loaded),
            },
        );
        Ok(loaded)
    }
}
