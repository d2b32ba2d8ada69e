use std::path::{Path, PathBuf};

use crate::params::OwsParams;
use crate::types::MapLayer;

/// Name of the request parameter carrying the target layer.
pub const LAYER_PARAM: &str = "LAYER";

/// Read-only layer catalogue of a QGIS project.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    path: PathBuf,
    layers: Vec<MapLayer>,
}

impl Project {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, layers: Vec<MapLayer>) -> Self {
        Self {
            path: path.into(),
            layers,
        }
    }

    /// Path of the `.qgs` file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }

    /// Layer with the given id.
    #[must_use]
    pub fn map_layer(&self, id: &str) -> Option<&MapLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Resolves a vector layer by name, then short name, then id.
    #[must_use]
    pub fn vector_layer(&self, name: &str) -> Option<&MapLayer> {
        let vectors = || self.layers.iter().filter(|l| l.is_vector());
        vectors()
            .find(|l| l.name == name)
            .or_else(|| vectors().find(|l| l.short_name.as_deref() == Some(name)))
            .or_else(|| vectors().find(|l| l.id == name))
    }
}

/// Resolves the `LAYER` parameter to a vector layer of the project.
///
/// Returns `None` when the parameter is missing, blank, or does not match
/// a vector layer; callers report that as a client error.
#[must_use]
pub fn find_vector_layer_from_params<'p>(
    params: &OwsParams,
    project: &'p Project,
) -> Option<&'p MapLayer> {
    let name = params.get_non_empty(LAYER_PARAM)?;
    project.vector_layer(name)
}
