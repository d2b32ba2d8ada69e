//! The Lizmap CFG document (`<project>.qgs.cfg`).
//!
//! Only the sections read server-side are typed; the rest of the document
//! is kept as JSON.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Errors while reading a CFG file.
#[derive(Debug, thiserror::Error)]
pub enum CfgError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} is not a JSON object")]
    NotAnObject { path: PathBuf },
}

/// Parsed CFG document.
#[derive(Debug, Clone, PartialEq)]
pub struct LizmapConfig {
    document: Map<String, Value>,
}

impl LizmapConfig {
    /// Wraps an already parsed document. Returns `None` unless it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(document) => Some(Self { document }),
            _ => None,
        }
    }

    /// Reads and parses the CFG file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError`] when the file cannot be read, is not valid JSON,
    /// or is not a JSON object.
    pub fn from_path(path: &Path) -> Result<Self, CfgError> {
        let raw = std::fs::read(path).map_err(|source| CfgError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_slice(&raw).map_err(|source| CfgError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(value).ok_or_else(|| CfgError::NotAnObject {
            path: path.to_path_buf(),
        })
    }

    /// The `layers` section, keyed by layer name.
    #[must_use]
    pub fn layers(&self) -> Option<&Map<String, Value>> {
        self.document.get("layers").and_then(Value::as_object)
    }

    /// The raw `filter_by_polygon` section.
    #[must_use]
    pub fn filter_by_polygon(&self) -> Option<&Value> {
        self.document.get("filter_by_polygon")
    }
}

/// Path of the CFG file for a project: the project path with `.cfg` appended.
#[must_use]
pub fn cfg_path_for(project_path: &Path) -> PathBuf {
    let mut raw = OsString::from(project_path.as_os_str());
    raw.push(".cfg");
    PathBuf::from(raw)
}

/// Loads the CFG next to a project.
///
/// A missing file is the normal "not published with Lizmap" case and is
/// silent; an unreadable or corrupt file is logged. Both yield `None`.
#[must_use]
pub fn get_lizmap_config(project_path: &Path) -> Option<LizmapConfig> {
    let path = cfg_path_for(project_path);
    match LizmapConfig::from_path(&path) {
        Ok(cfg) => Some(cfg),
        Err(CfgError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no Lizmap configuration for project");
            None
        }
        Err(e) => {
            warn!(error = %e, "Lizmap configuration ignored");
            None
        }
    }
}

/// The `layers` section of a CFG, `None` when absent or empty.
#[must_use]
pub fn get_lizmap_layers_config(cfg: &LizmapConfig) -> Option<&Map<String, Value>> {
    cfg.layers().filter(|layers| !layers.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn cfg_path_appends_extension() {
        assert_eq!(
            cfg_path_for(Path::new("/srv/projects/city.qgs")),
            PathBuf::from("/srv/projects/city.qgs.cfg")
        );
    }

    #[test]
    fn sections_are_exposed() {
        let cfg = LizmapConfig::from_value(json!({
            "layers": {"parcels": {"id": "parcels_1"}},
            "filter_by_polygon": {"layers": []},
        }))
        .unwrap();
        assert!(cfg.layers().unwrap().contains_key("parcels"));
        assert!(cfg.filter_by_polygon().is_some());
        assert!(get_lizmap_layers_config(&cfg).is_some());
    }

    #[test]
    fn empty_layers_section_is_none() {
        let cfg = LizmapConfig::from_value(json!({"layers": {}})).unwrap();
        assert!(cfg.layers().is_some());
        assert!(get_lizmap_layers_config(&cfg).is_none());

        let cfg = LizmapConfig::from_value(json!({"options": {}})).unwrap();
        assert!(get_lizmap_layers_config(&cfg).is_none());
        assert!(cfg.filter_by_polygon().is_none());
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(LizmapConfig::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(get_lizmap_config(&dir.path().join("nothing.qgs")).is_none());
    }

    #[test]
    fn corrupt_file_is_none_and_valid_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("city.qgs");

        let mut file = std::fs::File::create(cfg_path_for(&project)).unwrap();
        file.write_all(b"{ not json").unwrap();
        drop(file);
        assert!(get_lizmap_config(&project).is_none());
        assert!(matches!(
            LizmapConfig::from_path(&cfg_path_for(&project)),
            Err(CfgError::Json { .. })
        ));

        std::fs::write(cfg_path_for(&project), br#"{"layers": {"a": {}}}"#).unwrap();
        let cfg = get_lizmap_config(&project).unwrap();
        assert!(cfg.layers().unwrap().contains_key("a"));
    }
}
