//! Reader for the layer catalogue of a `.qgs` project file.
//!
//! Only `qgis/projectlayers/maplayer` elements are read: id, names,
//! provider, datasource, CRS and the attribute field names declared in
//! `fieldConfiguration`.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use crate::datasource::DataSource;
use crate::project::Project;
use crate::types::{LayerKind, MapLayer};

#[derive(Debug, thiserror::Error)]
pub enum QgsError {
    #[error("cannot read project {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported project format: {path}")]
    UnsupportedFormat { path: PathBuf },
    #[error("malformed project XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("root element is <{found}>, expected <qgis>")]
    NotAProject { found: String },
}

/// Reads the layer catalogue of the `.qgs` file at `path`.
///
/// # Errors
///
/// Returns [`QgsError`] for unreadable files, zipped `.qgz` projects and
/// malformed XML.
pub fn read_project(path: &Path) -> Result<Project, QgsError> {
    let is_qgs = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("qgs"));
    if !is_qgs {
        return Err(QgsError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let xml = std::fs::read_to_string(path).map_err(|source| QgsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_project(&xml, path)
}

/// Parses project XML. `path` anchors relative datasource paths.
///
/// # Errors
///
/// Returns [`QgsError::Xml`] for malformed XML and
/// [`QgsError::NotAProject`] when the root element is not `<qgis>`.
pub fn parse_project(xml: &str, path: &Path) -> Result<Project, QgsError> {
    let base_dir = path.parent();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<LayerBuilder> = None;
    let mut layers = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if stack.is_empty() && name != "qgis" {
                    return Err(QgsError::NotAProject { found: name });
                }
                let parent = stack.last().map(String::as_str);
                if name == "maplayer" && parent == Some("projectlayers") {
                    current = Some(LayerBuilder::new(attribute(&e, "type")?));
                } else if let Some(builder) = current.as_mut() {
                    if name == "field" && parent == Some("fieldConfiguration") {
                        builder.push_field(attribute(&e, "name")?);
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if stack.is_empty() && name != "qgis" {
                    return Err(QgsError::NotAProject { found: name });
                }
                let parent = stack.last().map(String::as_str);
                if let Some(builder) = current.as_mut() {
                    if name == "field" && parent == Some("fieldConfiguration") {
                        builder.push_field(attribute(&e, "name")?);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(builder) = current.as_mut() {
                    let text = t.unescape()?;
                    builder.text(&stack, &text);
                }
            }
            Event::End(_) => {
                let closed = stack.pop();
                let parent = stack.last().map(String::as_str);
                if closed.as_deref() == Some("maplayer") && parent == Some("projectlayers") {
                    if let Some(layer) = current.take().and_then(|b| b.build(base_dir)) {
                        layers.push(layer);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Project::new(path, layers))
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, QgsError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[derive(Debug, Default)]
struct LayerBuilder {
    kind: Option<String>,
    id: Option<String>,
    name: Option<String>,
    short_name: Option<String>,
    provider: Option<String>,
    datasource: Option<String>,
    srid: Option<u32>,
    fields: Vec<String>,
}

impl LayerBuilder {
    fn new(kind: Option<String>) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    fn push_field(&mut self, name: Option<String>) {
        if let Some(name) = name {
            self.fields.push(name);
        }
    }

    /// Records the text content of the element on top of `stack`.
    fn text(&mut self, stack: &[String], text: &str) {
        let [.., parent, element] = stack else {
            return;
        };
        let value = || Some(text.to_string());
        match (parent.as_str(), element.as_str()) {
            ("maplayer", "id") => self.id = value(),
            ("maplayer", "layername") => self.name = value(),
            ("maplayer", "shortname") => self.short_name = value(),
            ("maplayer", "provider") => self.provider = value(),
            ("maplayer", "datasource") => self.datasource = value(),
            ("spatialrefsys", "srid") => self.srid = text.parse().ok().filter(|&s| s > 0),
            _ => {}
        }
    }

    fn build(self, base_dir: Option<&Path>) -> Option<MapLayer> {
        let Some(id) = self.id else {
            warn!(name = ?self.name, "project layer without id skipped");
            return None;
        };
        let provider = self.provider.unwrap_or_default();
        let datasource = DataSource::parse(
            &provider,
            self.datasource.as_deref().unwrap_or_default(),
            base_dir,
        );
        Some(MapLayer {
            name: self.name.unwrap_or_else(|| id.clone()),
            id,
            short_name: self.short_name,
            kind: LayerKind::from_qgs(self.kind.as_deref().unwrap_or_default()),
            provider,
            datasource,
            fields: self.fields,
            srid: self.srid,
        })
    }
}
