use crate::datasource::DataSource;

/// Discriminant for QGIS map layer types, read from the `type` attribute of
/// a `<maplayer>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Feature layer with attributes and (optionally) geometries.
    Vector,
    /// Grid coverage.
    Raster,
    /// Mesh, point cloud, vector tile, plugin layers.
    Other,
}

impl LayerKind {
    /// Maps the QGIS `maplayer/@type` value to a kind.
    #[must_use]
    pub fn from_qgs(value: &str) -> Self {
        match value {
            "vector" => Self::Vector,
            "raster" => Self::Raster,
            _ => Self::Other,
        }
    }
}

/// A layer of a QGIS project, as far as the server needs to know it.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    /// Unique layer id inside the project (e.g. `parcels_6a1b...`).
    pub id: String,
    /// Display name, used as key in the CFG `layers` section.
    pub name: String,
    /// Optional OWS short name.
    pub short_name: Option<String>,
    pub kind: LayerKind,
    /// Data provider key (`postgres`, `ogr`, `spatialite`, ...).
    pub provider: String,
    pub datasource: DataSource,
    /// Attribute field names, in declaration order.
    pub fields: Vec<String>,
    /// Layer CRS as an EPSG code, when the project declares one.
    pub srid: Option<u32>,
}

impl MapLayer {
    #[must_use]
    pub fn is_vector(&self) -> bool {
        self.kind == LayerKind::Vector
    }

    /// Returns `true` when the layer declares a field with this exact name.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Geometry column of the underlying table, if the datasource exposes one.
    #[must_use]
    pub fn geometry_column(&self) -> Option<&str> {
        self.datasource.geometry_column()
    }
}
