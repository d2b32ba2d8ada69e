//! Typed view of the CFG `filter_by_polygon` section.
//!
//! ```json
//! "filter_by_polygon": {
//!   "config": {"polygon_layer_id": "zones_2", "group_field": "groups"},
//!   "layers": [
//!     {"layer": "parcels_1", "primary_key": "id",
//!      "filter_mode": "display_and_editing", "spatial_relationship": "intersects"}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// When the filter applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    /// Only for viewing sessions.
    #[serde(rename = "display", alias = "login")]
    Login,
    /// Only for editing sessions.
    #[serde(rename = "editing")]
    Editing,
    /// Always.
    #[serde(rename = "display_and_editing", alias = "both")]
    Both,
}

/// Geometric predicate between a feature and the authorized polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpatialRelationship {
    #[serde(rename = "intersects")]
    Intersects,
    /// The feature lies inside the polygon (the desktop plugin calls it
    /// "contains", seen from the polygon).
    #[serde(rename = "within", alias = "contains")]
    Within,
}

/// Polygon layer used as the authorization source, shared by every rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolygonLayerSettings {
    pub polygon_layer_id: String,
    /// Field listing the groups (or logins) allowed on each polygon,
    /// comma separated.
    pub group_field: String,
    /// Match polygons against the user login instead of the groups.
    #[serde(default)]
    pub filter_by_user: bool,
}

#[derive(Debug, Deserialize)]
struct RawLayerRule {
    primary_key: String,
    filter_mode: FilterMode,
    spatial_relationship: SpatialRelationship,
}

/// A complete filtering rule for one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub layer_id: String,
    pub primary_key_field: String,
    pub filter_mode: FilterMode,
    pub spatial_relationship: SpatialRelationship,
    pub polygon: PolygonLayerSettings,
}

/// A `filter_by_polygon` entry exists for the layer but cannot be honored.
#[derive(Debug, thiserror::Error)]
pub enum FilterConfigError {
    #[error("filter_by_polygon section is not an object")]
    SectionNotAnObject,
    #[error("filter_by_polygon.layers is not a list")]
    LayersNotAList,
    #[error("more than one filter_by_polygon entry for layer {layer_id}")]
    DuplicateRule { layer_id: String },
    #[error("invalid filter_by_polygon.config: {0}")]
    PolygonSettings(#[source] serde_json::Error),
    #[error("filter_by_polygon.config is missing")]
    MissingPolygonSettings,
    #[error("invalid filter_by_polygon entry for layer {layer_id}: {source}")]
    LayerRule {
        layer_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("empty {field} in filter_by_polygon configuration")]
    EmptyField { field: &'static str },
}

impl FilterRule {
    /// Loads the rule for `layer_id` from the raw section.
    ///
    /// `Ok(None)` means filtering is not configured for the layer. Entries
    /// without a `layer` key cannot belong to any layer and are skipped
    /// with a warning. An entry for this layer that is incomplete, has
    /// unknown values, or is duplicated is rejected as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`FilterConfigError`] when the section may concern the layer
    /// but cannot be read unambiguously.
    pub fn load(section: Option<&Value>, layer_id: &str) -> Result<Option<Self>, FilterConfigError> {
        let section = match section {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(section)) => section,
            Some(_) => return Err(FilterConfigError::SectionNotAnObject),
        };

        let entries = match section.get("layers") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(FilterConfigError::LayersNotAList),
        };

        let mut matching = None;
        for (index, entry) in entries.iter().enumerate() {
            let Some(entry_layer) = entry.get("layer").and_then(Value::as_str) else {
                warn!(index, "filter_by_polygon entry without layer id ignored");
                continue;
            };
            if entry_layer != layer_id {
                continue;
            }
            if matching.replace(entry).is_some() {
                return Err(FilterConfigError::DuplicateRule {
                    layer_id: layer_id.to_string(),
                });
            }
        }
        let Some(entry) = matching else {
            return Ok(None);
        };

        let settings = section
            .get("config")
            .filter(|v| !v.is_null())
            .ok_or(FilterConfigError::MissingPolygonSettings)?;
        let polygon: PolygonLayerSettings = serde_json::from_value(settings.clone())
            .map_err(FilterConfigError::PolygonSettings)?;
        let raw: RawLayerRule =
            serde_json::from_value(entry.clone()).map_err(|source| FilterConfigError::LayerRule {
                layer_id: layer_id.to_string(),
                source,
            })?;

        for (field, value) in [
            ("polygon_layer_id", &polygon.polygon_layer_id),
            ("group_field", &polygon.group_field),
            ("primary_key", &raw.primary_key),
        ] {
            if value.trim().is_empty() {
                return Err(FilterConfigError::EmptyField { field });
            }
        }

        Ok(Some(Self {
            layer_id: layer_id.to_string(),
            primary_key_field: raw.primary_key,
            filter_mode: raw.filter_mode,
            spatial_relationship: raw.spatial_relationship,
            polygon,
        }))
    }
}
