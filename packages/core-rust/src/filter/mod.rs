//! Filter by polygon: restricts the features of a layer to those related to
//! the polygons the requesting user is allowed on.

pub mod config;
pub mod polygon;
pub mod sql;

pub use config::{FilterConfigError, FilterMode, FilterRule, PolygonLayerSettings, SpatialRelationship};
pub use polygon::{evaluate, FilterByPolygon, InvalidFilter, SubsetDecision, HIDE_ALL};
pub use sql::{quote_identifier, SqlDialect, SqlTable};
