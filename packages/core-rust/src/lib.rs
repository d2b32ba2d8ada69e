//! Lizmap Core: project catalogue, CFG access, request identity and the
//! filter by polygon access control.

pub mod cfg;
pub mod context;
pub mod datasource;
pub mod filter;
pub mod params;
pub mod project;
pub mod qgs;
pub mod types;

pub use cfg::{get_lizmap_config, get_lizmap_layers_config, LizmapConfig};
pub use context::RequestContext;
pub use filter::{evaluate, FilterByPolygon, SubsetDecision, HIDE_ALL};
pub use params::OwsParams;
pub use project::{find_vector_layer_from_params, Project};
pub use types::{LayerKind, MapLayer};
