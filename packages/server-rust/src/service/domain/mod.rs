//! Domain services of the LIZMAP service.
//!
//! Each service implements `tower::Service<Operation>` on an `Arc` of itself
//! so the router can clone it per request.

pub mod settings;
pub mod subset;

pub use settings::ServerSettingsService;
pub use subset::SubsetStringService;
