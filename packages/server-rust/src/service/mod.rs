//! The LIZMAP service and its operation pipeline.
//!
//! 1. **Classification** (`classify`): raw request -> `Result<Operation, ClassifyError>`
//! 2. **Middleware** (`middleware`): Tower layers (metrics)
//! 3. **Routing** (`router`): Dispatch to domain services by `service_name`
//! 4. **Domain services** (`domain`): `GETSERVERSETTINGS`, `GETSUBSETSTRING`
//! 5. **Responses** (`response`): JSON writer and the `{code, message}` error body

pub mod classify;
pub mod config;
pub mod domain;
pub mod identity;
pub mod lizmap;
pub mod middleware;
pub mod operation;
pub mod response;
pub mod router;

// Re-export key types for convenient access.
pub use classify::{LizmapRequest, OperationService};
pub use config::{HostInfo, ServerConfig};
pub use lizmap::LizmapService;
pub use operation::{
    service_names, ClassifyError, Operation, OperationContext, OperationError, OperationResponse,
};
pub use response::{write_json_response, ServiceError};
pub use router::OperationRouter;
