//! Pipeline composition: wraps the router with the operation middleware.

use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;

use super::metrics::MetricsLayer;
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::router::OperationRouter;

/// The composed, cloneable operation pipeline.
pub type OperationPipeline = BoxCloneSyncService<Operation, OperationResponse, OperationError>;

/// Build the operation pipeline by wrapping the `OperationRouter` with middleware layers.
///
/// `MetricsLayer` sits closest to the router so the recorded duration covers
/// only the domain work.
#[must_use]
pub fn build_operation_pipeline(router: OperationRouter) -> OperationPipeline {
    BoxCloneSyncService::new(ServiceBuilder::new().layer(MetricsLayer).service(router))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
