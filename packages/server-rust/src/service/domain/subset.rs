//! `GETSUBSETSTRING`: the filter by polygon predicate for one layer and one user.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use lizmap_core::{evaluate, find_vector_layer_from_params, SubsetDecision};
use serde_json::{json, Value};
use tower::Service;
use tracing::debug;

use crate::service::operation::{Operation, OperationContext, OperationError, OperationResponse};

pub const INVALID_LAYER: &str = "Invalid LAYER parameter";
pub const INVALID_MAP: &str = "Invalid MAP parameter";

/// Answers `GETSUBSETSTRING` with `{}` (no filter) or `{"filter": "<sql>"}`.
#[derive(Debug, Default)]
pub struct SubsetStringService;

impl SubsetStringService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Computes the response body for a request.
    ///
    /// # Errors
    ///
    /// `OperationError::BadRequest` when no project is loaded or `LAYER`
    /// does not name a vector layer of it.
    pub fn subset(&self, ctx: &OperationContext) -> Result<Value, OperationError> {
        let loaded = ctx
            .project
            .as_ref()
            .ok_or_else(|| OperationError::bad_request(INVALID_MAP))?;
        let layer = find_vector_layer_from_params(&ctx.params, &loaded.project)
            .ok_or_else(|| OperationError::bad_request(INVALID_LAYER))?;

        let decision = evaluate(&ctx.request, loaded.cfg.as_ref(), &loaded.project, layer);
        debug!(call_id = ctx.call_id, layer = %layer.name, ?decision, "subset string computed");

        Ok(match decision {
            SubsetDecision::Unfiltered => json!({}),
            SubsetDecision::Filter(sql) => json!({ "filter": sql }),
        })
    }
}

impl Service<Operation> for Arc<SubsetStringService> {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let svc = Arc::clone(self);
        Box::pin(async move {
            match op {
                Operation::GetSubsetString { ctx } => svc.subset(&ctx).map(OperationResponse::Json),
                Operation::GetServerSettings { .. } => Err(OperationError::WrongService),
            }
        })
    }
}
